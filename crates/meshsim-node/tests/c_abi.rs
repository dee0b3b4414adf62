//! The C-ABI surface, exercised through the symbols `export_node_api!`
//! generates, the same path a coordinator takes after dlopen.

mod common;

use common::CliFirmware;
use meshsim_node::{export_node_api, YieldReason};
use std::ffi::CStr;

export_node_api!(CliFirmware, "cli-test");

#[test]
fn create_step_destroy_through_c_symbols() {
    unsafe {
        let config = meshsim_node::NodeConfig::default().with_name("c-abi");
        let handle = sim_create(&config);
        assert!(!handle.is_null());

        let input = b"ping\r";
        sim_inject_serial_rx(handle, input.as_ptr(), input.len());
        sim_step_begin(handle, 100, 1_700_000_000);
        let result = sim_step_wait(handle);
        assert_eq!(result.reason, YieldReason::Idle);
        assert!(String::from_utf8_lossy(result.serial_tx()).contains("pong"));

        let fused = sim_step(handle, 200, 1_700_000_000);
        assert_eq!(fused.reason, YieldReason::Idle);
        assert_eq!(fused.current_millis, 200);

        sim_destroy(handle);
    }
}

#[test]
fn null_handles_are_ignored_except_step_wait() {
    unsafe {
        let null = std::ptr::null_mut();
        sim_destroy(null);
        sim_step_begin(null, 0, 0);
        sim_inject_serial_rx(null, std::ptr::null(), 0);
        sim_inject_radio_rx(null, std::ptr::null(), 0, 0.0, 0.0);
        sim_notify_tx_complete(null);
        sim_notify_state_change(null, 1);
        assert_eq!(sim_fs_exists(null, c"x".as_ptr()), 0);
        assert_eq!(sim_fs_write(null, c"x".as_ptr(), std::ptr::null(), 0), -1);

        let result = sim_step_wait(null);
        assert_eq!(result.reason, YieldReason::Error);
        assert!(result.error_message().unwrap().contains("invalid"));
    }
}

#[test]
fn filesystem_and_key_round_trip() {
    unsafe {
        let mut public_key = [0u8; 32];
        public_key[7] = 0x77;
        let config = meshsim_node::NodeConfig::default()
            .with_name("fs-abi")
            .with_keys(&public_key, &[1u8; 64]);
        let handle = sim_create(&config);

        let payload = b"abi bytes";
        assert_eq!(
            sim_fs_write(handle, c"blob".as_ptr(), payload.as_ptr(), payload.len()),
            payload.len() as i32
        );
        assert_eq!(sim_fs_exists(handle, c"/blob".as_ptr()), 1);

        let mut buffer = [0u8; 64];
        let read = sim_fs_read(handle, c"blob".as_ptr(), buffer.as_mut_ptr(), buffer.len());
        assert_eq!(&buffer[..read as usize], payload);

        assert_eq!(sim_fs_remove(handle, c"blob".as_ptr()), 1);
        assert_eq!(sim_fs_exists(handle, c"blob".as_ptr()), 0);

        let mut key_out = [0u8; 32];
        sim_get_public_key(handle, key_out.as_mut_ptr());
        assert_eq!(key_out, public_key);

        sim_destroy(handle);
    }
}

#[test]
fn node_type_and_serial_frame_stubs() {
    unsafe {
        let node_type = CStr::from_ptr(sim_get_node_type());
        assert_eq!(node_type.to_str().unwrap(), "cli-test");

        let config = meshsim_node::NodeConfig::default();
        let handle = sim_create(&config);
        sim_inject_serial_frame(handle, std::ptr::null(), 0);
        let mut buffer = [0u8; 16];
        assert_eq!(sim_collect_serial_frame(handle, buffer.as_mut_ptr(), buffer.len()), 0);
        sim_destroy(handle);
    }
}

#[test]
fn reboot_through_c_symbols() {
    unsafe {
        let config = meshsim_node::NodeConfig::default().with_name("reboot-abi");
        let handle = sim_create(&config);
        let _ = sim_step(handle, 0, 1_700_000_000);

        let new_config = meshsim_node::NodeConfig::default()
            .with_name("reboot-abi")
            .with_rng_seed(777);
        sim_reboot(handle, &new_config);

        let result = sim_step(handle, 100, 1_700_000_000);
        assert_eq!(result.reason, YieldReason::Idle);
        sim_destroy(handle);
    }
}

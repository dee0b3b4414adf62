#![allow(dead_code)]

//! Shared test firmware.
//!
//! A small CLI firmware in the shape real node firmware takes under the
//! harness: a serial command buffer drained byte-by-byte with echo, a radio
//! poll, and a boot counter in flash. Commands exercise every substitute so
//! the integration tests can observe the runtime from the outside.

use meshsim_node::context::Hardware;
use meshsim_node::fs::OpenMode;
use meshsim_node::Firmware;

pub const BOOT_COUNT_PATH: &str = "boot_count";

/// CLI test firmware.
///
/// Commands (terminated by `\r`): `ping`, `time`, `rand`, `tx <text>`,
/// `wake <ms>`, `reboot`, `off`, `panic`.
#[derive(Default)]
pub struct CliFirmware {
    command: String,
}

impl CliFirmware {
    fn handle_command(&mut self, hw: &Hardware, command: &str) {
        let reply = match command.split_once(' ') {
            Some(("tx", text)) => {
                if hw.radio.start_send_raw(text.as_bytes()) {
                    "sent".to_string()
                } else {
                    "busy".to_string()
                }
            }
            Some(("wake", ms)) => match ms.parse::<u64>() {
                Ok(deadline) => {
                    hw.wake.schedule(deadline);
                    "ok".to_string()
                }
                Err(_) => "err".to_string(),
            },
            None => match command {
                "ping" => "pong".to_string(),
                "time" => format!("{}", hw.millis()),
                "rand" => {
                    let mut bytes = [0u8; 4];
                    hw.rng.fill(&mut bytes);
                    format!("{:02x}{:02x}{:02x}{:02x}", bytes[0], bytes[1], bytes[2], bytes[3])
                }
                "batt" => format!("{}", hw.board.battery_millivolts()),
                "reboot" => {
                    hw.board.reboot();
                    "rebooting".to_string()
                }
                "off" => {
                    hw.board.power_off();
                    "bye".to_string()
                }
                "panic" => panic!("induced test panic"),
                _ => "err".to_string(),
            },
            _ => "err".to_string(),
        };
        if !reply.is_empty() {
            hw.serial.print("  -> ");
            hw.serial.println(&reply);
        }
    }
}

impl Firmware for CliFirmware {
    fn node_type(&self) -> &'static str {
        "cli-test"
    }

    fn setup(&mut self, hw: &Hardware) {
        self.command.clear();

        // Count boots in flash so reboot tests can observe setup re-runs.
        let boots = match hw.filesystem.open(BOOT_COUNT_PATH, OpenMode::Read) {
            Some(mut file) => file.read_byte().unwrap_or(0) + 1,
            None => 1,
        };
        if let Some(mut file) = hw.filesystem.open(BOOT_COUNT_PATH, OpenMode::Write) {
            file.write(&[boots]);
        }
    }

    fn loop_once(&mut self, hw: &Hardware) {
        // Serial CLI: accumulate until carriage return, echoing input.
        while let Some(byte) = hw.serial.read() {
            let ch = byte as char;
            if ch != '\n' {
                self.command.push(ch);
                hw.serial.write_byte(byte);
            }
            if ch == '\r' {
                break;
            }
        }
        if self.command.ends_with('\r') {
            hw.serial.write_byte(b'\n');
            let command = self.command.trim_end_matches('\r').to_string();
            self.command.clear();
            self.handle_command(hw, &command);
        }

        // Radio poll: report everything the coordinator delivered.
        while let Some(packet) = hw.radio.recv() {
            let hex: String = packet.data.iter().map(|b| format!("{b:02x}")).collect();
            hw.serial.println(&format!(
                "RX {} rssi={} snr={} {hex}",
                packet.data.len(),
                packet.rssi,
                packet.snr
            ));
        }
    }
}

/// Firmware that never produces output.
#[derive(Default)]
pub struct QuietFirmware;

impl Firmware for QuietFirmware {
    fn node_type(&self) -> &'static str {
        "quiet-test"
    }

    fn setup(&mut self, _hw: &Hardware) {}

    fn loop_once(&mut self, _hw: &Hardware) {}
}

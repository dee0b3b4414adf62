//! Repeater node library.
//!
//! Glue firmware for the repeater flavor: a serial CLI fed byte-by-byte from
//! the simulated UART, and a store-and-forward radio path that re-transmits
//! every frame it hears once the channel is free. The mesh routing stack
//! proper is the firmware under test and lives outside this harness; this
//! shim carries the CLI loop and hardware wiring the real build links it
//! into.

use meshsim_codecs::base64;
use meshsim_node::context::Hardware;
use meshsim_node::fs::OpenMode;
use meshsim_node::{export_node_api, hal, Firmware};

const PREFS_PATH: &str = "prefs/name";
const COMMAND_MAX: usize = 160;
const FIRMWARE_VERSION: &str = "meshsim-repeater v1.2";

/// Advert frame type byte, first on the wire.
const FRAME_ADVERT: u8 = 0x11;

pub struct RepeaterFirmware {
    command: String,
    node_name: String,
    /// Frames heard but not yet re-transmitted (channel was busy).
    forward_queue: Vec<Vec<u8>>,
}

impl Default for RepeaterFirmware {
    fn default() -> Self {
        Self {
            command: String::new(),
            node_name: String::new(),
            forward_queue: Vec::new(),
        }
    }
}

impl RepeaterFirmware {
    fn load_prefs(&mut self, hw: &Hardware) {
        self.node_name = match hw.filesystem.open(PREFS_PATH, OpenMode::Read) {
            Some(mut file) => {
                let mut buf = vec![0u8; file.size()];
                let n = file.read(&mut buf);
                String::from_utf8_lossy(&buf[..n]).into_owned()
            }
            None => String::new(),
        };
    }

    fn save_prefs(&self, hw: &Hardware) {
        if let Some(mut file) = hw.filesystem.open(PREFS_PATH, OpenMode::Write) {
            file.write(self.node_name.as_bytes());
        }
    }

    /// An advert frame: type byte, public key, display name.
    fn advert_frame(&self) -> Vec<u8> {
        let mut frame = vec![FRAME_ADVERT];
        frame.extend_from_slice(&hal::public_key());
        frame.extend_from_slice(self.node_name.as_bytes());
        frame
    }

    fn handle_command(&mut self, hw: &Hardware, command: &str) {
        let mut reply = String::new();
        if let Some(new_name) = command.strip_prefix("set name ") {
            self.node_name = new_name.to_string();
            self.save_prefs(hw);
            reply = "OK".into();
        } else {
            match command {
                "ver" => reply = FIRMWARE_VERSION.into(),
                "clock" => {
                    reply = format!("{} ms, rtc {}", hw.millis(), hw.rtc_clock.current_time())
                }
                "get name" => reply = self.node_name.clone(),
                "key" => reply = base64::encode(&hal::public_key()),
                "advert" => {
                    let frame = self.advert_frame();
                    reply = if hw.radio.start_send_raw(&frame) {
                        "advert sent".into()
                    } else {
                        "channel busy".into()
                    };
                }
                "reboot" => {
                    hw.board.reboot();
                    reply = "rebooting".into();
                }
                "power off" => {
                    hw.board.power_off();
                }
                "battery" => reply = format!("{} mV", hw.board.battery_millivolts()),
                _ => reply = format!("unknown cmd: {command}"),
            }
        }
        if !reply.is_empty() {
            hw.serial.print("  -> ");
            hw.serial.println(&reply);
        }
    }

    /// Re-transmit heard frames, oldest first, one per free channel slot.
    fn pump_forward_queue(&mut self, hw: &Hardware) {
        if self.forward_queue.is_empty() || hw.radio.has_pending_tx() {
            return;
        }
        let frame = self.forward_queue.remove(0);
        if !hw.radio.start_send_raw(&frame) {
            self.forward_queue.insert(0, frame);
        }
    }
}

impl Firmware for RepeaterFirmware {
    fn node_type(&self) -> &'static str {
        "repeater"
    }

    fn setup(&mut self, hw: &Hardware) {
        self.command.clear();
        self.forward_queue.clear();

        self.load_prefs(hw);
        if self.node_name.is_empty() {
            // The configured display name wins until the CLI changes it.
            self.node_name = hal::node_name();
            if self.node_name.is_empty() {
                self.node_name = "repeater".into();
            }
            self.save_prefs(hw);
        }
        log::debug!("repeater up as {:?}", self.node_name);
    }

    fn loop_once(&mut self, hw: &Hardware) {
        // Serial CLI: accumulate until carriage return, echoing input.
        while hw.serial.available() > 0 && self.command.len() < COMMAND_MAX - 1 {
            let Some(byte) = hw.serial.read() else { break };
            let ch = byte as char;
            if ch != '\n' {
                self.command.push(ch);
                hw.serial.write_byte(byte);
            }
            if ch == '\r' {
                break;
            }
        }
        if self.command.len() == COMMAND_MAX - 1 {
            self.command.push('\r');
        }

        if self.command.ends_with('\r') {
            hw.serial.write_byte(b'\n');
            let command = self.command.trim_end_matches('\r').to_string();
            self.command.clear();
            self.handle_command(hw, &command);
        }

        // Radio: queue everything heard for store-and-forward.
        while let Some(packet) = hw.radio.recv() {
            hw.serial.println(&format!(
                "fwd {} bytes (rssi {}, snr {})",
                packet.data.len(),
                packet.rssi,
                packet.snr
            ));
            self.forward_queue.push(packet.data);
        }
        self.pump_forward_queue(hw);

        hw.rtc_clock.tick();
    }
}

export_node_api!(RepeaterFirmware, "repeater");

#[cfg(test)]
mod tests {
    use super::*;
    use meshsim_node::{NodeConfig, SimNode, YieldReason};

    fn node() -> SimNode {
        SimNode::spawn(
            NodeConfig::default().with_name("rpt1"),
            RepeaterFirmware::default(),
        )
    }

    fn reply_of(result: &meshsim_node::StepResult) -> String {
        String::from_utf8_lossy(result.serial_tx())
            .lines()
            .find_map(|line| line.strip_prefix("  -> ").map(str::to_string))
            .unwrap_or_default()
    }

    #[test]
    fn ver_command() {
        let node = node();
        node.inject_serial_rx(b"ver\r");
        let result = node.step(0, 1_700_000_000);
        assert_eq!(reply_of(&result), FIRMWARE_VERSION);
    }

    #[test]
    fn name_persists_across_reboot() {
        let node = node();
        node.inject_serial_rx(b"set name relay-7\r");
        let result = node.step(0, 1_700_000_000);
        assert_eq!(reply_of(&result), "OK");

        node.reboot(NodeConfig::default().with_name("rpt1"));
        node.inject_serial_rx(b"get name\r");
        let result = node.step(100, 1_700_000_000);
        assert_eq!(reply_of(&result), "relay-7");
    }

    #[test]
    fn advert_transmits_identity() {
        let mut public_key = [0u8; 32];
        public_key[0] = 0x5A;
        let node = SimNode::spawn(
            NodeConfig::default()
                .with_name("rpt1")
                .with_keys(&public_key, &[0u8; 64]),
            RepeaterFirmware::default(),
        );
        node.inject_serial_rx(b"advert\r");
        let result = node.step(0, 1_700_000_000);
        assert_eq!(result.reason, YieldReason::TxStarted);
        let frame = result.radio_tx();
        assert_eq!(frame[0], FRAME_ADVERT);
        assert_eq!(&frame[1..33], &public_key);
        assert!(frame[33..].starts_with(b"rpt1"));
    }

    #[test]
    fn heard_frames_are_forwarded() {
        let node = node();
        node.inject_radio_rx(&[0x01, 0x02, 0x03], -95.0, 2.0);
        let result = node.step(0, 1_700_000_000);
        assert_eq!(result.reason, YieldReason::TxStarted);
        assert_eq!(result.radio_tx(), &[0x01, 0x02, 0x03]);

        // Until the coordinator completes the TX, further frames queue up.
        node.inject_radio_rx(&[0x04], -95.0, 2.0);
        let result = node.step(100, 1_700_000_000);
        assert_eq!(result.radio_tx(), &[0x01, 0x02, 0x03]);

        node.notify_tx_complete();
        let result = node.step(200, 1_700_000_000);
        assert_eq!(result.reason, YieldReason::TxStarted);
        assert_eq!(result.radio_tx(), &[0x04]);
        node.notify_tx_complete();
    }

    #[test]
    fn reboot_command_yields_reboot() {
        let node = node();
        node.inject_serial_rx(b"reboot\r");
        let result = node.step(0, 1_700_000_000);
        assert_eq!(result.reason, YieldReason::Reboot);
    }
}

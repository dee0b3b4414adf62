//! Companion radio node library.
//!
//! Glue firmware for the companion flavor: a serial-attached radio modem for
//! a phone or desktop app. The app protocol runs over the byte-based UART as
//! text lines; radio traffic is surfaced to the app as base64 lines and the
//! app submits outbound frames the same way. The companion app stack itself
//! is the firmware under test and lives outside the harness.

use meshsim_codecs::base64;
use meshsim_node::context::Hardware;
use meshsim_node::fs::OpenMode;
use meshsim_node::{export_node_api, hal, Firmware};

const IDENTITY_PATH: &str = "identity/pubkey";
const LINE_MAX: usize = 512;

pub struct CompanionFirmware {
    line: String,
    /// Outbound frames the app submitted while the channel was busy.
    tx_backlog: Vec<Vec<u8>>,
}

impl Default for CompanionFirmware {
    fn default() -> Self {
        Self {
            line: String::new(),
            tx_backlog: Vec::new(),
        }
    }
}

impl CompanionFirmware {
    fn handle_line(&mut self, hw: &Hardware, line: &str) {
        if let Some(payload) = line.strip_prefix("TX ") {
            match base64::decode(payload.trim()) {
                Ok(frame) => {
                    self.tx_backlog.push(frame);
                    hw.serial.println("OK");
                }
                Err(_) => hw.serial.println("ERR bad base64"),
            }
        } else {
            match line.trim() {
                "KEY" => {
                    let encoded = base64::encode(&hal::public_key());
                    hw.serial.println(&format!("KEY {encoded}"));
                }
                "TIME" => hw.serial.println(&format!("TIME {}", hw.rtc_clock.current_time())),
                "REBOOT" => hw.board.reboot(),
                "" => {}
                other => hw.serial.println(&format!("ERR unknown: {other}")),
            }
        }
    }

    fn pump_backlog(&mut self, hw: &Hardware) {
        if self.tx_backlog.is_empty() || hw.radio.has_pending_tx() {
            return;
        }
        let frame = self.tx_backlog.remove(0);
        if !hw.radio.start_send_raw(&frame) {
            self.tx_backlog.insert(0, frame);
        }
    }
}

impl Firmware for CompanionFirmware {
    fn node_type(&self) -> &'static str {
        "companion"
    }

    fn setup(&mut self, hw: &Hardware) {
        self.line.clear();
        self.tx_backlog.clear();

        // Persist the injected identity so the app can read it back after a
        // power cycle, the way the real data store does.
        if let Some(mut file) = hw.filesystem.open(IDENTITY_PATH, OpenMode::Write) {
            file.write(&hal::public_key());
        }
        log::debug!("companion up as {:?}", hal::node_name());
    }

    fn loop_once(&mut self, hw: &Hardware) {
        // App protocol: newline-terminated text lines over the UART.
        while let Some(byte) = hw.serial.read() {
            match byte {
                b'\r' | b'\n' => {
                    let line = std::mem::take(&mut self.line);
                    self.handle_line(hw, &line);
                }
                _ if self.line.len() < LINE_MAX => self.line.push(byte as char),
                _ => {}
            }
        }

        // Surface everything heard on the air to the app.
        while let Some(packet) = hw.radio.recv() {
            hw.serial.println(&format!(
                "RX {} {} {}",
                base64::encode(&packet.data),
                packet.rssi,
                packet.snr
            ));
        }

        self.pump_backlog(hw);
        hw.rtc_clock.tick();
    }
}

export_node_api!(CompanionFirmware, "companion");

#[cfg(test)]
mod tests {
    use super::*;
    use meshsim_node::{NodeConfig, SimNode, YieldReason};

    fn node_with_key(key_byte: u8) -> SimNode {
        let mut public_key = [0u8; 32];
        public_key[0] = key_byte;
        SimNode::spawn(
            NodeConfig::default()
                .with_name("comp1")
                .with_keys(&public_key, &[0u8; 64]),
            CompanionFirmware::default(),
        )
    }

    #[test]
    fn key_query_returns_injected_identity() {
        let node = node_with_key(0x5A);
        node.inject_serial_rx(b"KEY\n");
        let result = node.step(0, 1_700_000_000);
        let output = String::from_utf8_lossy(result.serial_tx()).into_owned();
        let mut expected = [0u8; 32];
        expected[0] = 0x5A;
        assert!(output.contains(&format!("KEY {}", base64::encode(&expected))));
    }

    #[test]
    fn identity_is_persisted_at_setup() {
        let node = node_with_key(0x33);
        let _ = node.step(0, 1_700_000_000);
        let stored = node.fs_read(IDENTITY_PATH, 64).unwrap();
        assert_eq!(stored.len(), 32);
        assert_eq!(stored[0], 0x33);
    }

    #[test]
    fn tx_line_sends_decoded_frame() {
        let node = node_with_key(1);
        let line = format!("TX {}\n", base64::encode(&[0xCA, 0xFE]));
        node.inject_serial_rx(line.as_bytes());
        let result = node.step(0, 1_700_000_000);
        assert_eq!(result.reason, YieldReason::TxStarted);
        assert_eq!(result.radio_tx(), &[0xCA, 0xFE]);
        assert!(String::from_utf8_lossy(result.serial_tx()).contains("OK"));
        node.notify_tx_complete();
    }

    #[test]
    fn rx_is_surfaced_as_base64_line() {
        let node = node_with_key(1);
        node.inject_radio_rx(&[0xAA, 0xBB], -80.0, 8.0);
        let result = node.step(0, 1_700_000_000);
        let output = String::from_utf8_lossy(result.serial_tx()).into_owned();
        assert!(
            output.contains(&format!("RX {} -80 8", base64::encode(&[0xAA, 0xBB]))),
            "output: {output:?}"
        );
    }

    #[test]
    fn bad_base64_is_rejected() {
        let node = node_with_key(1);
        node.inject_serial_rx(b"TX !!!\n");
        let result = node.step(0, 1_700_000_000);
        assert_eq!(result.reason, YieldReason::Idle);
        assert!(String::from_utf8_lossy(result.serial_tx()).contains("ERR bad base64"));
    }
}

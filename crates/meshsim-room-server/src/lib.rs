//! Room server node library.
//!
//! Glue firmware for the room-server flavor: a bulletin-board node that
//! keeps every frame it hears in flash and announces itself on a fixed
//! period, using the wake registry so the coordinator knows when the next
//! announce is due. The room protocol proper (membership, history sync) is
//! the firmware under test and lives outside the harness.

use meshsim_codecs::base64;
use meshsim_node::context::Hardware;
use meshsim_node::fs::OpenMode;
use meshsim_node::{export_node_api, hal, Firmware};

const POSTS_PATH: &str = "room/posts";
const COMMAND_MAX: usize = 160;

/// Announce frame type byte.
const FRAME_ANNOUNCE: u8 = 0x21;
/// Announce period in simulated milliseconds.
const ANNOUNCE_INTERVAL_MS: u64 = 30_000;

pub struct RoomServerFirmware {
    command: String,
    next_announce: u64,
    post_count: u32,
}

impl Default for RoomServerFirmware {
    fn default() -> Self {
        Self {
            command: String::new(),
            next_announce: 0,
            post_count: 0,
        }
    }
}

impl RoomServerFirmware {
    fn announce_frame(&self) -> Vec<u8> {
        let mut frame = vec![FRAME_ANNOUNCE];
        frame.extend_from_slice(&hal::public_key());
        frame.extend_from_slice(hal::node_name().as_bytes());
        frame
    }

    /// Append a heard frame to the posts file, length-prefixed.
    fn store_post(&mut self, hw: &Hardware, data: &[u8]) {
        if let Some(mut file) = hw.filesystem.open(POSTS_PATH, OpenMode::Append) {
            file.write(&[data.len() as u8]);
            file.write(data);
            self.post_count += 1;
        }
    }

    fn count_posts(hw: &Hardware) -> u32 {
        let Some(mut file) = hw.filesystem.open(POSTS_PATH, OpenMode::Read) else {
            return 0;
        };
        let mut count = 0;
        while let Some(len) = file.read_byte() {
            let pos = file.position();
            file.seek(pos + len as usize);
            if file.position() < pos + len as usize {
                break;
            }
            count += 1;
        }
        count
    }

    fn handle_command(&mut self, hw: &Hardware, command: &str) {
        let reply = match command {
            "posts" => format!("{} posts", self.post_count),
            "key" => base64::encode(&hal::public_key()),
            "announce" => {
                if hw.radio.start_send_raw(&self.announce_frame()) {
                    "announced".into()
                } else {
                    "channel busy".into()
                }
            }
            "erase" => {
                hw.filesystem.remove(POSTS_PATH);
                self.post_count = 0;
                "erased".into()
            }
            "reboot" => {
                hw.board.reboot();
                "rebooting".into()
            }
            other => format!("unknown cmd: {other}"),
        };
        hw.serial.print("  -> ");
        hw.serial.println(&reply);
    }
}

impl Firmware for RoomServerFirmware {
    fn node_type(&self) -> &'static str {
        "room_server"
    }

    fn setup(&mut self, hw: &Hardware) {
        self.command.clear();
        self.post_count = Self::count_posts(hw);
        self.next_announce = hw.millis() + ANNOUNCE_INTERVAL_MS;
        hw.wake.schedule(self.next_announce);
        log::debug!(
            "room server up as {:?}, {} stored posts",
            hal::node_name(),
            self.post_count
        );
    }

    fn loop_once(&mut self, hw: &Hardware) {
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

        if self.command.ends_with('\r') {
            hw.serial.write_byte(b'\n');
            let command = self.command.trim_end_matches('\r').to_string();
            self.command.clear();
            self.handle_command(hw, &command);
        }

        // Everything heard becomes a stored post.
        while let Some(packet) = hw.radio.recv() {
            self.store_post(hw, &packet.data);
        }

        // Periodic announce, paced by the wake registry.
        if hw.millis() >= self.next_announce && !hw.radio.has_pending_tx() {
            if hw.radio.start_send_raw(&self.announce_frame()) {
                self.next_announce = hw.millis() + ANNOUNCE_INTERVAL_MS;
                hw.wake.schedule(self.next_announce);
            }
        }

        hw.rtc_clock.tick();
    }
}

export_node_api!(RoomServerFirmware, "room_server");

#[cfg(test)]
mod tests {
    use super::*;
    use meshsim_node::{NodeConfig, SimNode, YieldReason};

    fn node() -> SimNode {
        SimNode::spawn(
            NodeConfig::default().with_name("room1"),
            RoomServerFirmware::default(),
        )
    }

    #[test]
    fn first_step_hints_the_announce_deadline() {
        let node = node();
        let result = node.step(0, 1_700_000_000);
        assert_eq!(result.reason, YieldReason::Idle);
        assert_eq!(result.wake_millis, ANNOUNCE_INTERVAL_MS);
    }

    #[test]
    fn announce_fires_when_time_arrives() {
        let node = node();
        let result = node.step(0, 1_700_000_000);
        let result = node.step(result.wake_millis, 1_700_000_030);
        assert_eq!(result.reason, YieldReason::TxStarted);
        assert_eq!(result.radio_tx()[0], FRAME_ANNOUNCE);
        node.notify_tx_complete();

        // The next announce is scheduled one interval out.
        let result = node.step(ANNOUNCE_INTERVAL_MS + 100, 1_700_000_031);
        assert_eq!(result.reason, YieldReason::Idle);
        assert_eq!(result.wake_millis, 2 * ANNOUNCE_INTERVAL_MS);
    }

    #[test]
    fn heard_frames_become_posts() {
        let node = node();
        node.inject_radio_rx(b"hello room", -70.0, 9.0);
        node.inject_radio_rx(b"second", -70.0, 9.0);
        let _ = node.step(0, 1_700_000_000);

        node.inject_serial_rx(b"posts\r");
        let result = node.step(100, 1_700_000_000);
        assert!(String::from_utf8_lossy(result.serial_tx()).contains("2 posts"));
    }

    #[test]
    fn posts_survive_reboot() {
        let node = node();
        node.inject_radio_rx(b"durable", -70.0, 9.0);
        let _ = node.step(0, 1_700_000_000);

        node.reboot(NodeConfig::default().with_name("room1"));
        node.inject_serial_rx(b"posts\r");
        let result = node.step(100, 1_700_000_000);
        assert!(String::from_utf8_lossy(result.serial_tx()).contains("1 posts"));
    }

    #[test]
    fn erase_clears_the_board() {
        let node = node();
        node.inject_radio_rx(b"gone", -70.0, 9.0);
        let _ = node.step(0, 1_700_000_000);
        node.inject_serial_rx(b"erase\rposts\r");
        let result = node.step(100, 1_700_000_000);
        let output = String::from_utf8_lossy(result.serial_tx()).into_owned();
        assert!(output.contains("erased"));
        assert!(output.contains("0 posts"));
    }
}

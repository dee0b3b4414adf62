//! Simulated serial UART.
//!
//! Two lock-guarded byte queues per node: RX toward the firmware (fed by
//! `sim_inject_serial_rx`, possibly concurrently with the worker) and TX away
//! from it. Everything the firmware writes is mirrored into a parallel log
//! buffer so the coordinator can separate human-readable tracing from
//! protocol-level serial traffic; both are drained into the step result at
//! the end of each step.

use std::collections::VecDeque;
use std::sync::Mutex;

pub struct SerialPort {
    rx: Mutex<VecDeque<u8>>,
    tx: Mutex<Vec<u8>>,
    log: Mutex<Vec<u8>>,
}

impl SerialPort {
    pub fn new() -> Self {
        Self {
            rx: Mutex::new(VecDeque::new()),
            tx: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    // ------------------------------------------------------------------
    // Coordinator side
    // ------------------------------------------------------------------

    /// Append bytes to the firmware-facing RX queue.
    pub fn inject_rx(&self, data: &[u8]) {
        self.rx.lock().unwrap().extend(data.iter().copied());
    }

    /// Drain up to `max` TX bytes (step-end).
    pub fn drain_tx(&self, max: usize) -> Vec<u8> {
        let mut tx = self.tx.lock().unwrap();
        if tx.len() > max {
            log::warn!("serial TX drain truncated: {} bytes over cap", tx.len() - max);
            let rest = tx.split_off(max);
            let head = std::mem::replace(&mut *tx, rest);
            return head;
        }
        std::mem::take(&mut *tx)
    }

    /// Drain up to `max` log bytes (step-end).
    pub fn drain_log(&self, max: usize) -> Vec<u8> {
        let mut buf = self.log.lock().unwrap();
        if buf.len() > max {
            log::warn!("log drain truncated: {} bytes over cap", buf.len() - max);
            let rest = buf.split_off(max);
            let head = std::mem::replace(&mut *buf, rest);
            return head;
        }
        std::mem::take(&mut *buf)
    }

    // ------------------------------------------------------------------
    // Firmware side
    // ------------------------------------------------------------------

    /// Bytes waiting in the RX queue.
    pub fn available(&self) -> usize {
        self.rx.lock().unwrap().len()
    }

    /// Pop one RX byte, FIFO.
    pub fn read(&self) -> Option<u8> {
        self.rx.lock().unwrap().pop_front()
    }

    /// Look at the next RX byte without consuming it.
    pub fn peek(&self) -> Option<u8> {
        self.rx.lock().unwrap().front().copied()
    }

    /// Read up to `buf.len()` RX bytes; returns the count.
    pub fn read_bytes(&self, buf: &mut [u8]) -> usize {
        let mut rx = self.rx.lock().unwrap();
        let mut count = 0;
        while count < buf.len() {
            match rx.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        count
    }

    /// Write bytes to TX, mirroring them into the log buffer.
    pub fn write(&self, data: &[u8]) -> usize {
        self.tx.lock().unwrap().extend_from_slice(data);
        self.log.lock().unwrap().extend_from_slice(data);
        data.len()
    }

    pub fn write_byte(&self, byte: u8) {
        self.write(&[byte]);
    }

    pub fn print(&self, text: &str) {
        self.write(text.as_bytes());
    }

    pub fn println(&self, text: &str) {
        self.print(text);
        self.write_byte(b'\n');
    }

    /// Current TX length; the idle-detection policy samples this around each
    /// loop iteration.
    pub fn tx_len(&self) -> usize {
        self.tx.lock().unwrap().len()
    }
}

impl Default for SerialPort {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rx_fifo() {
        let serial = SerialPort::new();
        serial.inject_rx(b"ab");
        serial.inject_rx(b"c");
        assert_eq!(serial.available(), 3);
        assert_eq!(serial.peek(), Some(b'a'));
        assert_eq!(serial.read(), Some(b'a'));
        assert_eq!(serial.read(), Some(b'b'));
        assert_eq!(serial.read(), Some(b'c'));
        assert_eq!(serial.read(), None);
    }

    #[test]
    fn write_mirrors_into_log() {
        let serial = SerialPort::new();
        serial.println("hello");
        assert_eq!(serial.drain_tx(1024), b"hello\n");
        assert_eq!(serial.drain_log(1024), b"hello\n");
        // Both buffers are now empty.
        assert!(serial.drain_tx(1024).is_empty());
        assert!(serial.drain_log(1024).is_empty());
    }

    #[test]
    fn drain_respects_cap() {
        let serial = SerialPort::new();
        serial.write(b"0123456789");
        assert_eq!(serial.drain_tx(4), b"0123");
        // The remainder stays queued for the next drain.
        assert_eq!(serial.drain_tx(100), b"456789");
    }

    #[test]
    fn read_bytes_partial() {
        let serial = SerialPort::new();
        serial.inject_rx(b"xy");
        let mut buf = [0u8; 8];
        assert_eq!(serial.read_bytes(&mut buf), 2);
        assert_eq!(&buf[..2], b"xy");
    }
}

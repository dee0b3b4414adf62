//! Simulated LoRa transceiver.
//!
//! The radio never completes a transmission on its own. `start_send_raw`
//! parks the frame in the single pending-TX slot and the node yields with
//! `TxStarted`; the frame stays pending until the coordinator has propagated
//! it through its medium model and calls `notify_tx_complete`. Received
//! packets injected while the firmware is parked accumulate in a FIFO queue
//! and are drained by `recv` on the next step, RSSI and SNR verbatim.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use meshsim_api::MAX_RADIO_PACKET;

/// Radio state as seen by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    Idle,
    RxListen,
    TxPending,
    TxInFlight,
}

/// LoRa PHY parameters, as configured by the firmware.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoraParams {
    /// Frequency in MHz.
    pub freq: f32,
    /// Bandwidth in kHz.
    pub bw: f32,
    /// Spreading factor (7-12).
    pub sf: u8,
    /// Coding rate (5-8).
    pub cr: u8,
    /// TX power in dBm.
    pub tx_power: u8,
}

impl Default for LoraParams {
    fn default() -> Self {
        Self {
            freq: 915.0,
            bw: 250.0,
            sf: 11,
            cr: 5,
            tx_power: 20,
        }
    }
}

/// A packet delivered by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct RxPacket {
    pub data: Vec<u8>,
    pub rssi: f32,
    pub snr: f32,
}

/// The frame parked in the pending-TX slot.
#[derive(Debug, Clone)]
pub struct TxFrame {
    pub data: Vec<u8>,
    pub params: LoraParams,
    pub airtime_ms: u32,
}

/// Estimated LoRa time on air in milliseconds.
///
/// Symbol time `2^sf / bw`, preamble of 8 + 4.25 symbols, payload symbols
/// `8 + ceil(max(8L - 4sf + 28, 0) / (4sf)) * cr`.
pub fn time_on_air_ms(params: &LoraParams, payload_len: usize) -> u32 {
    let sf = params.sf as f64;
    let bw_hz = params.bw as f64 * 1000.0;
    let cr = params.cr as f64;

    let t_sym = 2.0_f64.powf(sf) / bw_hz;
    let n_preamble = 8.0 + 4.25;
    let pl = payload_len as f64;
    let payload_symbols = 8.0 + ((8.0 * pl - 4.0 * sf + 28.0).max(0.0) / (4.0 * sf)).ceil() * cr;

    let seconds = (n_preamble + payload_symbols) * t_sym;
    (seconds * 1000.0).ceil() as u32
}

pub struct SimRadio {
    state: Mutex<RadioState>,
    params: Mutex<LoraParams>,
    rx_queue: Mutex<VecDeque<RxPacket>>,
    tx_slot: Mutex<Option<TxFrame>>,
    tx_pending: AtomicBool,

    // Spin detection: consecutive firmware polls that observed nothing new.
    state_version: AtomicU32,
    idle_polls: AtomicU32,
    spin_threshold: AtomicU32,
    spin_logged: AtomicBool,
    log_spin: AtomicBool,
}

impl SimRadio {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RadioState::Idle),
            params: Mutex::new(LoraParams::default()),
            rx_queue: Mutex::new(VecDeque::new()),
            tx_slot: Mutex::new(None),
            tx_pending: AtomicBool::new(false),
            state_version: AtomicU32::new(0),
            idle_polls: AtomicU32::new(0),
            spin_threshold: AtomicU32::new(meshsim_api::DEFAULT_SPIN_DETECTION_THRESHOLD),
            spin_logged: AtomicBool::new(false),
            log_spin: AtomicBool::new(false),
        }
    }

    // ------------------------------------------------------------------
    // Firmware side
    // ------------------------------------------------------------------

    pub fn configure(&self, freq: f32, bw: f32, sf: u8, cr: u8, tx_power: u8) {
        *self.params.lock().unwrap() = LoraParams {
            freq,
            bw,
            sf,
            cr,
            tx_power,
        };
    }

    pub fn begin(&self) {
        *self.state.lock().unwrap() = RadioState::RxListen;
        self.rx_queue.lock().unwrap().clear();
        *self.tx_slot.lock().unwrap() = None;
        self.tx_pending.store(false, Ordering::Release);
        self.idle_polls.store(0, Ordering::Relaxed);
        self.spin_logged.store(false, Ordering::Relaxed);
    }

    pub fn params(&self) -> LoraParams {
        *self.params.lock().unwrap()
    }

    /// Park a frame in the pending-TX slot. Fails when a TX is already
    /// pending or the frame exceeds the wire buffer.
    pub fn start_send_raw(&self, data: &[u8]) -> bool {
        if data.len() > MAX_RADIO_PACKET {
            log::warn!("radio TX rejected: frame of {} bytes exceeds {}", data.len(), MAX_RADIO_PACKET);
            return false;
        }
        let mut slot = self.tx_slot.lock().unwrap();
        if slot.is_some() {
            return false;
        }
        let params = self.params();
        *slot = Some(TxFrame {
            data: data.to_vec(),
            params,
            airtime_ms: time_on_air_ms(&params, data.len()),
        });
        drop(slot);
        *self.state.lock().unwrap() = RadioState::TxPending;
        self.tx_pending.store(true, Ordering::Release);
        self.note_progress();
        true
    }

    pub fn is_sending(&self) -> bool {
        matches!(
            *self.state.lock().unwrap(),
            RadioState::TxPending | RadioState::TxInFlight
        )
    }

    pub fn has_pending_tx(&self) -> bool {
        self.tx_pending.load(Ordering::Acquire)
    }

    /// Drain one received packet, FIFO. Polls that come up empty count
    /// toward spin detection.
    pub fn recv(&self) -> Option<RxPacket> {
        let packet = self.rx_queue.lock().unwrap().pop_front();
        match packet {
            Some(packet) => {
                self.note_progress();
                Some(packet)
            }
            None => {
                self.note_idle_poll();
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Coordinator side
    // ------------------------------------------------------------------

    /// Enqueue a received packet. Packets injected by one coordinator call
    /// are drained in injection order.
    pub fn inject_rx(&self, data: &[u8], rssi: f32, snr: f32) {
        self.rx_queue.lock().unwrap().push_back(RxPacket {
            data: data.to_vec(),
            rssi,
            snr,
        });
        self.note_progress();
    }

    /// Finalize the in-flight transmission: `TxPending -> Idle`.
    pub fn notify_tx_complete(&self) {
        *self.tx_slot.lock().unwrap() = None;
        self.tx_pending.store(false, Ordering::Release);
        *self.state.lock().unwrap() = RadioState::Idle;
        self.note_progress();
    }

    /// Advisory wake for the poll path; bumps the state version observed by
    /// spin detection.
    pub fn notify_state_change(&self, version: u32) {
        self.state_version.store(version, Ordering::Release);
        self.note_progress();
    }

    pub fn state_version(&self) -> u32 {
        self.state_version.load(Ordering::Acquire)
    }

    /// A clone of the pending frame, for step-result assembly.
    pub fn pending_frame(&self) -> Option<TxFrame> {
        self.tx_slot.lock().unwrap().clone()
    }

    // ------------------------------------------------------------------
    // Spin detection
    // ------------------------------------------------------------------

    pub fn set_spin_detection(&self, threshold: u32, log_spin: bool) {
        self.spin_threshold.store(threshold, Ordering::Relaxed);
        self.log_spin.store(log_spin, Ordering::Relaxed);
        self.idle_polls.store(0, Ordering::Relaxed);
        self.spin_logged.store(false, Ordering::Relaxed);
    }

    fn note_progress(&self) {
        self.idle_polls.store(0, Ordering::Relaxed);
        self.spin_logged.store(false, Ordering::Relaxed);
    }

    fn note_idle_poll(&self) {
        let polls = self.idle_polls.fetch_add(1, Ordering::Relaxed) + 1;
        let threshold = self.spin_threshold.load(Ordering::Relaxed);
        if threshold > 0 && polls >= threshold && !self.spin_logged.swap(true, Ordering::Relaxed) {
            // Logged once per episode; the firmware keeps running and the
            // coordinator decides policy.
            if self.log_spin.load(Ordering::Relaxed) {
                log::warn!("spin detected: {polls} consecutive empty radio polls");
            } else {
                log::trace!("spin detected: {polls} consecutive empty radio polls");
            }
        }
    }

    /// Whether the current spin episode crossed the threshold (test hook).
    pub fn spin_detected(&self) -> bool {
        self.spin_logged.load(Ordering::Relaxed)
    }
}

impl Default for SimRadio {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pending_tx() {
        let radio = SimRadio::new();
        radio.begin();
        assert!(radio.start_send_raw(b"frame-a"));
        assert!(radio.has_pending_tx());
        assert!(radio.is_sending());
        // A second send before completion fails.
        assert!(!radio.start_send_raw(b"frame-b"));

        radio.notify_tx_complete();
        assert!(!radio.has_pending_tx());
        assert!(radio.start_send_raw(b"frame-b"));
        assert_eq!(radio.pending_frame().unwrap().data, b"frame-b");
    }

    #[test]
    fn oversized_tx_rejected() {
        let radio = SimRadio::new();
        radio.begin();
        let frame = vec![0u8; MAX_RADIO_PACKET + 1];
        assert!(!radio.start_send_raw(&frame));
        assert!(!radio.has_pending_tx());
    }

    #[test]
    fn rx_is_fifo_with_phy_values() {
        let radio = SimRadio::new();
        radio.begin();
        radio.inject_rx(&[0xAA], -80.0, 8.0);
        radio.inject_rx(&[0xBB], -92.5, 3.25);

        let first = radio.recv().unwrap();
        assert_eq!(first.data, vec![0xAA]);
        assert_eq!(first.rssi, -80.0);
        assert_eq!(first.snr, 8.0);

        let second = radio.recv().unwrap();
        assert_eq!(second.data, vec![0xBB]);
        assert_eq!(second.rssi, -92.5);
        assert!(radio.recv().is_none());
    }

    #[test]
    fn airtime_grows_with_payload_and_sf() {
        let params = LoraParams::default();
        let short = time_on_air_ms(&params, 10);
        let long = time_on_air_ms(&params, 200);
        assert!(long > short);
        assert!(short > 0);

        let slow = LoraParams {
            sf: 12,
            bw: 125.0,
            ..params
        };
        assert!(time_on_air_ms(&slow, 10) > time_on_air_ms(&params, 10));
    }

    #[test]
    fn tx_frame_captures_params_at_send_time() {
        let radio = SimRadio::new();
        radio.configure(868.0, 125.0, 9, 7, 14);
        radio.begin();
        assert!(radio.start_send_raw(&[1, 2, 3]));
        let frame = radio.pending_frame().unwrap();
        assert_eq!(frame.params.freq, 868.0);
        assert_eq!(frame.params.sf, 9);
        assert_eq!(frame.airtime_ms, time_on_air_ms(&frame.params, 3));
    }

    #[test]
    fn spin_detection_counts_empty_polls() {
        let radio = SimRadio::new();
        radio.begin();
        radio.set_spin_detection(3, false);
        radio.recv();
        radio.recv();
        assert!(!radio.spin_detected());
        radio.recv();
        assert!(radio.spin_detected());

        // Any progress resets the episode.
        radio.notify_state_change(1);
        assert!(!radio.spin_detected());
    }
}

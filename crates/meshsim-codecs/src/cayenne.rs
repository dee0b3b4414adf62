//! CayenneLPP telemetry encoder.
//!
//! Channel-tagged TLV encoding used by the firmware for sensor telemetry.
//! Each `add_*` call appends `channel, type, payload` and returns the new
//! buffer length, or 0 when the value would not fit (the partial buffer is
//! left untouched, matching the embedded encoder).

const LPP_DIGITAL_INPUT: u8 = 0;
const LPP_DIGITAL_OUTPUT: u8 = 1;
const LPP_ANALOG_INPUT: u8 = 2;
const LPP_ANALOG_OUTPUT: u8 = 3;
const LPP_LUMINOSITY: u8 = 101;
const LPP_PRESENCE: u8 = 102;
const LPP_TEMPERATURE: u8 = 103;
const LPP_RELATIVE_HUMIDITY: u8 = 104;
const LPP_ACCELEROMETER: u8 = 113;
const LPP_BAROMETRIC_PRESSURE: u8 = 115;
const LPP_GYROMETER: u8 = 134;
const LPP_GPS: u8 = 136;

/// Default buffer size, sized for a single LoRaWAN payload.
pub const MAX_BUFFER_SIZE: usize = 51;

pub struct CayenneLpp {
    buffer: Vec<u8>,
    max_size: usize,
}

impl CayenneLpp {
    pub fn new(max_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(max_size),
            max_size,
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn push(&mut self, channel: u8, kind: u8, payload: &[u8]) -> usize {
        if self.buffer.len() + 2 + payload.len() > self.max_size {
            return 0;
        }
        self.buffer.push(channel);
        self.buffer.push(kind);
        self.buffer.extend_from_slice(payload);
        self.buffer.len()
    }

    fn push_i16(&mut self, channel: u8, kind: u8, value: i16) -> usize {
        self.push(channel, kind, &value.to_be_bytes())
    }

    pub fn add_digital_input(&mut self, channel: u8, value: u8) -> usize {
        self.push(channel, LPP_DIGITAL_INPUT, &[value])
    }

    pub fn add_digital_output(&mut self, channel: u8, value: u8) -> usize {
        self.push(channel, LPP_DIGITAL_OUTPUT, &[value])
    }

    /// 0.01 signed.
    pub fn add_analog_input(&mut self, channel: u8, value: f32) -> usize {
        self.push_i16(channel, LPP_ANALOG_INPUT, (value * 100.0) as i16)
    }

    /// 0.01 signed.
    pub fn add_analog_output(&mut self, channel: u8, value: f32) -> usize {
        self.push_i16(channel, LPP_ANALOG_OUTPUT, (value * 100.0) as i16)
    }

    /// 1 lux unsigned.
    pub fn add_luminosity(&mut self, channel: u8, lux: u16) -> usize {
        self.push(channel, LPP_LUMINOSITY, &lux.to_be_bytes())
    }

    pub fn add_presence(&mut self, channel: u8, present: bool) -> usize {
        self.push(channel, LPP_PRESENCE, &[present as u8])
    }

    /// 0.1 degC signed.
    pub fn add_temperature(&mut self, channel: u8, celsius: f32) -> usize {
        self.push_i16(channel, LPP_TEMPERATURE, (celsius * 10.0) as i16)
    }

    /// 0.5 % unsigned.
    pub fn add_relative_humidity(&mut self, channel: u8, humidity: f32) -> usize {
        self.push(channel, LPP_RELATIVE_HUMIDITY, &[(humidity * 2.0) as u8])
    }

    /// 0.001 G signed per axis.
    pub fn add_accelerometer(&mut self, channel: u8, x: f32, y: f32, z: f32) -> usize {
        let mut payload = [0u8; 6];
        payload[0..2].copy_from_slice(&((x * 1000.0) as i16).to_be_bytes());
        payload[2..4].copy_from_slice(&((y * 1000.0) as i16).to_be_bytes());
        payload[4..6].copy_from_slice(&((z * 1000.0) as i16).to_be_bytes());
        self.push(channel, LPP_ACCELEROMETER, &payload)
    }

    /// 0.1 hPa unsigned.
    pub fn add_barometric_pressure(&mut self, channel: u8, hpa: f32) -> usize {
        self.push(channel, LPP_BAROMETRIC_PRESSURE, &((hpa * 10.0) as u16).to_be_bytes())
    }

    /// 0.01 deg/s signed per axis.
    pub fn add_gyrometer(&mut self, channel: u8, x: f32, y: f32, z: f32) -> usize {
        let mut payload = [0u8; 6];
        payload[0..2].copy_from_slice(&((x * 100.0) as i16).to_be_bytes());
        payload[2..4].copy_from_slice(&((y * 100.0) as i16).to_be_bytes());
        payload[4..6].copy_from_slice(&((z * 100.0) as i16).to_be_bytes());
        self.push(channel, LPP_GYROMETER, &payload)
    }

    /// Lat/lon at 0.0001 deg, altitude at 0.01 m, 3 bytes each, big-endian.
    pub fn add_gps(&mut self, channel: u8, lat: f32, lon: f32, alt: f32) -> usize {
        let mut payload = [0u8; 9];
        for (slot, value, scale) in [
            (0usize, lat, 10_000.0f32),
            (3, lon, 10_000.0),
            (6, alt, 100.0),
        ] {
            let scaled = (value * scale) as i32;
            let bytes = scaled.to_be_bytes();
            payload[slot..slot + 3].copy_from_slice(&bytes[1..4]);
        }
        self.push(channel, LPP_GPS, &payload)
    }
}

impl Default for CayenneLpp {
    fn default() -> Self {
        Self::new(MAX_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_encoding() {
        let mut lpp = CayenneLpp::default();
        assert_eq!(lpp.add_temperature(3, 27.2), 4);
        // 27.2 degC -> 272 -> 0x0110 big-endian.
        assert_eq!(lpp.buffer(), &[3, 103, 0x01, 0x10]);
    }

    #[test]
    fn negative_temperature() {
        let mut lpp = CayenneLpp::default();
        lpp.add_temperature(1, -4.5);
        // -45 as i16 big-endian.
        assert_eq!(lpp.buffer(), &[1, 103, 0xFF, 0xD3]);
    }

    #[test]
    fn digital_and_humidity() {
        let mut lpp = CayenneLpp::default();
        lpp.add_digital_input(0, 1);
        lpp.add_relative_humidity(2, 51.0);
        assert_eq!(lpp.buffer(), &[0, 0, 1, 2, 104, 102]);
    }

    #[test]
    fn gps_encoding() {
        let mut lpp = CayenneLpp::default();
        lpp.add_gps(1, 42.5, -87.5, 10.0);
        // 425000, -875000 and 1000 as 3-byte big-endian fields.
        assert_eq!(
            lpp.buffer(),
            &[1, 136, 0x06, 0x7C, 0x28, 0xF2, 0xA6, 0x08, 0x00, 0x03, 0xE8]
        );
    }

    #[test]
    fn overflow_returns_zero_and_preserves_buffer() {
        let mut lpp = CayenneLpp::new(6);
        assert_eq!(lpp.add_temperature(1, 20.0), 4);
        assert_eq!(lpp.add_temperature(2, 21.0), 0);
        assert_eq!(lpp.len(), 4);
        lpp.reset();
        assert!(lpp.is_empty());
    }
}

//! base64 in the encode/decode shape the firmware's helper header exposes.

pub use ::base64::DecodeError;

/// Standard-alphabet base64 with padding.
pub fn encode(data: &[u8]) -> String {
    ::base64::encode(data)
}

pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    ::base64::decode(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc4648_vectors() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"f"), "Zg==");
        assert_eq!(encode(b"fo"), "Zm8=");
        assert_eq!(encode(b"foo"), "Zm9v");
        assert_eq!(encode(b"foobar"), "Zm9vYmFy");
    }

    #[test]
    fn round_trip() {
        let data: Vec<u8> = (0u8..=255).collect();
        assert_eq!(decode(&encode(&data)).unwrap(), data);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode("not base64!").is_err());
    }
}

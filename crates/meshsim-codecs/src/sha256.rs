//! SHA-256 and HMAC-SHA-256 in the incremental call shape the firmware's
//! embedded hash helper exposes.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256 as Sha256Inner};

/// Digest size in bytes.
pub const HASH_SIZE: usize = 32;

type HmacSha256 = Hmac<Sha256Inner>;

/// Incremental SHA-256.
pub struct Sha256 {
    inner: Sha256Inner,
}

impl Sha256 {
    pub fn new() -> Self {
        Self {
            inner: Sha256Inner::new(),
        }
    }

    pub fn reset(&mut self) {
        self.inner = Sha256Inner::new();
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize(self) -> [u8; HASH_SIZE] {
        self.inner.finalize().into()
    }
}

impl Default for Sha256 {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot SHA-256.
pub fn sha256(data: &[u8]) -> [u8; HASH_SIZE] {
    Sha256Inner::digest(data).into()
}

/// One-shot HMAC-SHA-256.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; HASH_SIZE] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_digest() {
        // Published digest of the empty message.
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(sha256(b""), expected.as_slice());
    }

    #[test]
    fn abc_digest() {
        let expected =
            hex::decode("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
                .unwrap();
        assert_eq!(sha256(b"abc"), expected.as_slice());
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut hasher = Sha256::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.finalize(), sha256(b"hello world"));
    }

    #[test]
    fn hmac_rfc4231_case_1() {
        let key = [0x0b; 20];
        let expected =
            hex::decode("b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7")
                .unwrap();
        assert_eq!(hmac_sha256(&key, b"Hi There"), expected.as_slice());
    }

    #[test]
    fn hmac_rfc4231_case_2() {
        let expected =
            hex::decode("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
                .unwrap();
        assert_eq!(
            hmac_sha256(b"Jefe", b"what do ya want for nothing?"),
            expected.as_slice()
        );
    }

    #[test]
    fn hmac_rfc4231_long_key() {
        // Case 6: 131-byte key, hashed down to block size internally.
        let key = [0xaa; 131];
        let expected =
            hex::decode("60e431591ee0b67f0d8a26aacbf5b77f8e0bc6213728c5140546040f0ee37f54")
                .unwrap();
        assert_eq!(
            hmac_sha256(&key, b"Test Using Larger Than Block-Size Key - Hash Key First"),
            expected.as_slice()
        );
    }
}

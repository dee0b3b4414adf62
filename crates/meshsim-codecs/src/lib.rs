//! # meshsim-codecs
//!
//! Commodity codecs and crypto primitives the simulated firmware depends
//! on: SHA-256 / HMAC-SHA-256, Ed25519 with the firmware's 64-byte
//! expanded-key convention, base64, and a CayenneLPP telemetry encoder.
//!
//! These are thin wrappers over ecosystem crates (plus an in-repo CayenneLPP
//! encoder, which has no maintained crate) presenting the call shapes the
//! firmware expects from its embedded helper libraries.

pub mod base64;
pub mod cayenne;
pub mod ed25519;
pub mod sha256;

pub use cayenne::CayenneLpp;
pub use ed25519::CryptoError;

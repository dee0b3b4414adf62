//! Ed25519 with the firmware's key convention.
//!
//! The firmware carries a 64-byte "expanded" private key: the SHA-512 of a
//! 32-byte seed with the Ed25519 scalar clamp applied to the first half.
//! Identity injection at node creation hands the node exactly that form, so
//! the wrapper signs from expanded keys rather than seeds.

use ed25519_dalek::{ExpandedSecretKey, PublicKey, SecretKey, Signature, Verifier};
use thiserror::Error;

/// Public key size in bytes.
pub const PUB_KEY_SIZE: usize = 32;
/// Expanded private key size in bytes.
pub const PRV_KEY_SIZE: usize = 64;
/// Signature size in bytes.
pub const SIGNATURE_SIZE: usize = 64;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("malformed key material")]
    InvalidKey,
    #[error("malformed signature")]
    InvalidSignature,
}

/// Derive an (expanded private, public) pair from a 32-byte seed.
pub fn generate_keypair(seed: &[u8; 32]) -> ([u8; PRV_KEY_SIZE], [u8; PUB_KEY_SIZE]) {
    let secret = SecretKey::from_bytes(seed).expect("seed is the exact key length");
    let expanded = ExpandedSecretKey::from(&secret);
    let public = PublicKey::from(&expanded);
    (expanded.to_bytes(), public.to_bytes())
}

/// Derive the public key from an expanded private key.
pub fn derive_public_key(private_key: &[u8; PRV_KEY_SIZE]) -> Result<[u8; PUB_KEY_SIZE], CryptoError> {
    let expanded =
        ExpandedSecretKey::from_bytes(private_key).map_err(|_| CryptoError::InvalidKey)?;
    Ok(PublicKey::from(&expanded).to_bytes())
}

/// Sign `message` with an expanded private key.
pub fn sign(
    private_key: &[u8; PRV_KEY_SIZE],
    public_key: &[u8; PUB_KEY_SIZE],
    message: &[u8],
) -> Result<[u8; SIGNATURE_SIZE], CryptoError> {
    let expanded =
        ExpandedSecretKey::from_bytes(private_key).map_err(|_| CryptoError::InvalidKey)?;
    let public = PublicKey::from_bytes(public_key).map_err(|_| CryptoError::InvalidKey)?;
    Ok(expanded.sign(message, &public).to_bytes())
}

/// Verify a detached signature.
pub fn verify(signature: &[u8; SIGNATURE_SIZE], public_key: &[u8; PUB_KEY_SIZE], message: &[u8]) -> bool {
    let Ok(public) = PublicKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::try_from(&signature[..]) else {
        return false;
    };
    public.verify(message, &signature).is_ok()
}

//! Ed25519 identity types.
//!
//! - [`PrivateKey`] - The authority signing key, zeroized on drop
//! - [`PublicKey`] - Verification key (authority or enrolled device)
//! - [`Signature`] - Fixed-width 64-byte Ed25519 signature
//! - [`Fingerprint`] - `SHA256:{base64}` identifier for log output
//!
//! # Example
//!
//! ```
//! use rollcall_auth::identity::PrivateKey;
//!
//! let authority = PrivateKey::generate();
//! let signature = authority.sign(b"payload");
//! assert!(authority.public_key().verify(b"payload", &signature));
//! assert_eq!(signature.to_hex().len(), 128);
//! ```

mod keys;

pub use keys::{
    Fingerprint, KeyError, PrivateKey, PublicKey, SecretBytes, Signature, PUBLIC_KEY_LEN,
    SIGNATURE_LEN,
};

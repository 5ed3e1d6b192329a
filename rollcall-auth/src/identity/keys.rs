//! Ed25519 key material for the certificate authority and enrolled devices.
//!
//! - Private keys are zeroized on drop
//! - No Debug/Display implementations that leak secrets
//! - Public keys and signatures render as uppercase hex on the wire
//! - PKCS#8 exports are wrapped in [`SecretBytes`]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use ed25519_dalek::Signer;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a raw Ed25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of a raw Ed25519 signature (`R || S`).
pub const SIGNATURE_LEN: usize = 64;

/// Errors that can occur during key operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum KeyError {
    /// The provided bytes have an invalid length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// The provided bytes do not represent a valid key.
    #[error("invalid key format")]
    InvalidFormat,

    /// The provided string is not valid hexadecimal.
    #[error("invalid hex encoding")]
    InvalidHex,
}

/// Encoded private key material, wiped when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for SecretBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The authority's Ed25519 signing key.
///
/// The inner `SigningKey` wipes itself on drop. Signing is deterministic
/// and constant-time in the secret scalar. No `Debug` impl.
pub struct PrivateKey(ed25519_dalek::SigningKey);

impl PrivateKey {
    /// Fresh key from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng))
    }

    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message))
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Export the private key as PKCS#8 DER bytes.
    ///
    /// # Panics
    ///
    /// Never in practice: Ed25519 keys always encode to PKCS#8.
    #[must_use]
    pub fn to_pkcs8_der(&self) -> SecretBytes {
        SecretBytes(
            self.0
                .to_pkcs8_der()
                .expect("Ed25519 key should always encode to PKCS#8")
                .as_bytes()
                .to_vec(),
        )
    }

    /// Export the private key as a PKCS#8 PEM document (`BEGIN PRIVATE KEY`).
    ///
    /// # Panics
    ///
    /// Never in practice: Ed25519 keys always encode to PKCS#8.
    #[must_use]
    pub fn to_pkcs8_pem(&self) -> SecretBytes {
        let pem = self
            .0
            .to_pkcs8_pem(ed25519_dalek::pkcs8::spki::der::pem::LineEnding::LF)
            .expect("Ed25519 key should always encode to PKCS#8 PEM");
        SecretBytes(pem.as_bytes().to_vec())
    }

    /// Load a private key from PKCS#8 DER bytes.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidFormat` if the bytes are not an Ed25519 PKCS#8 key.
    pub fn from_pkcs8_der(bytes: &[u8]) -> Result<Self, KeyError> {
        ed25519_dalek::SigningKey::from_pkcs8_der(bytes)
            .map(Self)
            .map_err(|_| KeyError::InvalidFormat)
    }

    /// Load a private key from a PKCS#8 PEM document.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidFormat` if the document is not an Ed25519 PKCS#8 key.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, KeyError> {
        ed25519_dalek::SigningKey::from_pkcs8_pem(pem)
            .map(Self)
            .map_err(|_| KeyError::InvalidFormat)
    }
}

/// A public Ed25519 verification key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey(ed25519_dalek::VerifyingKey);

impl PublicKey {
    /// Decode a compressed Edwards point.
    ///
    /// # Errors
    ///
    /// `KeyError::InvalidLength` unless exactly 32 bytes are given, and
    /// `KeyError::InvalidFormat` when they do not decompress to a point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; PUBLIC_KEY_LEN] =
            bytes.try_into().map_err(|_| KeyError::InvalidLength {
                expected: PUBLIC_KEY_LEN,
                actual: bytes.len(),
            })?;
        ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|_| KeyError::InvalidFormat)
    }

    /// Parse a public key from hex (either case).
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidHex` for non-hex input, otherwise the
    /// errors of [`PublicKey::from_bytes`].
    pub fn from_hex(encoded: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(encoded.trim()).map_err(|_| KeyError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.0.to_bytes()
    }

    /// Uppercase hex rendering used on the wire.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.to_bytes())
    }

    /// Strict Ed25519 verification (rejects small-order keys and
    /// non-canonical signatures).
    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.0.verify_strict(message, &signature.0).is_ok()
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", Fingerprint::from_public_key(self))
    }
}

/// An Ed25519 signature.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    /// # Errors
    ///
    /// `KeyError::InvalidLength` unless exactly 64 bytes are given.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; SIGNATURE_LEN] =
            bytes.try_into().map_err(|_| KeyError::InvalidLength {
                expected: SIGNATURE_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(ed25519_dalek::Signature::from_bytes(&bytes)))
    }

    /// Parse a signature from hex (either case).
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidHex` for non-hex input, otherwise the
    /// errors of [`Signature::from_bytes`].
    pub fn from_hex(encoded: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(encoded.trim()).map_err(|_| KeyError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.0.to_bytes()
    }

    /// Uppercase hex rendering used on the wire.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.to_bytes())
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes = self.0.to_bytes();
        write!(
            f,
            "Signature({:02X}{:02X}{:02X}{:02X}...)",
            bytes[0], bytes[1], bytes[2], bytes[3]
        )
    }
}

/// A SHA-256 fingerprint of a public key.
///
/// Format: `SHA256:{url_safe_base64_no_padding}`. Used to identify the
/// loaded authority key in logs without printing the key itself.
#[derive(Clone, Eq, Hash)]
#[allow(clippy::derived_hash_with_manual_eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub const PREFIX: &'static str = "SHA256:";

    #[must_use]
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let hash = Sha256::digest(public_key.to_bytes());
        Self(format!("{}{}", Self::PREFIX, URL_SAFE_NO_PAD.encode(hash)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", self.0)
    }
}

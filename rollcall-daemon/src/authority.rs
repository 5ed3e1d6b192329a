//! Authority key material.
//!
//! The authority key is loaded once at startup and passed explicitly to the
//! issuance service. There is no reload path: a daemon that cannot load its
//! key refuses to start.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use rollcall_auth::cert::{CertificatePayload, IssuedCertificate};
use rollcall_auth::identity::{Fingerprint, PrivateKey, PublicKey};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

const PEM_MARKER: &[u8] = b"-----BEGIN";

/// The certificate authority: a signing key and its public half.
pub struct Authority {
    key: PrivateKey,
    public_key: PublicKey,
}

impl Authority {
    /// Load the authority key from a PKCS#8 file (PEM or DER).
    ///
    /// # Errors
    ///
    /// `KeyLoadError::Missing` if the file does not exist,
    /// `KeyLoadError::Io` if it cannot be read, and
    /// `KeyLoadError::Malformed` if it is not an Ed25519 PKCS#8 key.
    pub fn load(path: &Path) -> Result<Self, KeyLoadError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(KeyLoadError::Missing(path.to_path_buf()));
            }
            Err(source) => {
                return Err(KeyLoadError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let key = decode_private_key(&bytes)
            .ok_or_else(|| KeyLoadError::Malformed(path.to_path_buf()))?;
        Ok(Self::from_key(key))
    }

    /// Wrap an already-loaded key.
    pub fn from_key(key: PrivateKey) -> Self {
        let public_key = key.public_key();
        Self { key, public_key }
    }

    /// The verification key handed to certificate verifiers.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Raw public key bytes.
    pub fn public_bytes(&self) -> [u8; 32] {
        self.public_key.to_bytes()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_public_key(&self.public_key)
    }

    /// Sign a certificate payload.
    pub fn sign(&self, payload: CertificatePayload) -> IssuedCertificate {
        IssuedCertificate::sign(&self.key, payload)
    }
}

impl std::fmt::Debug for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authority")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

fn decode_private_key(bytes: &[u8]) -> Option<PrivateKey> {
    let trimmed = bytes.trim_ascii_start();
    if trimmed.starts_with(PEM_MARKER) {
        let pem = std::str::from_utf8(trimmed).ok()?;
        PrivateKey::from_pkcs8_pem(pem).ok()
    } else {
        PrivateKey::from_pkcs8_der(bytes).ok()
    }
}

/// Generate a new authority key and write it as PKCS#8 PEM.
///
/// Refuses to replace an existing key unless `force` is set. On Unix the
/// file is created with owner-only permissions.
pub fn generate_key_file(path: &Path, force: bool) -> Result<PublicKey, KeyLoadError> {
    let io_err = |source| KeyLoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    // A replaced key is a new file, not a truncated one
    if force {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(e)),
        }
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::AlreadyExists => KeyLoadError::AlreadyExists(path.to_path_buf()),
        _ => io_err(e),
    })?;

    let key = PrivateKey::generate();
    file.write_all(key.to_pkcs8_pem().as_ref()).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;

    Ok(key.public_key())
}

/// Errors loading or writing the authority key.
#[derive(Debug, thiserror::Error)]
pub enum KeyLoadError {
    #[error("authority key not found at {0}")]
    Missing(PathBuf),
    #[error("failed to access authority key at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("authority key at {0} is not an Ed25519 PKCS#8 key")]
    Malformed(PathBuf),
    #[error("authority key already exists at {0}")]
    AlreadyExists(PathBuf),
}

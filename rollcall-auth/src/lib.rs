//! Credential library for rollcall.
//!
//! This crate is intentionally IO-free:
//! - No filesystem operations
//! - No network calls
//! - No database interactions
//! - No logging
//!
//! It provides the authority key types, the byte-exact certificate codec
//! shared with verifiers, and the enrollment token rules.
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use rollcall_auth::{CertificatePayload, IssuedCertificate, PrivateKey};
//!
//! let authority = PrivateKey::generate();
//! let device = PrivateKey::generate().public_key();
//!
//! let payload = CertificatePayload::new("E1", device, Utc::now() + Duration::days(30)).unwrap();
//! let cert = IssuedCertificate::sign(&authority, payload);
//! assert!(cert.verify());
//! ```

pub mod cert;
pub mod enrollment;
pub mod identity;

pub use cert::{verify_certificate, CertError, CertificatePayload, IssuedCertificate};
pub use enrollment::{EnrollmentError, RedemptionState};
pub use identity::{Fingerprint, KeyError, PrivateKey, PublicKey, Signature};

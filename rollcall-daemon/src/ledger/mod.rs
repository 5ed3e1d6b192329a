//! Issuance ledger: enrollment records and the identities behind them.

mod store;

pub use store::{CertificateHolder, EnrollmentRecord, IssuanceLedger, LedgerError};

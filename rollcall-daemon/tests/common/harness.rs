//! Test harness for daemon E2E tests.
//!
//! Builds the full router over an in-memory database and drives it with
//! `oneshot` requests (no network).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, FixedOffset, Utc};
use http_body_util::BodyExt;
use rollcall_auth::identity::{PrivateKey, PublicKey};
use rollcall_daemon::authority::Authority;
use rollcall_daemon::checkin::{AlwaysOnTime, CheckinStore, NeverRevoked, StatusPolicy};
use rollcall_daemon::db::{encode_timestamp, DbService};
use rollcall_daemon::http::{router, AppState};
use rollcall_daemon::ledger::{EnrollmentRecord, IssuanceLedger};
use rollcall_daemon::services::{CheckinService, IssuanceService};
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;

/// A daemon wired exactly as `serve` wires it, over in-memory SQLite.
pub struct TestDaemon {
    pub pool: SqlitePool,
    pub ledger: IssuanceLedger,
    pub store: CheckinStore,
    pub authority_public_key: PublicKey,
    app: Router,
}

#[allow(dead_code)]
impl TestDaemon {
    /// Create a test daemon with a 30 day certificate validity.
    pub async fn new() -> Self {
        Self::with_options(Duration::days(30), Arc::new(AlwaysOnTime)).await
    }

    pub async fn with_options(ttl: Duration, policy: Arc<dyn StatusPolicy>) -> Self {
        let db = DbService::open_in_memory()
            .await
            .expect("Failed to create in-memory database");
        let pool = db.pool().clone();

        let authority = Arc::new(Authority::from_key(PrivateKey::generate()));
        let authority_public_key = authority.public_key().clone();

        let ledger = IssuanceLedger::new(pool.clone());
        let store = CheckinStore::new(pool.clone());

        let issuance = IssuanceService::new(ledger.clone(), authority, ttl);
        let checkin = CheckinService::new(
            ledger.clone(),
            store.clone(),
            policy,
            Arc::new(NeverRevoked),
            FixedOffset::east_opt(0).expect("valid offset"),
        );

        Self {
            pool,
            ledger,
            store,
            authority_public_key,
            app: router(AppState { issuance, checkin }),
        }
    }

    /// Register an identity and an unissued enrollment record for it.
    pub async fn enroll(&self, record_id: &str, identity_id: &str, name: &str, token: &str) {
        self.ledger
            .add_identity(identity_id, name)
            .await
            .or_else(|e| match e {
                rollcall_daemon::ledger::LedgerError::Duplicate(_) => Ok(()),
                other => Err(other),
            })
            .expect("Failed to add identity");
        self.ledger
            .create_record(record_id, identity_id, token)
            .await
            .expect("Failed to create record");
    }

    pub async fn record(&self, record_id: &str) -> EnrollmentRecord {
        self.ledger
            .lookup(record_id)
            .await
            .expect("Failed to look up record")
    }

    /// Move a record's expiry into the past.
    pub async fn expire(&self, record_id: &str) {
        sqlx::query("UPDATE enrollments SET valid_until = ? WHERE record_id = ?")
            .bind(encode_timestamp(&(Utc::now() - Duration::seconds(1))))
            .bind(record_id)
            .execute(&self.pool)
            .await
            .expect("Failed to expire record");
    }

    pub async fn checkin_count(&self) -> i64 {
        self.store.count().await.expect("Failed to count check-ins")
    }

    pub fn app(&self) -> Router {
        self.app.clone()
    }

    /// POST a JSON body and return the status and decoded response body.
    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        post_json(self.app(), path, body.to_string()).await
    }

    /// POST a raw body, for malformed-input tests.
    pub async fn post_raw(&self, path: &str, body: &str) -> StatusCode {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("Failed to build request");
        self.app()
            .oneshot(request)
            .await
            .expect("Router failed")
            .status()
    }

    pub async fn get(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .uri(path)
            .body(Body::empty())
            .expect("Failed to build request");
        let response = self.app().oneshot(request).await.expect("Router failed");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Issue a certificate for a fresh device key.
    pub async fn sign_cert(&self, record_id: &str, token: &str) -> (StatusCode, Value, TestDevice) {
        let device = TestDevice::new();
        let (status, body) = self
            .post(
                "/sign_cert",
                serde_json::json!({
                    "recordId": record_id,
                    "presentedToken": token,
                    "publicKeyHex": device.public_key_hex(),
                }),
            )
            .await;
        (status, body, device)
    }

    pub async fn checkin(&self, certificate_id: &str, session_id: Option<i64>) -> (StatusCode, Value) {
        let mut body = serde_json::json!({ "certificateId": certificate_id });
        if let Some(session_id) = session_id {
            body["sessionId"] = session_id.into();
        }
        self.post("/checkin", body).await
    }
}

/// POST `body` as JSON through `app`.
pub async fn post_json(app: Router, path: &str, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .expect("Failed to build request");

    let response = app.oneshot(request).await.expect("Router failed");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// A device with its own keypair.
pub struct TestDevice {
    pub private_key: PrivateKey,
}

#[allow(dead_code)]
impl TestDevice {
    pub fn new() -> Self {
        Self {
            private_key: PrivateKey::generate(),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.private_key.public_key()
    }

    pub fn public_key_hex(&self) -> String {
        self.public_key().to_hex()
    }
}

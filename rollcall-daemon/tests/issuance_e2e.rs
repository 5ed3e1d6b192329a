//! End-to-end tests for certificate issuance.
//!
//! These drive `POST /sign_cert` through the full router and check:
//! 1. A token redeems exactly once, even under concurrent requests
//! 2. Rejections never mutate the ledger and never explain themselves
//! 3. Issued certificates verify independently of the daemon

mod common;

use axum::http::StatusCode;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use common::{post_json, TestDaemon};
use rollcall_auth::cert::{verify_certificate, CertificatePayload};
use rollcall_auth::identity::{PrivateKey, PublicKey, Signature};
use serde_json::json;

fn parse_valid_until(body: &serde_json::Value) -> DateTime<Utc> {
    let s = body["validUntil"].as_str().expect("validUntil");
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .expect("validUntil format")
        .and_utc()
}

// ============================================================================
// Example scenario
// ============================================================================

#[tokio::test]
async fn test_redeem_then_repeat_is_rejected() {
    let daemon = TestDaemon::new().await;
    daemon.enroll("E1", "emp-42", "Ada", "abc123").await;

    let (status, body, device) = daemon.sign_cert("E1", "abc123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));

    let record = daemon.record("E1").await;
    assert!(record.issued);
    assert_eq!(
        record.bound_public_key.as_deref(),
        Some(device.public_key().to_bytes().as_slice())
    );

    // Same call again: already issued
    let (status, body) = daemon
        .post(
            "/sign_cert",
            json!({
                "recordId": "E1",
                "presentedToken": "abc123",
                "publicKeyHex": device.public_key_hex(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "success": false }));

    // The first binding is untouched
    assert_eq!(
        daemon.record("E1").await.bound_public_key,
        record.bound_public_key
    );
}

#[tokio::test]
async fn test_success_response_shape() {
    let daemon = TestDaemon::new().await;
    daemon.enroll("E1", "emp-42", "Ada", "abc123").await;

    let before = Utc::now();
    let (_, body, _) = daemon.sign_cert("E1", "abc123").await;

    let signature = body["signature"].as_str().unwrap();
    let authority = body["authorityPublicKey"].as_str().unwrap();
    assert_eq!(signature.len(), 128);
    assert_eq!(authority.len(), 64);
    assert_eq!(signature, signature.to_uppercase());
    assert_eq!(authority, authority.to_uppercase());
    assert_eq!(authority, daemon.authority_public_key.to_hex());

    // Default validity is 30 days from issuance
    let valid_until = parse_valid_until(&body);
    let expected = before + Duration::days(30);
    assert!((valid_until - expected).num_seconds().abs() <= 2);
}

// ============================================================================
// Single redemption
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redemptions_yield_one_certificate() {
    const ATTEMPTS: usize = 8;

    let daemon = TestDaemon::new().await;
    daemon.enroll("E1", "emp-42", "Ada", "abc123").await;

    let mut handles = Vec::new();
    let mut keys = Vec::new();
    for _ in 0..ATTEMPTS {
        let key = PrivateKey::generate().public_key();
        let body = json!({
            "recordId": "E1",
            "presentedToken": "abc123",
            "publicKeyHex": key.to_hex(),
        })
        .to_string();
        keys.push(key);
        handles.push(tokio::spawn(post_json(daemon.app(), "/sign_cert", body)));
    }

    let mut winners = Vec::new();
    for (i, handle) in handles.into_iter().enumerate() {
        let (status, body) = handle.await.unwrap();
        match status {
            StatusCode::OK => winners.push(i),
            StatusCode::FORBIDDEN => assert_eq!(body, json!({ "success": false })),
            other => panic!("unexpected status {}", other),
        }
    }

    assert_eq!(winners.len(), 1, "exactly one redemption must succeed");

    let record = daemon.record("E1").await;
    assert!(record.issued);
    assert_eq!(
        record.bound_public_key.as_deref(),
        Some(keys[winners[0]].to_bytes().as_slice())
    );
}

// ============================================================================
// Token binding and uniform rejection
// ============================================================================

#[tokio::test]
async fn test_wrong_token_does_not_consume_record() {
    let daemon = TestDaemon::new().await;
    daemon.enroll("E1", "emp-42", "Ada", "abc123").await;

    let (status, body, _) = daemon.sign_cert("E1", "abc124").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "success": false }));

    let record = daemon.record("E1").await;
    assert!(!record.issued);
    assert!(record.bound_public_key.is_none());
    assert!(record.valid_until.is_none());

    let (status, _, _) = daemon.sign_cert("E1", "abc123").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rejections_are_indistinguishable() {
    let daemon = TestDaemon::new().await;
    daemon.enroll("E1", "emp-42", "Ada", "abc123").await;
    daemon.enroll("E2", "emp-42", "Ada", "def456").await;
    daemon.sign_cert("E2", "def456").await;

    let unknown = daemon.sign_cert("E9", "abc123").await;
    let mismatch = daemon.sign_cert("E1", "nope").await;
    let reused = daemon.sign_cert("E2", "def456").await;

    for (status, body, _) in [&unknown, &mismatch, &reused] {
        assert_eq!(*status, StatusCode::FORBIDDEN);
        assert_eq!(*body, json!({ "success": false }));
    }
}

#[tokio::test]
async fn test_malformed_public_key_is_client_error() {
    let daemon = TestDaemon::new().await;
    daemon.enroll("E1", "emp-42", "Ada", "abc123").await;

    let short = "AB".repeat(31);
    for bad in ["", "not hex", "04", short.as_str()] {
        let (status, body) = daemon
            .post(
                "/sign_cert",
                json!({ "recordId": "E1", "presentedToken": "abc123", "publicKeyHex": bad }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "input {:?}", bad);
        assert_eq!(body, json!({ "success": false }));
    }

    assert!(!daemon.record("E1").await.issued);
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let daemon = TestDaemon::new().await;

    assert!(daemon.post_raw("/sign_cert", "{").await.is_client_error());
    assert!(daemon
        .post_raw("/sign_cert", r#"{"recordId": "E1"}"#)
        .await
        .is_client_error());
}

#[tokio::test]
async fn test_numeric_record_id_and_short_field_names() {
    let daemon = TestDaemon::new().await;
    daemon.enroll("7", "emp-42", "Ada", "abc123").await;
    let device = PrivateKey::generate().public_key();

    let (status, body) = daemon
        .post(
            "/sign_cert",
            json!({ "id": 7, "token": "abc123", "pub_key": device.to_hex() }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
}

// ============================================================================
// Signature validity
// ============================================================================

#[tokio::test]
async fn test_certificate_verifies_from_wire_fields() {
    let daemon = TestDaemon::new().await;
    daemon.enroll("E1", "emp-42", "Ada", "abc123").await;

    let (_, body, device) = daemon.sign_cert("E1", "abc123").await;

    // Everything a verifier gets comes from the response
    let authority = PublicKey::from_hex(body["authorityPublicKey"].as_str().unwrap()).unwrap();
    let signature = Signature::from_hex(body["signature"].as_str().unwrap()).unwrap();
    let expiry = body["validUntil"].as_str().unwrap();
    let key = device.public_key();

    assert!(verify_certificate(&authority, "E1", &key, expiry, &signature));

    // Altering any one field breaks it
    assert!(!verify_certificate(&authority, "E2", &key, expiry, &signature));
    let other_key = PrivateKey::generate().public_key();
    assert!(!verify_certificate(&authority, "E1", &other_key, expiry, &signature));
    let later = parse_valid_until(&body) + Duration::seconds(1);
    let later = later.format("%Y-%m-%d %H:%M:%S").to_string();
    assert!(!verify_certificate(&authority, "E1", &key, &later, &signature));
    let other_authority = PrivateKey::generate().public_key();
    assert!(!verify_certificate(&other_authority, "E1", &key, expiry, &signature));
}

#[tokio::test]
async fn test_verifier_reconstructs_signed_bytes() {
    let daemon = TestDaemon::new().await;
    daemon.enroll("E1", "emp-42", "Ada", "abc123").await;

    let (_, body, device) = daemon.sign_cert("E1", "abc123").await;
    let expiry = body["validUntil"].as_str().unwrap();
    let signature = Signature::from_hex(body["signature"].as_str().unwrap()).unwrap();

    let payload = CertificatePayload::from_parts("E1", device.public_key(), expiry).unwrap();
    let bytes = payload.encode();

    assert_eq!(CertificatePayload::decode(&bytes).unwrap(), payload);
    assert!(daemon.authority_public_key.verify(&bytes, &signature));
}

#[tokio::test]
async fn test_configured_validity() {
    let daemon = TestDaemon::with_options(
        Duration::hours(12),
        std::sync::Arc::new(rollcall_daemon::checkin::AlwaysOnTime),
    )
    .await;
    daemon.enroll("E1", "emp-42", "Ada", "abc123").await;

    let before = Utc::now();
    let (_, body, _) = daemon.sign_cert("E1", "abc123").await;

    let valid_until = parse_valid_until(&body);
    assert!((valid_until - (before + Duration::hours(12))).num_seconds().abs() <= 2);

    // Stored expiry is the same instant as the one signed
    assert_eq!(daemon.record("E1").await.valid_until, Some(valid_until));
}

#[tokio::test]
async fn test_unrepresentable_expiry_is_server_error() {
    let daemon = TestDaemon::with_options(
        Duration::days(4_000_000),
        std::sync::Arc::new(rollcall_daemon::checkin::AlwaysOnTime),
    )
    .await;
    daemon.enroll("E1", "emp-42", "Ada", "abc123").await;

    let (status, body, _) = daemon.sign_cert("E1", "abc123").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "success": false }));
    assert!(!daemon.record("E1").await.issued);
}

#[tokio::test]
async fn test_healthz() {
    let daemon = TestDaemon::new().await;
    let (status, body) = daemon.get("/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

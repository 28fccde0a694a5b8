//! End-to-end flows through the public `KeyService` API on the system clock.

use chrono::{Duration, Local};
use keywarden::protocol::timestamp::format_minute;
use keywarden::{
    AdminCredentials, KeyService, KeywardenConfig, KeywardenError, Operator, Outcome,
    ReplyStatus, SessionVerifier, ValidationRequest,
};
use std::sync::Arc;
use tempfile::TempDir;

const BEARER: &str = "operator-session";

fn service(dir: &TempDir) -> KeyService {
    let sessions: Arc<dyn SessionVerifier> = Arc::new(|bearer: &str| {
        if bearer == BEARER {
            Ok(Operator {
                username: "admin".to_string(),
            })
        } else {
            Err(KeywardenError::Unauthorized("bad session".to_string()))
        }
    });
    let config = KeywardenConfig {
        data_dir: dir.path().to_path_buf(),
        admin_key: "admin-secret".to_string(),
        clear_logs_key: "clear-secret".to_string(),
        ..KeywardenConfig::default()
    };
    KeyService::new(config, sessions).unwrap()
}

fn admin() -> AdminCredentials<'static> {
    AdminCredentials {
        bearer: Some(BEARER),
        admin_key: Some("admin-secret"),
    }
}

fn expiry_in(offset: Duration) -> String {
    format_minute(&(Local::now().naive_local() + offset))
}

fn request<'a>(key: &'a str, client: &'a str) -> ValidationRequest<'a> {
    ValidationRequest {
        method: "POST",
        key: Some(key),
        client_address: client,
    }
}

#[test]
fn future_key_validates_and_past_key_does_not() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);

    service
        .add_key(admin(), "127.0.0.1", "ABC123", "trial", &expiry_in(Duration::days(2)))
        .unwrap();
    service
        .add_key(admin(), "127.0.0.1", "OLD123", "expired", &expiry_in(-Duration::days(2)))
        .unwrap();

    let valid = service.validate(request("ABC123", "198.51.100.1"));
    assert_eq!(valid.status, ReplyStatus::Ok);
    assert_eq!(valid.body.code, "true");
    assert_eq!(valid.body.msg, "trial");
    assert!(matches!(valid.body.remaining_days, Some(1) | Some(2)));

    let expired = service.validate(request("OLD123", "198.51.100.1"));
    assert_eq!(expired.body.code, "false");
    assert_eq!(expired.body.msg, "key invalid or expired");
}

#[test]
fn extending_expired_key_restores_access() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);
    service
        .add_key(admin(), "127.0.0.1", "OLD123", "renewed", &expiry_in(-Duration::days(30)))
        .unwrap();

    let extended = service.extend_key(admin(), "127.0.0.1", "OLD123", 3).unwrap();

    assert!(extended.new_expiry >= expiry_in(Duration::days(3)));
    assert!(service.validate(request("OLD123", "198.51.100.2")).body.is_granted());
}

#[test]
fn state_persists_across_instances() {
    let dir = TempDir::new().unwrap();
    {
        let service = service(&dir);
        service
            .add_key(admin(), "127.0.0.1", "KEEP-ME", "kept", &expiry_in(Duration::days(10)))
            .unwrap();
        service.validate(request("KEEP-ME", "198.51.100.3"));
    }

    let service = service(&dir);
    let keys = service.list_keys(Some(BEARER)).unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].key, "KEEP-ME");
    assert!(!keys[0].is_expired);

    let entries = service.ledger().entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].outcome, Outcome::Success);
    assert_eq!(entries[0].message, "[POST] validation succeeded");
}

#[test]
fn rapid_calls_from_one_client_are_blocked_after_ten() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir);

    let replies: Vec<_> = (0..11)
        .map(|_| service.validate(request("UNKNOWN1", "198.51.100.4")))
        .collect();

    assert!(replies[..10].iter().all(|r| r.status == ReplyStatus::Ok));
    assert_eq!(replies[10].status, ReplyStatus::TooManyRequests);
    assert_eq!(replies[10].outcome, Outcome::Blocked);

    let other_client = service.validate(request("UNKNOWN1", "198.51.100.5"));
    assert_eq!(other_client.status, ReplyStatus::Ok);
}

#[test]
fn concurrent_admin_mutations_are_serialized() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(service(&dir));
    let expiry = expiry_in(Duration::days(5));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            let expiry = expiry.clone();
            std::thread::spawn(move || {
                service
                    .add_key(admin(), "127.0.0.1", &format!("BULK-{:03}", i), "bulk", &expiry)
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(service.list_keys(Some(BEARER)).unwrap().len(), 8);
    assert_eq!(service.ledger().entries().len(), 8);
}

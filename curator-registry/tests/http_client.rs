//! HTTP client behaviour against a mock registry.

use std::time::Duration;

use curator_core::{ExternalId, FileEntry, DigestAlgorithm};
use curator_registry::{HttpRegistry, RegistryApi, RegistryDocument, RegistryError};
use httpmock::prelude::*;
use serde_json::json;

fn client(server: &MockServer) -> HttpRegistry {
    HttpRegistry::new(
        format!("{}/", server.base_url()),
        "test_token",
        Duration::from_secs(5),
    )
}

fn document() -> RegistryDocument {
    RegistryDocument {
        title: "A".into(),
        url: "http://x".into(),
        manifest: vec![FileEntry {
            path: "record.json".into(),
            digest: "ab".into(),
            algorithm: DigestAlgorithm::Sha256,
        }],
        ..Default::default()
    }
}

// ── Contribute ──────────────────────────────────────────────────────

#[test]
fn contribute_posts_with_bearer_and_returns_id() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/data/")
            .header("authorization", "Bearer test_token");
        then.status(200)
            .json_body(json!({ "docType": "org.osc.Dataset", "id": "E1" }));
    });

    let receipt = client(&server).contribute(&document()).expect("contribute");
    mock.assert();
    assert_eq!(receipt.id, ExternalId::from("E1"));
    assert_eq!(receipt.body["docType"], json!("org.osc.Dataset"));
}

#[test]
fn contribute_server_error_surfaces_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/data/");
        then.status(500).body("internal failure");
    });

    match client(&server).contribute(&document()).unwrap_err() {
        RegistryError::Http { status, message } => {
            assert_eq!(status, 500);
            assert!(message.contains("internal failure"));
        }
        other => panic!("expected http error, got {other:?}"),
    }
}

#[test]
fn contribute_error_document_is_rejected() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/data/");
        then.status(200)
            .json_body(json!({ "docType": "org.osc.Error", "error_message": "missing title" }));
    });

    let err = client(&server).contribute(&document()).unwrap_err();
    assert!(matches!(err, RegistryError::Rejected(ref m) if m == "missing title"), "got: {err}");
}

// ── Query ───────────────────────────────────────────────────────────

#[test]
fn query_decodes_string_wrapped_document() {
    let server = MockServer::start();
    let stored = json!({
        "id": "E1",
        "title": "A",
        "manifest": [{ "filename": "record.json", "hash": "ab", "algorithm": "sha256" }]
    })
    .to_string();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/data/E1");
        then.status(200).json_body(json!([stored]));
    });

    let doc = client(&server).query(&ExternalId::from("E1")).expect("query");
    mock.assert();
    assert_eq!(doc.title, "A");
    assert!(doc.origin_manifest().get("record.json").is_some());
}

#[test]
fn query_not_found_is_http_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/data/missing");
        then.status(404).body("no such entry");
    });

    let err = client(&server).query(&ExternalId::from("missing")).unwrap_err();
    assert!(matches!(err, RegistryError::Http { status: 404, .. }), "got: {err}");
}

// ── Update ──────────────────────────────────────────────────────────

#[test]
fn update_puts_document_with_id() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(PUT)
            .path("/api/data/")
            .header("authorization", "Bearer test_token");
        then.status(200).json_body(json!({ "id": "E1" }));
    });

    let mut doc = document();
    doc.id = Some(ExternalId::from("E1"));
    let receipt = client(&server).update(&doc).expect("update");
    mock.assert();
    assert_eq!(receipt.id, ExternalId::from("E1"));
}

#[test]
fn update_without_id_never_sends() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(PUT).path("/api/data/");
        then.status(200).json_body(json!({ "id": "E1" }));
    });

    let err = client(&server).update(&document()).unwrap_err();
    assert!(matches!(err, RegistryError::Rejected(_)));
    mock.assert_hits(0);
}

// ── Timeouts ────────────────────────────────────────────────────────

#[test]
fn slow_registry_times_out_as_transport_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/data/E1");
        then.status(200)
            .delay(Duration::from_secs(3))
            .json_body(json!([{ "id": "E1" }]));
    });

    let registry = HttpRegistry::new(
        format!("{}/", server.base_url()),
        "test_token",
        Duration::from_millis(200),
    );
    let err = registry.query(&ExternalId::from("E1")).unwrap_err();
    assert!(matches!(err, RegistryError::Transport(_)), "got: {err}");
}

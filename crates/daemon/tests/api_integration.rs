//! Drive the full HTTP API in-process over an in-memory database

use axum::body::Body;
use axum::Router;
use http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::crypto::{KeyEncoding, KeyEnvelope, PrincipalKeys};
use common::custodian::protocol::{grant_access, open_and_verify, seal_upload, SealedUpload};
use common::principal::Principal;
use custody_daemon::http_server::api::v0::artifacts::{
    ArtifactResponse, ContentResponse, UploadRequest,
};
use custody_daemon::http_server::{self, PRINCIPAL_HEADER};
use custody_daemon::{ServiceConfig, ServiceState};

struct TestApi {
    router: Router,
    state: ServiceState,
}

struct Client {
    principal: Principal,
    keys: PrincipalKeys,
}

impl TestApi {
    async fn new() -> Self {
        let config = ServiceConfig::ephemeral();
        let state = ServiceState::from_config(&config).await.unwrap();
        let http_config = http_server::Config::new("127.0.0.1:0".parse().unwrap());
        Self {
            router: http_server::router(http_config, state.clone()),
            state,
        }
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        caller: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::ACCEPT, "application/json");
        if let Some(id) = caller {
            builder = builder.header(PRINCIPAL_HEADER, id.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn register(&self, name: &str) -> Client {
        let keys = PrincipalKeys::generate();
        let public = keys.public();
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v0/principals",
                None,
                Some(json!({
                    "name": name,
                    "wrap_public_key": public.wrap.to_base64(),
                    "sign_public_key": public.sign.to_base64(),
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        Client {
            principal: serde_json::from_value(body).unwrap(),
            keys,
        }
    }

    async fn upload(&self, owner: &Client, name: &str, plaintext: &[u8]) -> SealedUpload {
        let upload = seal_upload(owner.principal.id, &owner.keys, name, plaintext).unwrap();
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v0/artifacts",
                Some(owner.principal.id),
                Some(serde_json::to_value(UploadRequest::from_sealed(&upload)).unwrap()),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        upload
    }

    async fn submit(&self, requester: &Client, artifact_id: Uuid) -> Uuid {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v0/requests",
                Some(requester.principal.id),
                Some(json!({ "artifact_id": artifact_id })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["status"], "pending");
        body["id"].as_str().unwrap().parse().unwrap()
    }
}

#[tokio::test]
async fn test_request_approve_download_verify() {
    let api = TestApi::new().await;
    let alice = api.register("alice").await;
    let bob = api.register("bob").await;
    let plaintext = b"the quarterly numbers, in full".to_vec();

    let upload = api.upload(&alice, "q3.csv", &plaintext).await;
    let artifact_id = upload.artifact.id;
    let content_uri = format!("/api/v0/artifacts/{}/content", artifact_id);
    let envelope_uri = format!("/api/v0/artifacts/{}/envelope", artifact_id);

    // Bob can see the artifact exists but cannot download it yet
    let (status, listed) = api
        .call(Method::GET, "/api/v0/artifacts", Some(bob.principal.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    let (status, _) = api
        .call(Method::GET, &content_uri, Some(bob.principal.id), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request_id = api.submit(&bob, artifact_id).await;

    let (status, pending) = api
        .call(
            Method::GET,
            "/api/v0/requests/pending",
            Some(alice.principal.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending[0]["id"], json!(request_id));

    // Alice fetches her own envelope and re-wraps the key for Bob
    let (status, own) = api
        .call(Method::GET, &envelope_uri, Some(alice.principal.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let own: KeyEnvelope = serde_json::from_value(own).unwrap();
    let for_bob = grant_access(&alice.keys.wrap, &own, bob.principal.wrap_key()).unwrap();
    let decision = json!({ "decision": "approved", "envelope": for_bob.to_record() });
    let decision_uri = format!("/api/v0/requests/{}/decision", request_id);

    // Only the owner decides
    let (status, _) = api
        .call(
            Method::POST,
            &decision_uri,
            Some(bob.principal.id),
            Some(decision.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, approved) = api
        .call(
            Method::POST,
            &decision_uri,
            Some(alice.principal.id),
            Some(decision.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{approved}");
    assert_eq!(approved["status"], "approved");

    let (status, _) = api
        .call(
            Method::POST,
            &decision_uri,
            Some(alice.principal.id),
            Some(decision),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Bob downloads everything he needs and opens it on his side
    let (status, envelope) = api
        .call(Method::GET, &envelope_uri, Some(bob.principal.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let envelope: KeyEnvelope = serde_json::from_value(envelope).unwrap();

    let (status, content) = api
        .call(Method::GET, &content_uri, Some(bob.principal.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let artifact = serde_json::from_value::<ContentResponse>(content)
        .unwrap()
        .into_artifact()
        .unwrap();

    let (status, metadata) = api
        .call(
            Method::GET,
            &format!("/api/v0/artifacts/{}", artifact_id),
            Some(bob.principal.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let metadata: ArtifactResponse = serde_json::from_value(metadata).unwrap();
    assert_eq!(metadata.owner, alice.principal.id);
    assert_eq!(metadata.proof, upload.proof);

    let (status, owner) = api
        .call(
            Method::GET,
            &format!("/api/v0/principals/{}", metadata.owner),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let owner: Principal = serde_json::from_value(owner).unwrap();

    let recovered = open_and_verify(
        &bob.keys.wrap,
        &envelope,
        &artifact,
        &metadata.proof,
        owner.sign_key(),
    )
    .unwrap();
    assert_eq!(recovered, plaintext);

    let (status, mine) = api
        .call(
            Method::GET,
            "/api/v0/requests/mine",
            Some(bob.principal.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine[0]["status"], "approved");

    // upload, submit, approve; the refused attempts left no trace
    let (status, events) = api
        .call(Method::GET, "/api/v0/audit", Some(bob.principal.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<_> = events
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(actions, ["upload", "request_submit", "request_approve"]);

    let (status, verified) = api
        .call(
            Method::GET,
            "/api/v0/audit/verify",
            Some(alice.principal.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["valid"], true);
    assert_eq!(verified["events"], 3);
}

#[tokio::test]
async fn test_rejection_grants_nothing() {
    let api = TestApi::new().await;
    let alice = api.register("alice").await;
    let bob = api.register("bob").await;
    let upload = api.upload(&alice, "secret.txt", b"no").await;
    let request_id = api.submit(&bob, upload.artifact.id).await;

    let (status, rejected) = api
        .call(
            Method::POST,
            &format!("/api/v0/requests/{}/decision", request_id),
            Some(alice.principal.id),
            Some(json!({ "decision": "rejected" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "rejected");
    assert!(rejected["envelope"].is_null());

    let (status, _) = api
        .call(
            Method::GET,
            &format!("/api/v0/artifacts/{}/envelope", upload.artifact.id),
            Some(bob.principal.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = api
        .call(
            Method::GET,
            &format!("/api/v0/artifacts/{}/content", upload.artifact.id),
            Some(bob.principal.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The request is visible to both parties only
    let carol = api.register("carol").await;
    let request_uri = format!("/api/v0/requests/{}", request_id);
    let (status, _) = api
        .call(Method::GET, &request_uri, Some(bob.principal.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = api
        .call(Method::GET, &request_uri, Some(carol.principal.id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_and_refused_requests() {
    let api = TestApi::new().await;
    let alice = api.register("alice").await;
    let bob = api.register("bob").await;
    let upload = api.upload(&alice, "a.bin", b"abc").await;

    // Identity
    let (status, body) = api
        .call(Method::GET, "/api/v0/artifacts", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["msg"].as_str().unwrap().contains(PRINCIPAL_HEADER));
    let (status, _) = api
        .call(Method::GET, "/api/v0/artifacts", Some(Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Registration
    let (status, _) = api
        .call(
            Method::POST,
            "/api/v0/principals",
            None,
            Some(json!({
                "name": "mallory",
                "wrap_public_key": "not base64!",
                "sign_public_key": "AAAA",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A signing key where a wrapping key belongs
    let keys = PrincipalKeys::generate().public();
    let (status, _) = api
        .call(
            Method::POST,
            "/api/v0/principals",
            None,
            Some(json!({
                "name": "mallory",
                "wrap_public_key": keys.sign.to_base64(),
                "sign_public_key": keys.sign.to_base64(),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = api
        .call(
            Method::POST,
            "/api/v0/principals",
            None,
            Some(json!({
                "name": "alice",
                "wrap_public_key": keys.wrap.to_base64(),
                "sign_public_key": keys.sign.to_base64(),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // A proof signed by someone other than the uploader
    let forged = seal_upload(bob.principal.id, &alice.keys, "forged", b"xyz").unwrap();
    let (status, _) = api
        .call(
            Method::POST,
            "/api/v0/artifacts",
            Some(bob.principal.id),
            Some(serde_json::to_value(UploadRequest::from_sealed(&forged)).unwrap()),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Re-uploading an existing id
    let (status, _) = api
        .call(
            Method::POST,
            "/api/v0/artifacts",
            Some(alice.principal.id),
            Some(serde_json::to_value(UploadRequest::from_sealed(&upload)).unwrap()),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Requests
    let (status, _) = api
        .call(
            Method::POST,
            "/api/v0/requests",
            Some(alice.principal.id),
            Some(json!({ "artifact_id": upload.artifact.id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = api
        .call(
            Method::POST,
            "/api/v0/requests",
            Some(bob.principal.id),
            Some(json!({ "artifact_id": Uuid::new_v4() })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let request_id = api.submit(&bob, upload.artifact.id).await;
    let decision_uri = format!("/api/v0/requests/{}/decision", request_id);
    let (status, _) = api
        .call(
            Method::POST,
            &decision_uri,
            Some(alice.principal.id),
            Some(json!({ "decision": "approved" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stray = grant_access(
        &alice.keys.wrap,
        &upload.self_envelope,
        bob.principal.wrap_key(),
    )
    .unwrap();
    let (status, _) = api
        .call(
            Method::POST,
            &decision_uri,
            Some(alice.principal.id),
            Some(json!({ "decision": "rejected", "envelope": stray.to_record() })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = api
        .call(
            Method::POST,
            &format!("/api/v0/requests/{}/decision", Uuid::new_v4()),
            Some(alice.principal.id),
            Some(json!({ "decision": "rejected" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // One open request per requester and artifact
    let (status, body) = api
        .call(
            Method::POST,
            "/api/v0/requests",
            Some(bob.principal.id),
            Some(json!({ "artifact_id": upload.artifact.id })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["msg"], "a pending request for this artifact already exists");

    // Still pending after all of that
    let (status, pending) = api
        .call(
            Method::GET,
            "/api/v0/requests/pending",
            Some(alice.principal.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["status"], "pending");
}

#[tokio::test]
async fn test_approval_stands_or_falls_with_its_grant() {
    let api = TestApi::new().await;
    let alice = api.register("alice").await;
    let bob = api.register("bob").await;
    let upload = api.upload(&alice, "a.bin", b"granted together").await;
    let request_id = api.submit(&bob, upload.artifact.id).await;

    let for_bob = grant_access(
        &alice.keys.wrap,
        &upload.self_envelope,
        bob.principal.wrap_key(),
    )
    .unwrap();
    let decision = json!({ "decision": "approved", "envelope": for_bob.to_record() });
    let decision_uri = format!("/api/v0/requests/{}/decision", request_id);
    let content_uri = format!("/api/v0/artifacts/{}/content", upload.artifact.id);

    // Make the envelope write fail underneath the decision
    let db = api.state.database();
    sqlx::query(
        r#"
        CREATE TRIGGER refuse_grants BEFORE INSERT ON envelopes
        BEGIN
            SELECT RAISE(ABORT, 'grant refused');
        END
        "#,
    )
    .execute(&**db)
    .await
    .unwrap();

    let (status, _) = api
        .call(
            Method::POST,
            &decision_uri,
            Some(alice.principal.id),
            Some(decision.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let (status, request) = api
        .call(
            Method::GET,
            &format!("/api/v0/requests/{}", request_id),
            Some(bob.principal.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(request["status"], "pending");

    // The owner retries once the store recovers, and Bob gets the content
    sqlx::query("DROP TRIGGER refuse_grants")
        .execute(&**db)
        .await
        .unwrap();
    let (status, approved) = api
        .call(
            Method::POST,
            &decision_uri,
            Some(alice.principal.id),
            Some(decision),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{approved}");
    let (status, _) = api
        .call(Method::GET, &content_uri, Some(bob.principal.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    // Only the approval that committed is in the trail
    let (_, events) = api
        .call(
            Method::GET,
            "/api/v0/audit?action=request_approve",
            Some(alice.principal.id),
            None,
        )
        .await;
    assert_eq!(events.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_audit_query_string() {
    let api = TestApi::new().await;
    let alice = api.register("alice").await;
    let bob = api.register("bob").await;
    let first = api.upload(&alice, "one", b"1").await;
    api.upload(&alice, "two", b"2").await;
    api.submit(&bob, first.artifact.id).await;

    let (status, uploads) = api
        .call(
            Method::GET,
            "/api/v0/audit?action=upload",
            Some(bob.principal.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(uploads.as_array().unwrap().len(), 2);

    let (status, latest) = api
        .call(
            Method::GET,
            "/api/v0/audit?descending=true&limit=1",
            Some(bob.principal.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest[0]["seq"], 3);
    assert_eq!(latest[0]["actor_name"], "bob");

    let (status, about_first) = api
        .call(
            Method::GET,
            &format!("/api/v0/audit?subject={}", first.artifact.id),
            Some(bob.principal.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(about_first.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_status_and_fallback() {
    let api = TestApi::new().await;

    let (status, body) = api
        .call(Method::GET, "/_status/readiness", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = api.call(Method::GET, "/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["msg"], "no route for /nowhere");
}

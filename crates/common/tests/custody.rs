//! End to end custody scenarios over the in-memory providers

mod common;

use ::common::audit::{AuditAction, AuditFilter, AuditLog};
use ::common::crypto::EnvelopeError;
use ::common::custodian::protocol::{
    grant_access, open_and_verify, open_artifact, seal_upload, ProtocolError,
};
use ::common::custodian::CustodianError;
use ::common::custody::{CustodyStatus, CustodyStore, CustodyStoreError, Decision, WorkflowError};
use rand::Rng;

#[tokio::test]
async fn test_upload_and_owner_reads_back() {
    let (custodian, alice, _) = common::setup_test_env();
    let mut plaintext = vec![0u8; 1024];
    rand::rng().fill(&mut plaintext[..]);

    let upload = seal_upload(alice.principal.id, &alice.keys, "report.pdf", &plaintext).unwrap();
    assert_ne!(upload.artifact.ciphertext[..1024], plaintext[..]);

    custodian
        .record_upload(&alice.principal, &upload.artifact, &upload.proof)
        .await
        .unwrap();

    let recovered = open_and_verify(
        &alice.keys.wrap,
        &upload.self_envelope,
        &upload.artifact,
        &upload.proof,
        alice.principal.sign_key(),
    )
    .unwrap();
    assert_eq!(recovered, plaintext);

    let key = upload.self_envelope.open_key(&alice.keys.wrap).unwrap();
    assert_eq!(key, upload.key);
}

#[tokio::test]
async fn test_approved_request_grants_access() {
    let (custodian, alice, bob) = common::setup_test_env();
    let plaintext = common::content(4096);

    let upload = seal_upload(alice.principal.id, &alice.keys, "data.csv", &plaintext).unwrap();
    custodian
        .record_upload(&alice.principal, &upload.artifact, &upload.proof)
        .await
        .unwrap();

    let request = custodian
        .submit_request(&bob.principal, alice.principal.id, upload.artifact.id)
        .await
        .unwrap()
        .value;

    let pending = custodian
        .store()
        .list_pending_for_owner(alice.principal.id)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);

    // Alice re-wraps on her side; the custodian only sees the result
    let envelope = grant_access(
        &alice.keys.wrap,
        &upload.self_envelope,
        bob.principal.wrap_key(),
    )
    .unwrap();
    let approved = custodian
        .decide(
            &alice.principal,
            request.id,
            Decision::Approved,
            Some(envelope),
        )
        .await
        .unwrap()
        .value;
    assert_eq!(approved.status, CustodyStatus::Approved);

    let bobs_envelope = approved.envelope.as_ref().unwrap();
    let recovered = open_and_verify(
        &bob.keys.wrap,
        bobs_envelope,
        &upload.artifact,
        &upload.proof,
        alice.principal.sign_key(),
    )
    .unwrap();
    assert_eq!(recovered, plaintext);

    // The envelope is for Bob only
    assert!(matches!(
        open_artifact(&alice.keys.wrap, bobs_envelope, &upload.artifact),
        Err(ProtocolError::Envelope(EnvelopeError::Authentication))
    ));

    let mine = custodian
        .store()
        .list_by_requester(bob.principal.id)
        .await
        .unwrap();
    assert_eq!(mine[0].status, CustodyStatus::Approved);
}

#[tokio::test]
async fn test_rejected_request_grants_nothing() {
    let (custodian, alice, bob) = common::setup_test_env();
    let upload = seal_upload(alice.principal.id, &alice.keys, "x", b"top secret").unwrap();

    let request = custodian
        .submit_request(&bob.principal, alice.principal.id, upload.artifact.id)
        .await
        .unwrap()
        .value;
    let rejected = custodian
        .decide(&alice.principal, request.id, Decision::Rejected, None)
        .await
        .unwrap()
        .value;

    assert_eq!(rejected.status, CustodyStatus::Rejected);
    assert!(rejected.envelope.is_none());

    // Bob's only route to the key is the owner's envelope, which is not his
    assert!(open_artifact(&bob.keys.wrap, &upload.self_envelope, &upload.artifact).is_err());

    // And the decision is final
    let envelope = grant_access(
        &alice.keys.wrap,
        &upload.self_envelope,
        bob.principal.wrap_key(),
    )
    .unwrap();
    let again = custodian
        .decide(
            &alice.principal,
            request.id,
            Decision::Approved,
            Some(envelope),
        )
        .await;
    assert!(matches!(
        again,
        Err(CustodianError::Store(CustodyStoreError::Workflow(
            WorkflowError::AlreadyDecided
        )))
    ));
    let stored = custodian.store().get(request.id).await.unwrap();
    assert_eq!(stored.status, CustodyStatus::Rejected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_decisions_have_one_winner() {
    let (custodian, alice, bob) = common::setup_test_env();
    let upload = seal_upload(alice.principal.id, &alice.keys, "x", b"race").unwrap();

    for _ in 0..16 {
        let request = custodian
            .submit_request(&bob.principal, alice.principal.id, upload.artifact.id)
            .await
            .unwrap()
            .value;
        let request_id = request.id;

        let envelope = grant_access(
            &alice.keys.wrap,
            &upload.self_envelope,
            bob.principal.wrap_key(),
        )
        .unwrap();

        let approve = {
            let custodian = custodian.clone();
            let owner = alice.principal.clone();
            tokio::spawn(async move {
                custodian
                    .decide(&owner, request_id, Decision::Approved, Some(envelope))
                    .await
            })
        };
        let reject = {
            let custodian = custodian.clone();
            let owner = alice.principal.clone();
            tokio::spawn(async move {
                custodian
                    .decide(&owner, request_id, Decision::Rejected, None)
                    .await
            })
        };

        let results = [approve.await.unwrap(), reject.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(CustodianError::Store(CustodyStoreError::Workflow(
                WorkflowError::AlreadyDecided
            )))
        )));
    }

    // One submit plus exactly one decision per request
    let log = custodian.audit_log();
    let submits = log
        .query(&AuditFilter {
            action: Some(AuditAction::RequestSubmit),
            ..Default::default()
        })
        .await
        .unwrap();
    let decisions = log.all().await.unwrap().len() - submits.len();
    assert_eq!(submits.len(), 16);
    assert_eq!(decisions, 16);
    assert_eq!(log.verify().await.unwrap(), 32);
}

#[tokio::test]
async fn test_audit_trail_follows_the_protocol() {
    let (custodian, alice, bob) = common::setup_test_env();
    let upload = seal_upload(alice.principal.id, &alice.keys, "a", b"trail").unwrap();
    custodian
        .record_upload(&alice.principal, &upload.artifact, &upload.proof)
        .await
        .unwrap();
    let request = custodian
        .submit_request(&bob.principal, alice.principal.id, upload.artifact.id)
        .await
        .unwrap()
        .value;
    custodian
        .decide(&alice.principal, request.id, Decision::Rejected, None)
        .await
        .unwrap();

    let newest_first = custodian
        .audit_log()
        .query(&AuditFilter {
            subject: Some(upload.artifact.id),
            descending: true,
            ..Default::default()
        })
        .await
        .unwrap();
    let actions: Vec<_> = newest_first.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::RequestReject,
            AuditAction::RequestSubmit,
            AuditAction::Upload
        ]
    );
    assert_eq!(newest_first[0].actor_name, "alice");
    assert_eq!(newest_first[1].actor_name, "bob");
    assert_eq!(
        newest_first[1].payload["request_id"],
        serde_json::json!(request.id)
    );
}

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use evrebate::backend::memory::MemoryBackend;
use evrebate::models::{ClaimFilters, ClaimStatus, ReceiptFile, RegistrationStatus, SignUpMetadata};
use evrebate::Gateway;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[tokio::test]
async fn resident_submission_and_review_flow() {
    init_tracing();

    let memory = MemoryBackend::new();
    let gateway = Gateway::with_backend(memory.backend());

    let condo = memory.seed_condo("Aster Green", "premium", 0.2);

    // Sign up a resident; the profile row is created by registration
    // approval on the remote side, so seed it directly here.
    let session = gateway
        .auth()
        .sign_up(
            "mei@example.com",
            "s3cret-pw",
            &SignUpMetadata {
                name: "Mei Tan".to_string(),
                vehicle_number: "SKL1234A".to_string(),
            },
        )
        .await
        .expect("sign_up");
    let user = session.user.clone();
    memory
        .records
        .push_row("profiles", json!({ "id": user.id, "condo_id": condo.id }));

    // Submit a claim with a receipt image.
    let today = Utc::now().date_naive();
    let claim = gateway
        .claims()
        .submit_claim(
            &evrebate::models::ClaimSubmission {
                charge_date: today,
                operator: "ChargeFast".to_string(),
                amount: 150.0,
                rebate_amount: None,
            },
            Some(ReceiptFile {
                file_name: "charge-receipt.jpg".to_string(),
                content_type: "image/jpeg".to_string(),
                data: vec![0xff, 0xd8, 0xff],
            }),
        )
        .await
        .expect("submit_claim");

    assert_eq!(claim.status, ClaimStatus::Pending);
    assert!((claim.rebate_amount - 30.0).abs() < 1e-9);
    let receipt_path = claim.receipt_image_path.clone().expect("receipt stored");

    // The stored path resolves to a public URL.
    let url = gateway
        .storage()
        .receipt_url(Some(&receipt_path))
        .expect("public url");
    assert!(url.ends_with(&receipt_path));

    // The resident sees their claim with the condo joined in.
    let mine = gateway.claims().user_claims(user.id).await.expect("user_claims");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].condo.name, "Aster Green");

    // A reviewer approves it.
    let approved = gateway
        .claims()
        .update_claim_status(claim.id, ClaimStatus::Approved, None)
        .await
        .expect("approve");
    assert_eq!(approved.status, ClaimStatus::Approved);
    assert_eq!(approved.reviewed_by, Some(user.id));

    // The approval shows up in the year-to-date total.
    let ytd = gateway.claims().ytd_rebate(user.id).await.expect("ytd");
    assert!((ytd - 30.0).abs() < 1e-9);

    // And in the dashboard rollup.
    let stats = gateway.admin().dashboard_stats().await.expect("stats");
    assert_eq!(stats.approved, 1);
    assert!((stats.total_payout - 30.0).abs() < 1e-9);

    // Signing out drops the session; submission then requires auth again.
    gateway.auth().sign_out().await.expect("sign_out");
    let user_after = gateway.auth().current_user().await.expect("current_user");
    assert!(user_after.is_none());
}

#[tokio::test]
async fn registration_review_flow() {
    init_tracing();

    let memory = MemoryBackend::new();
    let gateway = Gateway::with_backend(memory.backend());

    let condo = memory.seed_condo("Willow Heights", "standard", 0.1);
    let row = memory.records.push_row(
        "pending_registrations",
        json!({
            "name": "Ravi Nair",
            "email": "ravi@example.com",
            "vehicle_number": "SLM5678B",
            "condo_id": condo.id,
            "status": "pending",
            "reviewed_at": null,
        }),
    );
    let registration_id: Uuid =
        serde_json::from_value(row["id"].clone()).expect("registration id");

    let pending = gateway
        .admin()
        .pending_registrations()
        .await
        .expect("pending_registrations");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].registration.email, "ravi@example.com");
    assert_eq!(pending[0].condo.tier, "standard");

    let approved = gateway
        .admin()
        .approve_registration(registration_id)
        .await
        .expect("approve_registration");
    assert_eq!(approved.status, RegistrationStatus::Approved);
    assert!(approved.reviewed_at.is_some());

    // Once approved it no longer appears in the pending list.
    let pending = gateway
        .admin()
        .pending_registrations()
        .await
        .expect("pending_registrations");
    assert!(pending.is_empty());
}

#[tokio::test]
async fn exported_csv_round_trips_the_admin_view() {
    init_tracing();

    let memory = MemoryBackend::new();
    let gateway = Gateway::with_backend(memory.backend());

    memory.records.push_row(
        "claims_with_details",
        json!({
            "user_id": Uuid::new_v4(),
            "charge_date": "2026-02-20",
            "operator": "VoltHub",
            "amount": 88.4,
            "receipt_image_path": null,
            "rebate_rate": 0.15,
            "rebate_amount": 13.26,
            "status": "approved",
            "participant_name": "Mei Tan",
            "vehicle_number": "SKL1234A",
            "condo_name": "Aster Green",
            "condo_tier": "premium",
        }),
    );

    let csv = gateway
        .admin()
        .export_claims_csv(&ClaimFilters::default())
        .await
        .expect("export");

    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("Date,Participant,Condo,Vehicle,Operator,Amount,Rebate Rate,Rebate Amount,Status")
    );
    assert_eq!(
        lines.next(),
        Some("2026-02-20,Mei Tan,Aster Green,SKL1234A,VoltHub,88.40,15%,13.26,approved")
    );
    assert!(lines.next().is_none());
}

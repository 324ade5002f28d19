//! Admin facade: registration review, CSV export, dashboard rollup.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::backend::{self, Backend, Query};
use crate::claims::ClaimsFacade;
use crate::error::Result;
use crate::models::{ClaimFilters, DashboardStats, Registration, RegistrationWithCondo};

/// Fixed export header; column order is part of the contract with
/// downstream spreadsheet consumers.
const CSV_HEADERS: [&str; 9] = [
    "Date",
    "Participant",
    "Condo",
    "Vehicle",
    "Operator",
    "Amount",
    "Rebate Rate",
    "Rebate Amount",
    "Status",
];

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        let escaped = s.replace('"', "\"\"");
        format!("\"{}\"", escaped)
    } else {
        s.to_string()
    }
}

#[derive(Clone)]
pub struct AdminFacade {
    backend: Backend,
    claims: ClaimsFacade,
}

impl AdminFacade {
    pub(crate) fn new(backend: Backend) -> Self {
        let claims = ClaimsFacade::new(backend.clone());
        Self { backend, claims }
    }

    /// Registrations awaiting approval, newest first, condo joined in.
    pub async fn pending_registrations(&self) -> Result<Vec<RegistrationWithCondo>> {
        let query = Query::table("pending_registrations")
            .select("*, condo:condos(name, tier)")
            .eq("status", "pending")
            .order("created_at", true);
        backend::decode_rows(self.backend.records.select(&query).await?)
    }

    /// Approve a registration via the trusted server-side function.
    /// Authorization lives with the function, not this client path.
    pub async fn approve_registration(&self, registration_id: Uuid) -> Result<Registration> {
        let row = self
            .backend
            .records
            .rpc(
                "approve_registration",
                json!({ "registration_id": registration_id }),
            )
            .await?;
        backend::decode(row)
    }

    /// Serialize the filtered admin claim list as CSV text.
    pub async fn export_claims_csv(&self, filters: &ClaimFilters) -> Result<String> {
        let claims = self.claims.all_claims(filters).await?;

        let mut out = String::new();
        out.push_str(&CSV_HEADERS.join(","));
        out.push('\n');

        for claim in claims {
            let date = claim.charge_date.format("%Y-%m-%d").to_string();
            let rate = format!("{}%", (claim.rebate_rate * 100.0).round() as i64);
            let amount = format!("{:.2}", claim.amount);
            let rebate = format!("{:.2}", claim.rebate_amount);
            let fields = [
                csv_escape(&date),
                csv_escape(&claim.participant_name),
                csv_escape(&claim.condo_name),
                csv_escape(&claim.vehicle_number),
                csv_escape(&claim.operator),
                csv_escape(&amount),
                csv_escape(&rate),
                csv_escape(&rebate),
                csv_escape(claim.status.as_str()),
            ];
            out.push_str(&fields.join(","));
            out.push('\n');
        }

        Ok(out)
    }

    /// Count claims by status and sum the approved payout, reduced locally
    /// from an unbounded fetch of `(status, rebate_amount)` pairs.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let query = Query::table("claims").select("status, rebate_amount");
        let rows = self.backend.records.select(&query).await?;

        let mut stats = DashboardStats::default();
        for row in &rows {
            match row.get("status").and_then(Value::as_str) {
                Some("pending") => stats.pending += 1,
                Some("flagged") => stats.flagged += 1,
                Some("approved") => {
                    stats.approved += 1;
                    stats.total_payout += row
                        .get("rebate_amount")
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0);
                }
                _ => {}
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::error::Error;
    use crate::models::RegistrationStatus;

    fn details_row(date: &str, name: &str, condo: &str, status: &str, rate: f64) -> Value {
        json!({
            "user_id": Uuid::new_v4(),
            "charge_date": date,
            "operator": "ChargeFast",
            "amount": 120.0,
            "receipt_image_path": null,
            "rebate_rate": rate,
            "rebate_amount": 120.0 * rate,
            "status": status,
            "participant_name": name,
            "vehicle_number": "SKL1234A",
            "condo_name": condo,
            "condo_tier": "standard",
        })
    }

    fn registration_row(backend: &MemoryBackend, condo_id: Uuid, status: &str) -> Value {
        backend.records.push_row(
            "pending_registrations",
            json!({
                "name": "Mei Tan",
                "email": "mei@example.com",
                "vehicle_number": "SKL1234A",
                "condo_id": condo_id,
                "status": status,
                "reviewed_at": null,
            }),
        )
    }

    #[tokio::test]
    async fn pending_registrations_filters_and_joins() {
        let backend = MemoryBackend::new();
        let admin = AdminFacade::new(backend.backend());
        let condo = backend.seed_condo("Aster Green", "premium", 0.2);

        registration_row(&backend, condo.id, "pending");
        registration_row(&backend, condo.id, "approved");

        let pending = admin.pending_registrations().await.expect("pending");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].registration.status, RegistrationStatus::Pending);
        assert_eq!(pending[0].condo.name, "Aster Green");
    }

    #[tokio::test]
    async fn approve_registration_goes_through_the_server_function() {
        let backend = MemoryBackend::new();
        let admin = AdminFacade::new(backend.backend());
        let condo = backend.seed_condo("Aster Green", "premium", 0.2);

        let row = registration_row(&backend, condo.id, "pending");
        let id: Uuid = serde_json::from_value(row["id"].clone()).expect("registration id");

        let approved = admin.approve_registration(id).await.expect("approve");
        assert_eq!(approved.status, RegistrationStatus::Approved);
        assert!(approved.reviewed_at.is_some());
    }

    #[tokio::test]
    async fn approve_registration_denial_is_auth_error() {
        let backend = MemoryBackend::new();
        let admin = AdminFacade::new(backend.backend());
        let condo = backend.seed_condo("Aster Green", "premium", 0.2);

        let row = registration_row(&backend, condo.id, "pending");
        let id: Uuid = serde_json::from_value(row["id"].clone()).expect("registration id");
        backend.records.deny_rpc();

        let result = admin.approve_registration(id).await;
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[tokio::test]
    async fn csv_has_nine_columns_and_percent_rate() {
        let backend = MemoryBackend::new();
        let admin = AdminFacade::new(backend.backend());

        backend.records.push_row(
            "claims_with_details",
            details_row("2026-02-20", "Mei Tan", "Aster Green", "approved", 0.15),
        );

        let csv = admin
            .export_claims_csv(&ClaimFilters::default())
            .await
            .expect("export");
        let mut lines = csv.lines();

        let header = lines.next().expect("header");
        assert_eq!(header.split(',').count(), 9);
        assert_eq!(
            header,
            "Date,Participant,Condo,Vehicle,Operator,Amount,Rebate Rate,Rebate Amount,Status"
        );

        let row = lines.next().expect("row");
        assert!(row.contains("15%"));
        assert!(row.contains("2026-02-20"));
        assert!(row.contains("18.00"));
        assert!(lines.next().is_none());
    }

    #[tokio::test]
    async fn csv_quotes_embedded_commas() {
        let backend = MemoryBackend::new();
        let admin = AdminFacade::new(backend.backend());

        backend.records.push_row(
            "claims_with_details",
            details_row("2026-02-20", "Tan, Mei", "Aster Green", "pending", 0.15),
        );

        let csv = admin
            .export_claims_csv(&ClaimFilters::default())
            .await
            .expect("export");
        assert!(csv.contains("\"Tan, Mei\""));
    }

    #[tokio::test]
    async fn csv_rows_follow_filter() {
        let backend = MemoryBackend::new();
        let admin = AdminFacade::new(backend.backend());

        backend.records.push_row(
            "claims_with_details",
            details_row("2026-02-20", "Mei Tan", "Aster Green", "approved", 0.15),
        );
        backend.records.push_row(
            "claims_with_details",
            details_row("2026-02-21", "Ravi Nair", "Willow Heights", "pending", 0.1),
        );

        let filters = ClaimFilters {
            status: Some("approved".to_string()),
            condo: None,
        };
        let csv = admin.export_claims_csv(&filters).await.expect("export");

        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains("Mei Tan"));
        assert!(!csv.contains("Ravi Nair"));
    }

    #[tokio::test]
    async fn dashboard_counts_and_sums_approved_payout() {
        let backend = MemoryBackend::new();
        let admin = AdminFacade::new(backend.backend());

        for (status, rebate) in [
            ("pending", 3.0),
            ("flagged", 7.5),
            ("approved", 10.0),
            ("approved", 5.0),
        ] {
            backend.records.push_row(
                "claims",
                json!({ "status": status, "rebate_amount": rebate }),
            );
        }

        let stats = admin.dashboard_stats().await.expect("stats");
        assert_eq!(
            stats,
            DashboardStats {
                pending: 1,
                flagged: 1,
                approved: 2,
                total_payout: 15.0,
            }
        );
    }

    #[tokio::test]
    async fn dashboard_ignores_rejected_rows() {
        let backend = MemoryBackend::new();
        let admin = AdminFacade::new(backend.backend());

        backend.records.push_row(
            "claims",
            json!({ "status": "rejected", "rebate_amount": 42.0 }),
        );

        let stats = admin.dashboard_stats().await.expect("stats");
        assert_eq!(stats, DashboardStats::default());
    }
}

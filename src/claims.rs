//! Claims facade: submission, reads, review, and the YTD reduction.

use chrono::{Datelike, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::backend::{self, Backend, Query};
use crate::error::{Error, Result};
use crate::models::{
    Claim, ClaimFilters, ClaimDetails, ClaimStatus, ClaimSubmission, ClaimWithCondo,
    MonthlySummary, ReceiptFile,
};
use crate::storage::{StorageFacade, RECEIPTS_BUCKET};

/// Claims above this amount start flagged for manual review.
const FLAG_AMOUNT_THRESHOLD: f64 = 300.0;

/// Thin facade over claim rows and the views derived from them.
#[derive(Clone)]
pub struct ClaimsFacade {
    backend: Backend,
    storage: StorageFacade,
}

impl ClaimsFacade {
    pub(crate) fn new(backend: Backend) -> Self {
        let storage = StorageFacade::new(backend.clone());
        Self { backend, storage }
    }

    /// Submit a new claim, uploading the receipt first if one is supplied.
    ///
    /// The rebate is always computed from the condo rate on the caller's
    /// profile; any rebate value in the submission is ignored. An upload
    /// failure aborts the submission before the insert is attempted; if the
    /// insert itself fails, the just-uploaded receipt is removed
    /// best-effort.
    pub async fn submit_claim(
        &self,
        submission: &ClaimSubmission,
        receipt: Option<ReceiptFile>,
    ) -> Result<Claim> {
        let user = self
            .backend
            .auth
            .current_user()
            .await?
            .ok_or_else(|| Error::Auth("Not authenticated".to_string()))?;

        let profile = crate::auth::fetch_profile(&self.backend, user.id).await?;

        let receipt_path = match receipt {
            Some(file) => Some(self.storage.upload_receipt(user.id, file).await?),
            None => None,
        };

        let rebate_rate = profile.condo.rebate_rate;
        let rebate_amount = submission.amount * rebate_rate;
        let status = if submission.amount > FLAG_AMOUNT_THRESHOLD {
            ClaimStatus::Flagged
        } else {
            ClaimStatus::Pending
        };

        let row = json!({
            "user_id": user.id,
            "condo_id": profile.condo_id,
            "charge_date": submission.charge_date,
            "operator": submission.operator,
            "amount": submission.amount,
            "receipt_image_path": receipt_path.as_deref(),
            "rebate_rate": rebate_rate,
            "rebate_amount": rebate_amount,
            "status": status,
        });

        match self.backend.records.insert("claims", row).await {
            Ok(created) => backend::decode(created),
            Err(e) => {
                if let Some(path) = &receipt_path {
                    if let Err(cleanup) = self.backend.blobs.remove(RECEIPTS_BUCKET, path).await {
                        tracing::warn!(
                            "Failed to remove orphaned receipt {}: {}",
                            path,
                            cleanup
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// All of a user's claims with condo name/tier, newest charge first.
    pub async fn user_claims(&self, user_id: Uuid) -> Result<Vec<ClaimWithCondo>> {
        let query = Query::table("claims")
            .select("*, condo:condos(name, tier)")
            .eq("user_id", user_id)
            .order("charge_date", true);
        backend::decode_rows(self.backend.records.select(&query).await?)
    }

    /// Admin read over the pre-joined view, newest submission first.
    pub async fn all_claims(&self, filters: &ClaimFilters) -> Result<Vec<ClaimDetails>> {
        let mut query = Query::table("claims_with_details").order("created_at", true);
        if let Some(status) = &filters.status {
            if status != "all" {
                query = query.eq("status", status);
            }
        }
        if let Some(condo) = &filters.condo {
            query = query.eq("condo_name", condo);
        }
        backend::decode_rows(self.backend.records.select(&query).await?)
    }

    /// Approve or reject a claim, stamping the reviewer.
    pub async fn update_claim_status(
        &self,
        claim_id: Uuid,
        status: ClaimStatus,
        reason: Option<&str>,
    ) -> Result<Claim> {
        let reviewer = self
            .backend
            .auth
            .current_user()
            .await?
            .ok_or_else(|| Error::Auth("Not authenticated".to_string()))?;

        let rejection_reason = if status == ClaimStatus::Rejected {
            reason.map(str::to_string)
        } else {
            None
        };

        let changes = json!({
            "status": status,
            "reviewed_by": reviewer.id,
            "reviewed_at": Utc::now(),
            "rejection_reason": rejection_reason,
        });

        let row = self.backend.records.update("claims", claim_id, changes).await?;
        backend::decode(row)
    }

    /// Precomputed per-month totals for a user, newest month first.
    pub async fn monthly_summary(&self, user_id: Uuid) -> Result<Vec<MonthlySummary>> {
        let query = Query::table("monthly_rebate_summary")
            .eq("user_id", user_id)
            .order("month_year", true);
        backend::decode_rows(self.backend.records.select(&query).await?)
    }

    /// Calendar-year-to-date sum of approved rebates, reduced locally.
    pub async fn ytd_rebate(&self, user_id: Uuid) -> Result<f64> {
        let year = Utc::now().year();
        let query = Query::table("claims")
            .select("rebate_amount")
            .eq("user_id", user_id)
            .eq("status", "approved")
            .gte("charge_date", format!("{year}-01-01"));

        let rows = self.backend.records.select(&query).await?;
        Ok(rows
            .iter()
            .map(|row| row.get("rebate_amount").and_then(Value::as_f64).unwrap_or(0.0))
            .sum())
    }
}

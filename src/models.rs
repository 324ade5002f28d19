//! Remote-record types exchanged with the hosted backend.
//!
//! The gateway owns none of these rows; every struct mirrors what the remote
//! service stores or returns, with `Option` for nullable columns.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity issued by the hosted auth service.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub user_metadata: UserMetadata,
    pub created_at: DateTime<Utc>,
}

/// Free-form metadata attached to a user at sign-up.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UserMetadata {
    pub name: Option<String>,
    pub vehicle_number: Option<String>,
}

/// Metadata supplied when creating a new identity.
#[derive(Serialize, Debug, Clone)]
pub struct SignUpMetadata {
    pub name: String,
    pub vehicle_number: String,
}

/// An authenticated session as returned by sign-in / sign-up / refresh.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: User,
}

/// Per-user record linking a user to their condo, with the condo joined in.
/// Read-only from this layer.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Profile {
    /// Same value as the auth user id.
    pub id: Uuid,
    pub condo_id: Uuid,
    pub condo: Condo,
}

/// A participating property whose rebate rate applies to its residents.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Condo {
    pub id: Uuid,
    pub name: String,
    pub tier: String,
    /// Fraction of the charged amount reimbursed, 0–1.
    pub rebate_rate: f64,
}

/// The `{name, tier}` projection embedded in joined reads.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CondoRef {
    pub name: String,
    pub tier: String,
}

/// Review state of a claim.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Flagged,
    Approved,
    Rejected,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Flagged => "flagged",
            ClaimStatus::Approved => "approved",
            ClaimStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single rebate request tied to one EV-charging receipt.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Claim {
    pub id: Uuid,
    pub user_id: Uuid,
    pub condo_id: Uuid,
    pub charge_date: NaiveDate,
    pub operator: String,
    pub amount: f64,
    pub receipt_image_path: Option<String>,
    /// Condo rate copied at submission time.
    pub rebate_rate: f64,
    /// amount × rebate_rate, computed by the gateway at submission.
    pub rebate_amount: f64,
    pub status: ClaimStatus,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A claim joined with its condo's `{name, tier}`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClaimWithCondo {
    #[serde(flatten)]
    pub claim: Claim,
    pub condo: CondoRef,
}

/// Row of the pre-joined `claims_with_details` view used by admin reads
/// and the CSV export.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClaimDetails {
    pub id: Uuid,
    pub user_id: Uuid,
    pub charge_date: NaiveDate,
    pub operator: String,
    pub amount: f64,
    pub receipt_image_path: Option<String>,
    pub rebate_rate: f64,
    pub rebate_amount: f64,
    pub status: ClaimStatus,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub participant_name: String,
    pub vehicle_number: String,
    pub condo_name: String,
    pub condo_tier: String,
}

/// Input for a new claim submission.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClaimSubmission {
    pub charge_date: NaiveDate,
    pub operator: String,
    pub amount: f64,
    /// Ignored if present; the rebate is always recomputed from the condo
    /// rate on the server-trusted profile.
    pub rebate_amount: Option<f64>,
}

/// A receipt image handed to upload. No local copy is retained.
#[derive(Debug, Clone)]
pub struct ReceiptFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Optional equality filters for admin claim reads.
///
/// A status of `"all"` is treated as no filter, matching the UI dropdown.
#[derive(Debug, Clone, Default)]
pub struct ClaimFilters {
    pub status: Option<String>,
    pub condo: Option<String>,
}

/// Approval state of a pending registration.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Approved,
}

/// A pre-approval request for a new resident/vehicle.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Registration {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub vehicle_number: String,
    pub condo_id: Uuid,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// A registration joined with its condo's `{name, tier}`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegistrationWithCondo {
    #[serde(flatten)]
    pub registration: Registration,
    pub condo: CondoRef,
}

/// Row of the precomputed `monthly_rebate_summary` view.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MonthlySummary {
    pub user_id: Uuid,
    pub month_year: String,
    pub claim_count: i64,
    pub total_amount: f64,
    pub total_rebate: f64,
}

/// Row of the precomputed `condo_stats` view.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CondoStats {
    pub condo_id: Uuid,
    pub name: String,
    pub tier: String,
    pub participant_count: i64,
    pub claim_count: i64,
    pub total_rebate: f64,
}

/// Claim counts and approved payout, reduced locally from all claims.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct DashboardStats {
    pub pending: usize,
    pub flagged: usize,
    pub approved: usize,
    pub total_payout: f64,
}

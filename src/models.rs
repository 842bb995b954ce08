use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Type definitions
pub type UserId = Uuid;
pub type VerificationId = Uuid;

// Verification methods a user can satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationType {
    PrepaidCard,
    GovernmentId,
    UtilityBill,
    PhoneNumber,
    BankAccount,
    PaymentMethod,
}

// Lifecycle of a single verification attempt. Records are created Pending
// and transition exactly once to Verified or Rejected; terminal states are
// never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

// Discrete permission levels, lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessTier {
    Basic,
    Standard,
    Full,
}

// Provider-assessed risk bands; lower score means safer throughout
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::VeryLow => "Very Low",
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::VeryHigh => "Very High",
        }
    }
}

// Identity anchor. Deletion is an external concern; the engine never
// removes users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new() -> Self {
        User {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    /// Account age in whole days, never negative.
    pub fn account_age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days().max(0)
    }
}

impl Default for User {
    fn default() -> Self {
        Self::new()
    }
}

// One attempt to prove one fact about a user. History is append-only:
// retries of the same type create new records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: VerificationId,
    pub user_id: UserId,
    pub verification_type: VerificationType,
    pub status: VerificationStatus,
    pub submitted_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

// One per user, created lazily on first access. `score` is always the
// output of the reputation formula over the other fields; it is never
// written independently of a recomputation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub user_id: UserId,
    pub score: f64,
    pub positive_transactions: u32,
    pub total_transactions: u32,
    pub verification_count: u32,
    pub account_age_days: i64,
}

impl ReputationRecord {
    pub fn new(user_id: UserId) -> Self {
        ReputationRecord {
            user_id,
            score: 0.0,
            positive_transactions: 0,
            total_transactions: 0,
            verification_count: 0,
            account_age_days: 0,
        }
    }
}

// Outcome of a single verification attempt, returned to callers in place
// of raw errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub success: bool,
    pub message: String,
    pub record_id: Option<VerificationId>,
}

// Per-provider risk assessment; transient, never persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub provider: String,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub factors: serde_json::Value,
    pub recommendations: Vec<String>,
}

// Combined outcome of running every applicable provider scorer for one
// user. Partial failure is reported, not escalated: `success` is true as
// long as at least one scorer produced an assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComprehensiveVerificationResult {
    pub success: bool,
    pub score: f64,
    pub risk_level: RiskLevel,
    pub assessments: Vec<RiskAssessment>,
    pub recommendations: Vec<String>,
    pub errors: Vec<String>,
    pub verification_methods: Vec<String>,
}

// Distinct verification types per status bucket for one user. A type with
// at least one verified record appears only under `verified`; a rejected
// type that was later verified is not re-reported as rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationStatusSummary {
    pub verified: Vec<VerificationType>,
    pub pending: Vec<VerificationType>,
    pub rejected: Vec<VerificationType>,
}

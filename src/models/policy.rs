use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ==================================================================================================
// Common
// ==================================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStatus {
    Draft,
    Active,
    Expired,
    Void,
}

/// Policy family, as it appears in `/policies/{kind}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Deposit,
    Loan,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Deposit => "deposit",
            PolicyKind::Loan => "loan",
        }
    }
}

/// Decimal fields arrive either as JSON numbers or as strings
fn decimal<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// ==================================================================================================
// Deposit policies
// ==================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositPolicy {
    pub policy_id: Uuid,
    pub deposit_amount_threshold: f64,
    /// Percentage
    pub late_deposit_fine: f64,
    pub deposit_frequency_days: u32,
    pub version: u32,
    pub effective_from: DateTime<Utc>,
    #[serde(default)]
    pub effective_to: Option<DateTime<Utc>>,
    pub status: PolicyStatus,
    #[serde(default)]
    pub is_occasional: bool,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewDepositPolicy {
    pub deposit_amount_threshold: f64,
    pub late_deposit_fine: f64,
    pub deposit_frequency_days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_to: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PolicyStatus>,
    pub is_occasional: bool,
}

/// Partial deposit policy update. The backend requires a reason for its audit log.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DepositPolicyUpdate {
    pub change_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit_amount_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub late_deposit_fine: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit_frequency_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_to: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PolicyStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_occasional: Option<bool>,
}

// ==================================================================================================
// Loan policies
// ==================================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanPolicy {
    pub policy_id: Uuid,
    pub version: u32,
    pub max_loan_amount: f64,
    pub min_loan_amount: f64,
    #[serde(deserialize_with = "decimal")]
    pub interest_rate: f64,
    #[serde(default)]
    pub grace_period_days: Option<u32>,
    #[serde(default)]
    pub max_renewals: Option<u32>,
    #[serde(default)]
    pub requires_collateral: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_occasional: bool,
    pub effective_from: DateTime<Utc>,
    #[serde(default)]
    pub effective_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LoanPolicy {
    /// Whether `amount` is within the policy's bounds
    pub fn allows_amount(&self, amount: f64) -> bool {
        amount >= self.min_loan_amount && amount <= self.max_loan_amount
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewLoanPolicy {
    pub max_loan_amount: f64,
    pub min_loan_amount: f64,
    pub interest_rate: f64,
    pub grace_period_days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_renewals: Option<u32>,
    pub requires_collateral: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoanPolicyUpdate {
    pub change_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_loan_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_loan_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_period_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_renewals: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_collateral: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_to: Option<DateTime<Utc>>,
}

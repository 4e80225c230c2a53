use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Timeliness of a deposit relative to its due date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    Early,
    OnTime,
    Late,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub deposited_amount: f64,
    #[serde(default)]
    pub amount_to_be_deposited: Option<f64>,
    #[serde(default)]
    pub deposited_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_deposit_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<DepositStatus>,
    #[serde(default)]
    pub fine_amount: f64,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub verified_by: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Deposit {
    /// Amount still owed, never negative
    pub fn shortfall(&self) -> f64 {
        match self.amount_to_be_deposited {
            Some(due) => (due - self.deposited_amount).max(0.0),
            None => 0.0,
        }
    }
}

// Typed calls for the backend resources used by the dashboard screens

use uuid::Uuid;

use crate::auth::AuthCoordinator;
use crate::error::Result;
use crate::models::{
    Deposit, DepositPolicy, DepositPolicyUpdate, LoanPolicy, LoanPolicyUpdate, MarkedRead,
    NewDepositPolicy, NewLoanPolicy, Notification, PolicyKind, RoleAssignment, User, UserUpdate,
};
use crate::request::ApiRequest;

/// Largest page the admin user listing accepts
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct CoopApi {
    coordinator: AuthCoordinator,
}

impl CoopApi {
    pub fn new(coordinator: AuthCoordinator) -> Self {
        Self { coordinator }
    }

    /// Page through members (admin only)
    pub async fn list_users(&self, skip: u32, limit: u32) -> Result<Vec<User>> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        self.coordinator
            .send_json(
                ApiRequest::get("/admin/users")
                    .query("skip", skip)
                    .query("limit", limit),
            )
            .await
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User> {
        self.coordinator
            .send_json(ApiRequest::get(format!("/admin/users/{}", id)))
            .await
    }

    /// Enable or disable a member's account (admin)
    pub async fn toggle_user_disabled(&self, id: Uuid) -> Result<User> {
        self.coordinator
            .send_json(ApiRequest::post(format!("/admin/users/{}/toggle-disabled", id)))
            .await
    }

    /// Replace a member's access and cooperative roles (admin)
    pub async fn assign_roles(&self, id: Uuid, roles: &RoleAssignment) -> Result<User> {
        self.coordinator
            .send_json(ApiRequest::patch(format!("/admin/users/{}", id)).json(roles)?)
            .await
    }

    pub async fn update_me(&self, update: &UserUpdate) -> Result<User> {
        self.coordinator
            .send_json(ApiRequest::patch("/users/me").json(update)?)
            .await
    }

    pub async fn get_deposit(&self, id: Uuid) -> Result<Deposit> {
        self.coordinator
            .send_json(ApiRequest::get(format!("/deposits/deposit/{}", id)))
            .await
    }

    /// Notifications for the signed-in user, newest first
    pub async fn list_notifications(&self) -> Result<Vec<Notification>> {
        self.coordinator
            .send_json(ApiRequest::get("/notifications"))
            .await
    }

    pub async fn mark_notification_read(&self, id: Uuid) -> Result<Notification> {
        self.coordinator
            .send_json(ApiRequest::patch(format!("/notifications/{}/read", id)))
            .await
    }

    /// Returns how many notifications changed state
    pub async fn mark_all_notifications_read(&self) -> Result<u64> {
        let marked: MarkedRead = self
            .coordinator
            .send_json(ApiRequest::patch("/notifications/read-all"))
            .await?;
        Ok(marked.marked_read)
    }

    pub async fn list_deposit_policies(&self) -> Result<Vec<DepositPolicy>> {
        self.coordinator
            .send_json(ApiRequest::get("/policies/deposit"))
            .await
    }

    pub async fn create_deposit_policy(&self, policy: &NewDepositPolicy) -> Result<DepositPolicy> {
        self.coordinator
            .send_json(ApiRequest::post("/policies/deposit").json(policy)?)
            .await
    }

    pub async fn update_deposit_policy(
        &self,
        id: Uuid,
        update: &DepositPolicyUpdate,
    ) -> Result<DepositPolicy> {
        self.coordinator
            .send_json(ApiRequest::put(format!("/policies/deposit/{}", id)).json(update)?)
            .await
    }

    pub async fn list_loan_policies(&self) -> Result<Vec<LoanPolicy>> {
        self.coordinator
            .send_json(ApiRequest::get("/policies/loan"))
            .await
    }

    pub async fn create_loan_policy(&self, policy: &NewLoanPolicy) -> Result<LoanPolicy> {
        self.coordinator
            .send_json(ApiRequest::post("/policies/loan").json(policy)?)
            .await
    }

    pub async fn update_loan_policy(&self, id: Uuid, update: &LoanPolicyUpdate) -> Result<LoanPolicy> {
        self.coordinator
            .send_json(ApiRequest::put(format!("/policies/loan/{}", id)).json(update)?)
            .await
    }

    pub async fn delete_policy(&self, kind: PolicyKind, id: Uuid) -> Result<()> {
        self.coordinator
            .send(ApiRequest::delete(format!("/policies/{}/{}", kind.as_str(), id)))
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Arbitrary authenticated GET, decoded as JSON
    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        self.coordinator.send_json(ApiRequest::get(path)).await
    }
}

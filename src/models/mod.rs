// Data models for backend resources

pub mod deposit;
pub mod notification;
pub mod policy;
pub mod user;

pub use deposit::{Deposit, DepositStatus};
pub use notification::{MarkedRead, Notification};
pub use policy::{
    DepositPolicy, DepositPolicyUpdate, LoanPolicy, LoanPolicyUpdate, NewDepositPolicy,
    NewLoanPolicy, PolicyKind, PolicyStatus,
};
pub use user::{AccessRole, LoginSuccess, NewMember, RoleAssignment, User, UserUpdate};

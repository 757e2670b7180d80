pub mod application_fees;
pub mod plans;
pub mod subscriptions;
pub mod transactions;
pub mod users;

pub use application_fees::ApplicationFeeRepo;
pub use plans::PlanRepo;
pub use subscriptions::SubscriptionRepo;
pub use transactions::TransactionRepo;
pub use users::UserRepo;

pub mod application_fee;
pub mod email;
pub mod jwt;
pub mod paystack;
pub mod subscription;

pub use application_fee::ApplicationFeeService;
pub use email::EmailService;
pub use jwt::JwtService;
pub use paystack::PaystackClient;
pub use subscription::SubscriptionService;

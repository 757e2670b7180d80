pub mod application_fee;
pub mod plan;
pub mod subscription;
pub mod transaction;
pub mod user;

pub use application_fee::*;
pub use plan::*;
pub use subscription::*;
pub use transaction::*;
pub use user::*;

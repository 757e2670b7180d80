pub mod error;
pub mod response;

pub use error::ServiceError;
pub use response::{ApiError, ApiResponse};

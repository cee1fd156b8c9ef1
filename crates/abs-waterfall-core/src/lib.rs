pub mod error;
pub mod time_value;
pub mod types;

#[cfg(feature = "structured_credit")]
pub mod structured_credit;

pub use error::WaterfallError;
pub use types::*;

/// Standard result type for all waterfall operations
pub type WaterfallResult<T> = Result<T, WaterfallError>;

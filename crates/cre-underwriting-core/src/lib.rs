pub mod error;
pub mod time_value;
pub mod types;

#[cfg(feature = "real_estate")]
pub mod real_estate;

#[cfg(feature = "pe")]
pub mod pe;

#[cfg(feature = "scenarios")]
pub mod scenarios;

pub use error::UnderwritingError;
pub use types::*;

pub type UnderwritingResult<T> = Result<T, UnderwritingError>;

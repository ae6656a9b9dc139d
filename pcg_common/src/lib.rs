mod cents;
mod helpers;

pub mod op;
mod secret;

pub use cents::{Cents, CentsConversionError, SETTLEMENT_CURRENCY_CODE, SETTLEMENT_CURRENCY_CODE_LOWER};
pub use helpers::parse_boolean_flag;
pub use secret::Secret;

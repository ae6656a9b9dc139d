mod operator_key;
mod signature;

pub use operator_key::{OperatorKeyMiddlewareFactory, OperatorKeyMiddlewareService, OPERATOR_KEY_HEADER};
pub use signature::{SignatureMiddlewareFactory, SignatureMiddlewareService, SIGNATURE_HEADER};

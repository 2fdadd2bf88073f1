pub mod challenge;
pub mod credential;
pub mod dpop;

pub use challenge::{BearerChallenge, ErrorCode};
pub use credential::{Scheme, extract, extract_any};

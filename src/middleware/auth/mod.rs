pub mod access;
pub mod rejection;

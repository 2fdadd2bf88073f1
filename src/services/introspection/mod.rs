pub mod action;
pub mod classify;
pub mod client;
pub mod factory;
pub mod http;
pub mod outcome;

pub use action::Action;
pub use classify::{AccessRequirement, TokenFacts, classify, derive};
pub use client::{IntrospectionError, IntrospectionRequest, Introspector};
pub use factory::build_introspector;
pub use outcome::{IntrospectionOutcome, Property};

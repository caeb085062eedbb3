pub mod service;

pub use service::{EntitlementService, TokenCost, UsageCheck, UNLIMITED_AVAILABLE};

pub mod account;
pub mod entitlement;
pub mod jobs;
pub mod script;
pub mod stream;
pub mod synthesis;

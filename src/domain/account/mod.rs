pub mod model;

pub use model::{Account, PlanTier};

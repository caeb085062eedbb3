pub mod error;
pub mod hash;
pub mod model;
pub mod service;

pub use error::SynthesisError;
pub use model::{Narration, NarrationStatus};
pub use service::SynthesisService;

use crate::error::AppError;
use crate::infrastructure::repositories::SpeechError;

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("payment required: {0}")]
    PaymentRequired(String),
    #[error("speech provider: {0}")]
    Provider(#[from] SpeechError),
    #[error("dependency error: {0}")]
    Dependency(String),
}

impl From<AppError> for SynthesisError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::PaymentRequired(msg) => SynthesisError::PaymentRequired(msg),
            AppError::BadRequest(msg) => SynthesisError::Invalid(msg),
            AppError::NotFound(msg) => SynthesisError::Invalid(msg),
            _ => SynthesisError::Dependency(err.to_string()),
        }
    }
}

impl From<SynthesisError> for AppError {
    fn from(err: SynthesisError) -> Self {
        match err {
            SynthesisError::PaymentRequired(msg) => AppError::PaymentRequired(msg),
            SynthesisError::Invalid(msg) => AppError::BadRequest(msg),
            SynthesisError::Provider(e) => AppError::ExternalService(e.to_string()),
            SynthesisError::Dependency(msg) => AppError::ExternalService(msg),
        }
    }
}

use githook_core::Error as CoreError;
use thiserror::Error;

/// Leaf error for the intake path, converting into the core taxonomy at the
/// crate boundary the way every other subsystem crate does (spec §7).
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Signature(#[from] githook_crypto::SignatureError),
}

impl From<IntakeError> for CoreError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::Core(e) => e,
            IntakeError::Signature(_) => CoreError::SignatureMismatch,
        }
    }
}

pub type Result<T> = std::result::Result<T, IntakeError>;

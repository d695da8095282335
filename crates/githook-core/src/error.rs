use thiserror::Error;

/// The error taxonomy surfaced by the core (see spec §7).
///
/// Every subsystem crate defines its own leaf error enum and converts into
/// this one at its public boundary, the way the reference services convert
/// `sqlx::Error` / `redis::RedisError` into a handful of coarse
/// `ApiError` variants before a response is ever built.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("transform failed: {0}")]
    TransformFailed(String),

    #[error("publish failed: {0}")]
    PublishFailed(String),

    #[error("unknown driver: {0}")]
    UnknownDriver(String),

    #[error("publisher closed")]
    PublisherClosed,

    #[error("no publishers available")]
    NoPublishersAvailable,

    #[error("no matching rules")]
    NoMatchingRules,

    #[error("body too large: {0} bytes")]
    BodyTooLarge(usize),

    #[error("unrecognized event: {0}")]
    UnrecognizedEvent(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("canceled")]
    Canceled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable machine-readable code, independent of the transport. Used for
    /// the `X-Error-Code` header and for log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "invalid_argument",
            Error::NotFound(_) => "not_found",
            Error::AlreadyExists(_) => "already_exists",
            Error::FailedPrecondition(_) => "failed_precondition",
            Error::PermissionDenied(_) => "permission_denied",
            Error::SignatureMismatch => "signature_mismatch",
            Error::TransformFailed(_) => "transform_failed",
            Error::PublishFailed(_) => "publish_failed",
            Error::UnknownDriver(_) => "unknown_driver",
            Error::PublisherClosed => "publisher_closed",
            Error::NoPublishersAvailable => "no_publishers_available",
            Error::NoMatchingRules => "no_matching_rules",
            Error::BodyTooLarge(_) => "body_too_large",
            Error::UnrecognizedEvent(_) => "unrecognized_event",
            Error::StorageUnavailable(_) => "storage_unavailable",
            Error::Canceled => "canceled",
            Error::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

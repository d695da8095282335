use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use githook_core::Error as CoreError;
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// HTTP-facing wrapper around the core error taxonomy (spec §7). Mirrors
/// the reference `common-http-errors::ApiError` shape: a status, a stable
/// machine code echoed in `X-Error-Code`, and an optional human message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: Option<String>,
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::AlreadyExists(_) => StatusCode::CONFLICT,
        CoreError::FailedPrecondition(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        CoreError::SignatureMismatch => StatusCode::BAD_REQUEST,
        CoreError::TransformFailed(_) => StatusCode::BAD_GATEWAY,
        CoreError::PublishFailed(_) => StatusCode::BAD_GATEWAY,
        CoreError::UnknownDriver(_) => StatusCode::BAD_REQUEST,
        CoreError::PublisherClosed => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::NoPublishersAvailable => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::NoMatchingRules => StatusCode::NOT_FOUND,
        CoreError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        CoreError::UnrecognizedEvent(_) => StatusCode::BAD_REQUEST,
        CoreError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::Canceled => StatusCode::REQUEST_TIMEOUT,
        CoreError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = status_for(&err);
        let code = err.code();
        let message = match &err {
            CoreError::SignatureMismatch | CoreError::PublisherClosed | CoreError::Canceled => {
                None
            }
            _ => Some(err.to_string()),
        };
        ApiError {
            status,
            code,
            message,
            request_id: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.to_string(),
            request_id: self.request_id.clone(),
            message: self.message,
        };
        let mut resp = (self.status, Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(self.code) {
            resp.headers_mut().insert("X-Error-Code", value);
        }
        resp
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_precondition_maps_to_service_unavailable() {
        let api: ApiError = CoreError::FailedPrecondition("disabled driver".into()).into();
        assert_eq!(api.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(api.code, "failed_precondition");
    }

    #[test]
    fn signature_mismatch_hides_message() {
        let api: ApiError = CoreError::SignatureMismatch.into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert!(api.message.is_none());
    }
}

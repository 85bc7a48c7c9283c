use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use jury_allocator::AllocatorError;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub code: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<SubmissionProgress>,
}

/// Committed and pending counts of a partly stored batch.
#[derive(Debug, Serialize)]
pub struct SubmissionProgress {
    pub committed: usize,
    pub pending: usize,
}

impl ProblemDetails {
    fn new(status: StatusCode, code: impl Into<String>, detail: impl Into<String>) -> Self {
        let code = code.into();
        let title = status
            .canonical_reason()
            .unwrap_or("Unknown Error")
            .to_string();
        Self {
            r#type: format!("urn:jury:problem:{code}"),
            title,
            status: status.as_u16(),
            detail: detail.into(),
            instance: None,
            code,
            retryable: false,
            submission: None,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub problem: Box<ProblemDetails>,
}

impl ApiError {
    fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        let problem = Box::new(ProblemDetails::new(status, code, message));
        Self { status, problem }
    }

    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    pub fn bad_gateway(code: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::new(StatusCode::BAD_GATEWAY, code, message);
        err.problem.retryable = true;
        err
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.problem.instance = Some(instance.into());
        self
    }

    pub fn code(&self) -> &str {
        &self.problem.code
    }
}

impl From<AllocatorError> for ApiError {
    fn from(err: AllocatorError) -> Self {
        let message = err.to_string();
        let mut api = match &err {
            AllocatorError::Validation(_) => Self::bad_request("invalid_request", message),
            AllocatorError::JudgeExists(_) => Self::conflict("judge_exists", message),
            AllocatorError::UnknownJudge(_) => Self::not_found("judge_not_found", message),
            AllocatorError::NoActiveBatch(_) => Self::not_found("no_active_batch", message),
            AllocatorError::IncompleteBatch { .. } => {
                Self::bad_request("incomplete_batch", message)
            }
            AllocatorError::BatchBusy(_) => Self::conflict("batch_busy", message),
            AllocatorError::Store(_) => {
                warn!(error = %err, "Score store call failed");
                Self::bad_gateway("store_unavailable", message)
            }
            AllocatorError::Transport {
                committed, pending, ..
            } => {
                warn!(error = %err, "Batch submission incomplete");
                let mut api = Self::bad_gateway("submission_incomplete", message);
                api.problem.submission = Some(SubmissionProgress {
                    committed: *committed,
                    pending: *pending,
                });
                api
            }
        };
        api.problem.retryable = err.is_retryable();
        api
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.problem)).into_response();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

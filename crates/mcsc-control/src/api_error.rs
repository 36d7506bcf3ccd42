use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mcsc_agent::{ErrorKind, ServerError};

#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub payload: ErrorPayload,
}

pub type ApiResult<T> = Result<T, ApiError>;

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::UnsupportedVersion | ErrorKind::InvalidInput | ErrorKind::Decode => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::NotInitialized => StatusCode::CONFLICT,
        ErrorKind::NotRunning => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::LockTimeout => StatusCode::REQUEST_TIMEOUT,
        ErrorKind::Encode
        | ErrorKind::Io
        | ErrorKind::Artifact
        | ErrorKind::Launch
        | ErrorKind::Transport => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn hint_for(kind: ErrorKind) -> Option<&'static str> {
    match kind {
        ErrorKind::NotRunning => Some("Start the server first."),
        ErrorKind::LockTimeout => Some("Another console command is in flight; retry shortly."),
        ErrorKind::Launch => Some("Ensure Java is installed and the server directory is writable."),
        ErrorKind::UnsupportedVersion => Some("GET /versions lists the installable versions."),
        _ => None,
    }
}

impl From<ServerError> for ApiError {
    fn from(err: ServerError) -> Self {
        let kind = err.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            tracing::error!(error = %err, code = err.code(), "request failed");
        }
        Self {
            status,
            payload: ErrorPayload {
                code: err.code().to_string(),
                message: err.to_string(),
                hint: hint_for(kind).map(str::to_string),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.payload)).into_response()
    }
}

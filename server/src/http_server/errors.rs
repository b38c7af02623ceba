use std::fmt::{Debug, Display};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// A report plus the status it should be answered with. Renders as
/// `{"error": "<message>"}`.
pub struct ServerError(pub(crate) color_eyre::Report, pub(crate) StatusCode);

impl Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("Status Code: {}\n", self.1))?;

        Debug::fmt(&self.0, f)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if self.1.is_server_error() {
            let err: &(dyn std::error::Error + 'static) = self.0.as_ref();
            sentry::capture_error(err);
            tracing::error!(error = ?self, "ServerError");
        } else {
            tracing::debug!(status = %self.1, error = %self.0, "Request rejected");
        }

        let body = serde_json::json!({ "error": self.0.to_string() });

        (self.1, Json(body)).into_response()
    }
}

impl<E> From<E> for ServerError
where
    E: Into<color_eyre::Report>,
{
    fn from(err: E) -> Self {
        ServerError(err.into(), StatusCode::INTERNAL_SERVER_ERROR)
    }
}

pub(crate) trait WithStatus<T> {
    fn with_status(self, status: StatusCode) -> Result<T, ServerError>;
}

impl<T, E> WithStatus<T> for Result<T, E>
where
    E: Into<color_eyre::Report>,
{
    fn with_status(self, status: StatusCode) -> Result<T, ServerError> {
        self.map_err(|err| ServerError(err.into(), status))
    }
}

//! Domain-specific error types for ctf-gallery

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Main error type shared by the public app and the admin API
#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{message}")]
    BadRequest { message: String },

    #[error("Blocked by SSRF filter: {message}")]
    Blocked { message: String },

    #[error("Error fetching target: {message}")]
    Upstream { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    TooLarge { message: String },

    #[error("Template error: {message}")]
    Template { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GalleryError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        GalleryError::BadRequest {
            message: message.into(),
        }
    }

    pub fn template(message: impl Into<String>) -> Self {
        GalleryError::Template {
            message: message.into(),
        }
    }

    /// HTTP status the error surfaces as
    pub fn status(&self) -> StatusCode {
        match self {
            GalleryError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            GalleryError::Template { .. } => StatusCode::BAD_REQUEST,
            GalleryError::Blocked { .. } => StatusCode::FORBIDDEN,
            GalleryError::NotFound { .. } => StatusCode::NOT_FOUND,
            GalleryError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GalleryError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            GalleryError::Config { .. }
            | GalleryError::Io { .. }
            | GalleryError::Serialization { .. }
            | GalleryError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for GalleryError {
    fn from(err: anyhow::Error) -> Self {
        GalleryError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for GalleryError {
    fn from(err: std::io::Error) -> Self {
        GalleryError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for GalleryError {
    fn from(err: serde_json::Error) -> Self {
        GalleryError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for GalleryError {
    fn from(err: reqwest::Error) -> Self {
        GalleryError::Upstream {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for GalleryError {
    fn from(_: url::ParseError) -> Self {
        GalleryError::bad_request("Unsupported URL scheme or missing hostname")
    }
}

impl From<toml::de::Error> for GalleryError {
    fn from(err: toml::de::Error) -> Self {
        GalleryError::Config {
            message: err.to_string(),
        }
    }
}

impl From<handlebars::RenderError> for GalleryError {
    fn from(err: handlebars::RenderError) -> Self {
        GalleryError::Template {
            message: err.to_string(),
        }
    }
}

/// Plain-text bodies, matching what the services have always returned
impl IntoResponse for GalleryError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        (status, self.to_string()).into_response()
    }
}

/// Result type alias for ctf-gallery operations
pub type Result<T> = std::result::Result<T, GalleryError>;

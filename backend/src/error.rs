//! Error handling for Kua AgroApp
//!
//! Provides consistent error responses in English and Spanish

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::ValidationError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Store availability
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Identity provider
    #[error("Waiting for an authenticated session")]
    AuthPending,

    #[error("Anonymous sign-in failed: {0}")]
    SignInFailed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_es: String,
    },

    // Ledger errors
    #[error("No farmer session is active")]
    SessionNotReady,

    #[error("Ledger write failed: {0}")]
    WriteFailure(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        let field = match &err {
            ValidationError::EmptyIdentity => "code".to_string(),
            ValidationError::InvalidNumber { field } => field.to_string(),
            ValidationError::UnknownLote(_) => "lote".to_string(),
            ValidationError::UnknownTapeColor(_) => "color".to_string(),
            ValidationError::UnknownField(_) => "field".to_string(),
        };
        AppError::Validation {
            field,
            message: err.to_string(),
            message_es: err.message_es(),
        }
    }
}

impl From<shared::ExportError> for AppError {
    fn from(err: shared::ExportError) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::Configuration(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail {
                    code: "CONFIGURATION_ERROR".to_string(),
                    message_en: format!("Could not connect to the database: {}", msg),
                    message_es: "Error de Configuración: No se pudo conectar a la base de datos."
                        .to_string(),
                    field: None,
                },
            ),
            AppError::AuthPending => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail {
                    code: "AUTH_PENDING".to_string(),
                    message_en: "Connecting to the server...".to_string(),
                    message_es: "Conectando al servidor...".to_string(),
                    field: None,
                },
            ),
            AppError::SignInFailed(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail {
                    code: "SIGN_IN_FAILED".to_string(),
                    message_en: format!("Anonymous sign-in failed: {}", msg),
                    message_es: "No se pudo iniciar la sesión anónima.".to_string(),
                    field: None,
                },
            ),
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "UNAUTHORIZED".to_string(),
                    message_en: msg.clone(),
                    message_es: "No autorizado".to_string(),
                    field: None,
                },
            ),
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "TOKEN_EXPIRED".to_string(),
                    message_en: "Token has expired".to_string(),
                    message_es: "La sesión ha expirado".to_string(),
                    field: None,
                },
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail {
                    code: "INVALID_TOKEN".to_string(),
                    message_en: "Invalid token".to_string(),
                    message_es: "Sesión no válida".to_string(),
                    field: None,
                },
            ),
            AppError::Validation {
                field,
                message,
                message_es,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_es: message_es.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::SessionNotReady => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "SESSION_NOT_READY".to_string(),
                    message_en: "Sign in with a farmer code before saving records".to_string(),
                    message_es: "Ingrese su código de agricultor antes de guardar registros."
                        .to_string(),
                    field: None,
                },
            ),
            AppError::WriteFailure(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail {
                    code: "WRITE_FAILURE".to_string(),
                    message_en: format!("The record could not be saved: {}", msg),
                    message_es: "No se pudo guardar el registro. Intente de nuevo.".to_string(),
                    field: None,
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_es: format!("No se encontró {}", resource),
                    field: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_es: "Ocurrió un error en la base de datos".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_es: "Error interno del servidor".to_string(),
                    field: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: "An internal server error occurred".to_string(),
                    message_es: "Error interno del servidor".to_string(),
                    field: None,
                },
            ),
        }
    }

    /// Short machine-readable code, also used in logs
    pub fn code(&self) -> String {
        self.status_and_detail().1.code
    }

    /// Spanish text shown to field workers
    pub fn message_es(&self) -> String {
        self.status_and_detail().1.message_es
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Rejected request: {:?}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

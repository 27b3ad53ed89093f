//! Error handling module for the YelpCamp backend.
//!
//! Every failure a handler can hit is mapped into [`AppError`], whose
//! `IntoResponse` decides between an error page and a flash-carrying redirect.
//! Session side effects (flash, return-to path) travel on the response as a
//! [`SessionEffects`] extension and are written by the session-effects
//! middleware, so no error path needs access to the session itself.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use crate::api::Page;
use crate::auth::{AuthError, FlashKind, RegistrationError};
use crate::enrich::EnrichmentError;
use crate::middleware::SessionEffects;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const AUTHENTICATION_REQUIRED: &str = "AUTHENTICATION_REQUIRED";
    pub const AUTHORIZATION_DENIED: &str = "AUTHORIZATION_DENIED";
    pub const REJECTED: &str = "REJECTED";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// User-facing messages.
pub mod messages {
    pub const CAMPGROUND_NOT_FOUND: &str = "Cannot find that campground!";
    pub const PAGE_NOT_FOUND: &str = "Page Not Found";
    pub const LOGIN_REQUIRED: &str = "You must be signed in first!";
    pub const PERMISSION_DENIED: &str = "You do not have permission to do that!";
    pub const SOMETHING_WENT_WRONG: &str = "Something went wrong";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Bad or missing input outside a re-renderable form
    Validation(String),
    /// Entity not found
    NotFound(String),
    /// No route matched the request
    RouteNotFound,
    /// Gate failure; `return_to` is remembered for the next login
    AuthenticationRequired { return_to: String },
    /// Policy failure on an existing resource
    AuthorizationDenied { redirect_to: String },
    /// User-facing failure shown as an error flash on `redirect_to`
    Rejected { redirect_to: String, message: String },
    /// Geocoder or media store unreachable or erroring
    Upstream(String),
    /// Database error
    Database(String),
    /// Internal server error
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RouteNotFound => StatusCode::NOT_FOUND,
            AppError::NotFound(_)
            | AppError::AuthenticationRequired { .. }
            | AppError::AuthorizationDenied { .. }
            | AppError::Rejected { .. } => StatusCode::SEE_OTHER,
            AppError::Upstream(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::NotFound(_) | AppError::RouteNotFound => codes::NOT_FOUND,
            AppError::AuthenticationRequired { .. } => codes::AUTHENTICATION_REQUIRED,
            AppError::AuthorizationDenied { .. } => codes::AUTHORIZATION_DENIED,
            AppError::Rejected { .. } => codes::REJECTED,
            AppError::Upstream(_) => codes::UPSTREAM_ERROR,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message. May contain internal detail; see [`Self::public_message`].
    pub fn message(&self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::Upstream(msg)
            | AppError::Database(msg)
            | AppError::Internal(msg) => msg.clone(),
            AppError::RouteNotFound => messages::PAGE_NOT_FOUND.to_string(),
            AppError::AuthenticationRequired { return_to } => {
                format!("authentication required for {return_to}")
            }
            AppError::AuthorizationDenied { redirect_to } => {
                format!("permission denied on {redirect_to}")
            }
            AppError::Rejected { message, .. } => message.clone(),
        }
    }

    /// The message shown to the client.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::Rejected { message: msg, .. } => msg.clone(),
            AppError::NotFound(_) => messages::CAMPGROUND_NOT_FOUND.to_string(),
            AppError::RouteNotFound => messages::PAGE_NOT_FOUND.to_string(),
            AppError::AuthenticationRequired { .. } => messages::LOGIN_REQUIRED.to_string(),
            AppError::AuthorizationDenied { .. } => messages::PERMISSION_DENIED.to_string(),
            AppError::Upstream(_) | AppError::Database(_) | AppError::Internal(_) => {
                messages::SOMETHING_WENT_WRONG.to_string()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("Stored document decode error: {:?}", err);
        AppError::Database(format!("JSON error: {}", err))
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        tracing::error!("Session error: {:?}", err);
        AppError::Internal(format!("Session error: {}", err))
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::Validation(format!("Malformed upload: {}", err.body_text()))
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::Rejected {
                redirect_to: "/login".to_string(),
                message: err.to_string(),
            },
            AuthError::Store(inner) => inner,
            AuthError::Hashing(msg) => AppError::Internal(msg),
        }
    }
}

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::Invalid(_) | RegistrationError::Duplicate(_) => AppError::Rejected {
                redirect_to: "/register".to_string(),
                message: err.to_string(),
            },
            RegistrationError::Store(inner) => inner,
            RegistrationError::Hashing(msg) => AppError::Internal(msg),
        }
    }
}

impl From<EnrichmentError> for AppError {
    fn from(err: EnrichmentError) -> Self {
        match err {
            EnrichmentError::InvalidUpload(msg) => AppError::Validation(msg),
            other => {
                tracing::error!("Enrichment error: {}", other);
                AppError::Upstream(other.to_string())
            }
        }
    }
}

/// Redirect carrying a flash message for the next rendered page.
pub fn redirect_with_flash(to: &str, kind: FlashKind, message: impl Into<String>) -> Response {
    with_effects(
        Redirect::to(to).into_response(),
        SessionEffects::flash(kind, message),
    )
}

fn with_effects(mut response: Response, effects: SessionEffects) -> Response {
    response.extensions_mut().insert(effects);
    response
}

/// Render the uniform error page.
pub fn error_page(status: StatusCode, message: impl Into<String>) -> Response {
    Page::error(status, message.into()).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let public = self.public_message();
        match self {
            AppError::NotFound(detail) => {
                tracing::debug!("{}", detail);
                redirect_with_flash("/campgrounds", FlashKind::Error, public)
            }
            AppError::AuthenticationRequired { return_to } => with_effects(
                Redirect::to("/login").into_response(),
                SessionEffects::flash(FlashKind::Error, public).remember(return_to),
            ),
            AppError::AuthorizationDenied { redirect_to }
            | AppError::Rejected { redirect_to, .. } => {
                redirect_with_flash(&redirect_to, FlashKind::Error, public)
            }
            AppError::Validation(_) => error_page(StatusCode::BAD_REQUEST, public),
            AppError::RouteNotFound => error_page(StatusCode::NOT_FOUND, public),
            err @ (AppError::Upstream(_) | AppError::Database(_) | AppError::Internal(_)) => {
                tracing::error!("Request failed: {}", err);
                error_page(err.status_code(), public)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    #[test]
    fn test_authentication_required_redirects_to_login() {
        let response = AppError::AuthenticationRequired {
            return_to: "/campgrounds/new".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
        let effects = response.extensions().get::<SessionEffects>().unwrap();
        assert_eq!(effects.return_to.as_deref(), Some("/campgrounds/new"));
        assert_eq!(
            effects.flash,
            Some((FlashKind::Error, messages::LOGIN_REQUIRED.to_string()))
        );
    }

    #[test]
    fn test_authorization_denied_redirects_to_resource() {
        let response = AppError::AuthorizationDenied {
            redirect_to: "/campgrounds/abc".to_string(),
        }
        .into_response();

        assert_eq!(location(&response), "/campgrounds/abc");
        let effects = response.extensions().get::<SessionEffects>().unwrap();
        assert!(effects.return_to.is_none());
        assert_eq!(
            effects.flash,
            Some((FlashKind::Error, messages::PERMISSION_DENIED.to_string()))
        );
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let err = AppError::Database("UNIQUE constraint failed: secret detail".to_string());
        assert_eq!(err.public_message(), messages::SOMETHING_WENT_WRONG);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<SessionEffects>().is_none());
    }

    #[test]
    fn test_route_not_found_is_404() {
        let response = AppError::RouteNotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

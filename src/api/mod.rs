//! HTTP handlers.
//!
//! Reads and forms produce a [`Page`]: the view model handed to the template
//! layer, serialized as JSON. Mutations end in a redirect.

mod campgrounds;
mod reviews;
mod users;

pub use campgrounds::*;
pub use reviews::*;
pub use users::*;

use axum::{
    extract::{rejection::FormRejection, Form},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::{Flash, RequestContext};
use crate::errors::AppError;
use crate::models::User;

/// View model for one rendered page.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T: Serialize> {
    #[serde(skip)]
    status: StatusCode,
    pub view: &'static str,
    pub title: String,
    pub flash: Flash,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_user: Option<User>,
    pub data: T,
}

impl<T: Serialize> Page<T> {
    pub fn new(view: &'static str, title: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            view,
            title: title.into(),
            flash: Flash::default(),
            current_user: None,
            data,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_flash(mut self, flash: Flash) -> Self {
        self.flash = flash;
        self
    }

    pub fn with_user(mut self, user: Option<User>) -> Self {
        self.current_user = user;
        self
    }
}

/// Data of the error page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorView {
    pub status_code: u16,
    pub message: String,
}

impl Page<ErrorView> {
    pub fn error(status: StatusCode, message: String) -> Self {
        Page::new(
            "error",
            "Error",
            ErrorView {
                status_code: status.as_u16(),
                message,
            },
        )
        .with_status(status)
    }
}

impl<T: Serialize> IntoResponse for Page<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

pub type PageResult<T> = Result<Page<T>, AppError>;

/// Unwrap a urlencoded form, turning a rejection into a validation error.
pub fn form_input<T>(form: Result<Form<T>, FormRejection>) -> Result<T, AppError> {
    form.map(|Form(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// GET / - Landing page.
pub async fn home(ctx: RequestContext) -> PageResult<()> {
    ctx.render("home", "YelpCamp", ()).await
}

/// Fallback for unmatched routes.
pub async fn not_found() -> AppError {
    AppError::RouteNotFound
}

/// GET /health - Liveness probe.
pub async fn health_check() -> &'static str {
    "OK"
}

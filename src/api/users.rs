//! Registration, login and logout.

use axum::{
    extract::{rejection::FormRejection, Form, State},
    response::Response,
};

use super::{form_input, PageResult};
use crate::auth::{self, FlashKind, RequestContext, DEFAULT_LANDING};
use crate::errors::{redirect_with_flash, AppError};
use crate::models::{LoginForm, RegistrationForm};
use crate::AppState;

/// GET /register
pub async fn register_form(ctx: RequestContext) -> PageResult<()> {
    ctx.render("users/register", "Register", ()).await
}

/// POST /register - Create an account and log it in.
pub async fn register(
    State(state): State<AppState>,
    ctx: RequestContext,
    form: Result<Form<RegistrationForm>, FormRejection>,
) -> Result<Response, AppError> {
    let form = form_input(form)?;
    let user = auth::register(&state.repo, &form).await?;
    let destination = ctx.log_in(&user).await?;

    Ok(redirect_with_flash(
        &destination,
        FlashKind::Success,
        "Welcome to Yelp Camp!",
    ))
}

/// GET /login
pub async fn login_form(ctx: RequestContext) -> PageResult<()> {
    ctx.render("users/login", "Login", ()).await
}

/// POST /login - Authenticate and return to the remembered page.
pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Response, AppError> {
    let form = form_input(form)?;
    let user = match auth::authenticate(&state.repo, &form.username, &form.password).await {
        Ok(user) => user,
        Err(err) => {
            tracing::info!("Failed login for {:?}", form.username);
            return Err(err.into());
        }
    };
    let destination = ctx.log_in(&user).await?;

    Ok(redirect_with_flash(&destination, FlashKind::Success, "Welcome back!"))
}

/// GET /logout
pub async fn logout(ctx: RequestContext) -> Result<Response, AppError> {
    ctx.log_out().await?;
    Ok(redirect_with_flash(DEFAULT_LANDING, FlashKind::Success, "Goodbye!"))
}

//! Request-scoped session context.
//!
//! [`RequestContext`] is extracted once per request and carries the session,
//! the resolved identity and the path that was requested. Handlers use it for
//! the authentication gate, login/logout and rendering (which consumes the
//! pending flash).

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, Method, Uri},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::api::Page;
use crate::errors::AppError;
use crate::models::User;
use crate::AppState;

pub const USER_ID_KEY: &str = "user_id";
pub const FLASH_KEY: &str = "flash";
pub const RETURN_TO_KEY: &str = "return_to";

/// Where a login lands when no return-to path was remembered.
pub const DEFAULT_LANDING: &str = "/campgrounds";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashKind {
    Success,
    Error,
}

/// One-shot messages for the next rendered page. At most one of each kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Flash {
    /// Set the message of `kind`, replacing any earlier one.
    pub fn set(&mut self, kind: FlashKind, message: String) {
        match kind {
            FlashKind::Success => self.success = Some(message),
            FlashKind::Error => self.error = Some(message),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.success.is_none() && self.error.is_none()
    }
}

pub async fn push_flash(
    session: &Session,
    kind: FlashKind,
    message: String,
) -> Result<(), tower_sessions::session::Error> {
    let mut flash: Flash = session.get(FLASH_KEY).await?.unwrap_or_default();
    flash.set(kind, message);
    session.insert(FLASH_KEY, flash).await
}

pub async fn take_flash(session: &Session) -> Result<Flash, tower_sessions::session::Error> {
    Ok(session.remove::<Flash>(FLASH_KEY).await?.unwrap_or_default())
}

/// Remember `path` for the next login. Anything but a same-site path is ignored.
pub async fn remember_return_to(
    session: &Session,
    path: &str,
) -> Result<(), tower_sessions::session::Error> {
    if !is_safe_return_path(path) {
        tracing::warn!("Refusing to remember return path {:?}", path);
        return Ok(());
    }
    session.insert(RETURN_TO_KEY, path).await
}

pub fn is_safe_return_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
}

/// The path a login should bring the user back to.
///
/// GET keeps its query string; other methods keep only the path so the
/// method-override query is not replayed as a GET.
pub fn requested_path(method: &Method, uri: &Uri) -> String {
    if method == Method::GET {
        uri.path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string())
    } else {
        uri.path().to_string()
    }
}

pub struct RequestContext {
    session: Session,
    user: Option<User>,
    requested: String,
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer is not installed".to_string()))?;

        let user = match session.get::<String>(USER_ID_KEY).await? {
            Some(id) => {
                let user = state.repo.get_user(&id).await?;
                if user.is_none() {
                    tracing::warn!("Session refers to unknown user {}", id);
                    session.remove::<String>(USER_ID_KEY).await?;
                }
                user
            }
            None => None,
        };

        Ok(Self {
            session,
            user,
            requested: requested_path(&parts.method, &parts.uri),
        })
    }
}

impl RequestContext {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn current_identity(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// The authentication gate: the identity, or a redirect to login that
    /// remembers the requested path.
    pub fn require_user(&self) -> Result<&User, AppError> {
        self.user
            .as_ref()
            .ok_or_else(|| AppError::AuthenticationRequired {
                return_to: self.requested.clone(),
            })
    }

    /// Establish `user` as the session identity. Returns where to redirect:
    /// the remembered return-to path (consumed) or [`DEFAULT_LANDING`].
    pub async fn log_in(&self, user: &User) -> Result<String, AppError> {
        self.session.cycle_id().await?;
        self.session.insert(USER_ID_KEY, &user.id).await?;

        let destination = self
            .session
            .remove::<String>(RETURN_TO_KEY)
            .await?
            .filter(|path| is_safe_return_path(path))
            .unwrap_or_else(|| DEFAULT_LANDING.to_string());

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(destination)
    }

    pub async fn log_out(&self) -> Result<(), AppError> {
        if let Some(user) = &self.user {
            tracing::info!(user_id = %user.id, "User logged out");
        }
        self.session.remove::<String>(USER_ID_KEY).await?;
        self.session.remove::<String>(RETURN_TO_KEY).await?;
        self.session.cycle_id().await?;
        Ok(())
    }

    /// Build a page view model, consuming the pending flash.
    pub async fn render<T: Serialize>(
        &self,
        view: &'static str,
        title: impl Into<String>,
        data: T,
    ) -> Result<Page<T>, AppError> {
        let flash = take_flash(&self.session).await?;
        Ok(Page::new(view, title, data)
            .with_flash(flash)
            .with_user(self.user.clone()))
    }
}

//! Cross-cutting request/response middleware.

use std::any::Any;

use axum::{
    extract::Request,
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use tower_sessions::Session;

use crate::auth::{self, FlashKind};
use crate::errors::{error_page, messages};

/// Session writes requested by a response, applied after the handler ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionEffects {
    pub flash: Option<(FlashKind, String)>,
    pub return_to: Option<String>,
}

impl SessionEffects {
    pub fn flash(kind: FlashKind, message: impl Into<String>) -> Self {
        Self {
            flash: Some((kind, message.into())),
            return_to: None,
        }
    }

    pub fn remember(mut self, return_to: String) -> Self {
        self.return_to = Some(return_to);
        self
    }

    async fn apply(self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        if let Some((kind, message)) = self.flash {
            auth::push_flash(session, kind, message).await?;
        }
        if let Some(path) = self.return_to {
            auth::remember_return_to(session, &path).await?;
        }
        Ok(())
    }
}

/// Centralized responder: writes the [`SessionEffects`] a response carries.
///
/// Must sit inside the session layer so the request carries a [`Session`].
pub async fn apply_session_effects(request: Request, next: Next) -> Response {
    let session = request.extensions().get::<Session>().cloned();
    let mut response = next.run(request).await;

    let Some(effects) = response.extensions_mut().remove::<SessionEffects>() else {
        return response;
    };
    let Some(session) = session else {
        tracing::warn!("Dropping session effects: no session on request");
        return response;
    };

    match effects.apply(&session).await {
        Ok(()) => response,
        Err(err) => {
            tracing::error!("Failed to write session effects: {:?}", err);
            error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                messages::SOMETHING_WENT_WRONG,
            )
        }
    }
}

/// Route `POST ...?_method=PUT|PATCH|DELETE` as the named method.
///
/// HTML forms can only submit GET and POST. Applied before routing.
pub fn method_override<B>(mut request: axum::http::Request<B>) -> axum::http::Request<B> {
    if request.method() == Method::POST {
        if let Some(method) = request.uri().query().and_then(override_from_query) {
            *request.method_mut() = method;
        }
    }
    request
}

fn override_from_query(query: &str) -> Option<Method> {
    let (_, value) = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "_method")?;
    match value.to_ascii_uppercase().as_str() {
        "PUT" => Some(Method::PUT),
        "PATCH" => Some(Method::PATCH),
        "DELETE" => Some(Method::DELETE),
        _ => None,
    }
}

/// Render the 500 page for a panicking handler so the request still completes.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!("Handler panicked: {}", detail);
    error_page(
        StatusCode::INTERNAL_SERVER_ERROR,
        messages::SOMETHING_WENT_WRONG,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn post(uri: &str) -> axum::http::Request<()> {
        axum::http::Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(())
            .unwrap()
    }

    #[rstest]
    #[case("/campgrounds/1?_method=PUT", Method::PUT)]
    #[case("/campgrounds/1?_method=delete", Method::DELETE)]
    #[case("/campgrounds/1?page=2&_method=PATCH", Method::PATCH)]
    #[case("/campgrounds/1?_method=GET", Method::POST)]
    #[case("/campgrounds/1", Method::POST)]
    fn test_method_override(#[case] uri: &str, #[case] expected: Method) {
        assert_eq!(method_override(post(uri)).method(), expected);
    }

    #[test]
    fn test_get_is_never_overridden() {
        let request = axum::http::Request::builder()
            .method(Method::GET)
            .uri("/campgrounds/1?_method=DELETE")
            .body(())
            .unwrap();
        assert_eq!(method_override(request).method(), Method::GET);
    }

    #[test]
    fn test_panic_renders_error_page() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

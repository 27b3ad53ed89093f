//! Data models for the YelpCamp application.
//!
//! Entities mirror the stored documents; `*Form` types carry raw submitted
//! values so a rejected form can be rendered again exactly as typed.

mod campground;
mod review;
mod user;

pub use campground::*;
pub use review::*;
pub use user::*;

use serde::Serialize;

/// Displayable reference to a user (id plus username).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AuthorRef {
    pub id: String,
    pub username: String,
}

impl AuthorRef {
    /// Placeholder for an author id that no longer resolves to a user.
    pub fn unknown(id: String) -> Self {
        Self {
            id,
            username: "[deleted]".to_string(),
        }
    }
}

//! Ownership-based authorization.
//!
//! Only the campground's `author` may change or delete it. A review may be
//! deleted by its own author or by the owner of the campground it sits on.

use crate::models::{Campground, Review, User};

pub fn can_modify(identity: Option<&User>, campground: &Campground) -> bool {
    identity.is_some_and(|user| user.id == campground.author)
}

pub fn can_delete_review(identity: Option<&User>, campground: &Campground, review: &Review) -> bool {
    identity.is_some_and(|user| user.id == review.author || user.id == campground.author)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Geometry;
    use rstest::rstest;

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            username: id.to_string(),
            email: format!("{id}@example.com"),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn campground(author: &str) -> Campground {
        Campground {
            id: "camp".to_string(),
            title: "Title".to_string(),
            price: 10.0,
            description: "Desc".to_string(),
            location: "Somewhere".to_string(),
            geometry: Geometry::point(0.0, 0.0),
            images: Vec::new(),
            author: author.to_string(),
            reviews: vec!["rev".to_string()],
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn review(author: &str) -> Review {
        Review {
            id: "rev".to_string(),
            body: "Nice".to_string(),
            rating: 4,
            author: author.to_string(),
            created_at: String::new(),
        }
    }

    #[rstest]
    #[case(Some("owner"), true)]
    #[case(Some("stranger"), false)]
    #[case(None, false)]
    fn test_can_modify(#[case] identity: Option<&str>, #[case] allowed: bool) {
        let identity = identity.map(user);
        assert_eq!(can_modify(identity.as_ref(), &campground("owner")), allowed);
    }

    #[rstest]
    #[case(Some("reviewer"), true)]
    #[case(Some("owner"), true)]
    #[case(Some("stranger"), false)]
    #[case(None, false)]
    fn test_can_delete_review(#[case] identity: Option<&str>, #[case] allowed: bool) {
        let identity = identity.map(user);
        assert_eq!(
            can_delete_review(identity.as_ref(), &campground("owner"), &review("reviewer")),
            allowed
        );
    }
}

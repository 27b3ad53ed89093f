//! Review model.

use serde::{Deserialize, Serialize};

use super::AuthorRef;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// A rating/comment left on a campground.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub body: String,
    pub rating: i64,
    pub author: String,
    pub created_at: String,
}

/// A review with its author resolved for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDetail {
    pub id: String,
    pub body: String,
    pub rating: i64,
    pub author: AuthorRef,
    pub created_at: String,
}

/// Submitted review form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewForm {
    #[serde(default, alias = "review[body]")]
    pub body: String,
    #[serde(default, alias = "review[rating]")]
    pub rating: String,
}

/// Validated review fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewInput {
    pub body: String,
    pub rating: i64,
}

impl ReviewForm {
    pub fn validate(&self) -> Result<ReviewInput, String> {
        let body = self.body.trim();
        if body.is_empty() {
            return Err("Review text is required".to_string());
        }
        match self.rating.trim().parse::<i64>() {
            Ok(rating) if (MIN_RATING..=MAX_RATING).contains(&rating) => Ok(ReviewInput {
                body: body.to_string(),
                rating,
            }),
            _ => Err(format!(
                "Rating must be a whole number from {MIN_RATING} to {MAX_RATING}"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", true)]
    #[case("5", true)]
    #[case("0", false)]
    #[case("6", false)]
    #[case("3.5", false)]
    #[case("", false)]
    fn test_rating_bounds(#[case] rating: &str, #[case] ok: bool) {
        let form = ReviewForm {
            body: "Lovely creek".to_string(),
            rating: rating.to_string(),
        };
        assert_eq!(form.validate().is_ok(), ok);
    }

    #[test]
    fn test_blank_body_rejected() {
        let form = ReviewForm {
            body: "   ".to_string(),
            rating: "4".to_string(),
        };
        assert!(form.validate().is_err());
    }
}

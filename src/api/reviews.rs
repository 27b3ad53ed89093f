//! Review mutations. Reviews are shown on the campground detail page.

use axum::{
    extract::{rejection::FormRejection, Form, Path, State},
    response::Response,
};

use super::{campground_url, form_input};
use crate::auth::{FlashKind, RequestContext};
use crate::errors::{redirect_with_flash, AppError};
use crate::models::ReviewForm;
use crate::policy;
use crate::AppState;

/// POST /campgrounds/:id/reviews - Add a review by the current user.
pub async fn create_review(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    form: Result<Form<ReviewForm>, FormRejection>,
) -> Result<Response, AppError> {
    let author = ctx.require_user()?;
    let form = form_input(form)?;

    let input = form.validate().map_err(|message| AppError::Rejected {
        redirect_to: campground_url(&id),
        message,
    })?;

    let review = state.repo.create_review(&id, &author.id, &input).await?;

    tracing::info!(campground_id = %id, review_id = %review.id, "Created review");
    Ok(redirect_with_flash(
        &campground_url(&id),
        FlashKind::Success,
        "Created new review!",
    ))
}

/// DELETE /campgrounds/:id/reviews/:review_id - Remove a review.
///
/// Allowed for the review's author and the campground's owner.
pub async fn delete_review(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((id, review_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    ctx.require_user()?;

    let campground = state
        .repo
        .get_campground(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Campground {} not found", id)))?;

    // The review must belong to this campground, or the owner check below
    // would reach reviews of other campgrounds.
    let review = match state.repo.get_review(&review_id).await? {
        Some(review) if campground.reviews.contains(&review.id) => review,
        _ => {
            return Err(AppError::Rejected {
                redirect_to: campground_url(&id),
                message: "Cannot find that review!".to_string(),
            })
        }
    };

    if !policy::can_delete_review(ctx.current_identity(), &campground, &review) {
        tracing::warn!(campground_id = %id, review_id = %review_id, "Rejected review deletion");
        return Err(AppError::AuthorizationDenied {
            redirect_to: campground_url(&id),
        });
    }

    state.repo.delete_review(&id, &review_id).await?;

    tracing::info!(campground_id = %id, review_id = %review_id, "Deleted review");
    Ok(redirect_with_flash(
        &campground_url(&id),
        FlashKind::Success,
        "Successfully deleted review",
    ))
}

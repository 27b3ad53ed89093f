//! Campground pages and mutations.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::PageResult;
use crate::auth::{FlashKind, RequestContext};
use crate::enrich::{EnrichmentError, UploadedFile};
use crate::errors::{redirect_with_flash, AppError};
use crate::models::{Campground, CampgroundDetail, CampgroundForm, ImageRef};
use crate::policy;
use crate::AppState;

pub fn campground_url(id: &str) -> String {
    format!("/campgrounds/{id}")
}

/// Data of the new/edit campground forms.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampgroundFormView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campground_id: Option<String>,
    pub form: CampgroundForm,
    pub images: Vec<ImageRef>,
}

impl CampgroundFormView {
    fn blank() -> Self {
        Self {
            campground_id: None,
            form: CampgroundForm::default(),
            images: Vec::new(),
        }
    }

    fn editing(campground: &Campground, form: CampgroundForm) -> Self {
        Self {
            campground_id: Some(campground.id.clone()),
            form,
            images: campground.images.clone(),
        }
    }
}

/// GET /campgrounds - List all campgrounds.
pub async fn list_campgrounds(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> PageResult<Vec<Campground>> {
    let campgrounds = state.repo.list_campgrounds().await?;
    ctx.render("campgrounds/index", "All Campgrounds", campgrounds)
        .await
}

/// GET /campgrounds/new - Creation form.
pub async fn new_campground_form(ctx: RequestContext) -> PageResult<CampgroundFormView> {
    ctx.require_user()?;
    ctx.render("campgrounds/new", "New Campground", CampgroundFormView::blank())
        .await
}

/// POST /campgrounds - Create a campground from a multipart form.
pub async fn create_campground(
    State(state): State<AppState>,
    ctx: RequestContext,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let author = ctx.require_user()?;
    let (form, files) = read_campground_form(multipart).await?;

    let input = match form.validate() {
        Ok(input) => input,
        Err(message) => {
            let view = CampgroundFormView {
                form,
                ..CampgroundFormView::blank()
            };
            return reject_form(&ctx, "campgrounds/new", "New Campground", view, message).await;
        }
    };

    let new = match state.enricher.enrich(input, files, author).await {
        Ok(new) => new,
        Err(EnrichmentError::LocationNotFound(location)) => {
            let view = CampgroundFormView {
                form,
                ..CampgroundFormView::blank()
            };
            let message = format!(
                "Could not find \"{location}\" on the map. Try a more specific location."
            );
            return reject_form(&ctx, "campgrounds/new", "New Campground", view, message).await;
        }
        Err(err) => return Err(err.into()),
    };

    let campground = match state.repo.create_campground(&new).await {
        Ok(campground) => campground,
        Err(err) => {
            state.enricher.discard_images(&new.images).await;
            return Err(err);
        }
    };

    tracing::info!(campground_id = %campground.id, author = %author.id, "Created campground");
    Ok(redirect_with_flash(
        &campground_url(&campground.id),
        FlashKind::Success,
        "Successfully made a new campground!",
    ))
}

/// GET /campgrounds/:id - Detail view with reviews and authors resolved.
pub async fn show_campground(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> PageResult<CampgroundDetail> {
    let detail = state
        .repo
        .get_campground_detail(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Campground {} not found", id)))?;

    let title = detail.campground.title.clone();
    ctx.render("campgrounds/show", title, detail).await
}

/// GET /campgrounds/:id/edit - Edit form, owner only.
pub async fn edit_campground_form(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> PageResult<CampgroundFormView> {
    let campground = load_owned(&state, &ctx, &id).await?;
    let view = CampgroundFormView::editing(&campground, CampgroundForm::from_campground(&campground));
    ctx.render("campgrounds/edit", format!("Edit {}", campground.title), view)
        .await
}

/// PUT /campgrounds/:id - Overwrite fields and append uploaded images.
///
/// The location is not re-geocoded.
pub async fn update_campground(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let campground = load_owned(&state, &ctx, &id).await?;
    let (form, files) = read_campground_form(multipart).await?;

    let input = match form.validate() {
        Ok(input) => input,
        Err(message) => {
            let title = format!("Edit {}", campground.title);
            let view = CampgroundFormView::editing(&campground, form);
            return reject_form(&ctx, "campgrounds/edit", title, view, message).await;
        }
    };

    let images = state.enricher.store_images(files).await?;
    if let Err(err) = state.repo.update_campground(&id, &input, &images).await {
        state.enricher.discard_images(&images).await;
        return Err(err);
    }

    tracing::info!(campground_id = %id, added_images = images.len(), "Updated campground");
    Ok(redirect_with_flash(
        &campground_url(&id),
        FlashKind::Success,
        "Successfully updated campground!",
    ))
}

/// DELETE /campgrounds/:id - Remove a campground, owner only.
pub async fn delete_campground(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    load_owned(&state, &ctx, &id).await?;
    state.repo.delete_campground(&id).await?;

    tracing::info!(campground_id = %id, "Deleted campground");
    Ok(redirect_with_flash(
        "/campgrounds",
        FlashKind::Success,
        "Successfully deleted campground",
    ))
}

/// Gate, load and authorize: the campground if the caller owns it.
async fn load_owned(state: &AppState, ctx: &RequestContext, id: &str) -> Result<Campground, AppError> {
    ctx.require_user()?;
    let campground = state
        .repo
        .get_campground(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Campground {} not found", id)))?;

    if !policy::can_modify(ctx.current_identity(), &campground) {
        tracing::warn!(campground_id = %id, "Rejected modification by non-owner");
        return Err(AppError::AuthorizationDenied {
            redirect_to: campground_url(id),
        });
    }
    Ok(campground)
}

/// Render the form again with the submitted values and an inline error.
async fn reject_form(
    ctx: &RequestContext,
    view: &'static str,
    title: impl Into<String>,
    data: CampgroundFormView,
    message: String,
) -> Result<Response, AppError> {
    let mut page = ctx.render(view, title, data).await?;
    page.flash.set(FlashKind::Error, message);
    Ok(page.with_status(StatusCode::BAD_REQUEST).into_response())
}

async fn read_campground_form(
    mut multipart: Multipart,
) -> Result<(CampgroundForm, Vec<UploadedFile>), AppError> {
    let mut form = CampgroundForm::default();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                files.push(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            None => form.set_field(&name, field.text().await?),
        }
    }

    Ok((form, files))
}

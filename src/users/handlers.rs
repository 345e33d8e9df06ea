use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::dto::{PageQuery, UserForm, UserPage, UserView};
use super::services;
use super::validation::{validate_user, ValidatedUser};
use crate::error::AppError;
use crate::state::AppState;

// Above the 2 MiB avatar cap so oversize files reach validation.
const BODY_LIMIT: usize = 10 * 1024 * 1024;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", put(update_user))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
}

fn validated(form: UserForm) -> Result<ValidatedUser, AppError> {
    validate_user(form).map_err(|errors| {
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        warn!(?fields, "user payload rejected");
        AppError::Validation(errors)
    })
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Result<Json<UserPage>, AppError> {
    let page = services::list_users(&state, q.page()).await?;
    Ok(Json(page))
}

#[instrument(skip(state, form))]
pub async fn create_user(
    State(state): State<AppState>,
    form: UserForm,
) -> Result<Json<UserView>, AppError> {
    let input = validated(form)?;
    let user = services::create_user(&state, input).await?;
    Ok(Json(user))
}

#[instrument(skip(state, form))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    form: UserForm,
) -> Result<Json<UserView>, AppError> {
    let input = validated(form)?;
    let user = services::update_user(&state, id, input).await?;
    Ok(Json(user))
}

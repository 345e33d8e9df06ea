use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Json,
};

use super::dto::{UploadedFile, UserForm};
use crate::error::AppError;

/// Reads a [`UserForm`] from `multipart/form-data` or `application/json`.
#[async_trait]
impl<S> FromRequest<S> for UserForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let mp = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            read_multipart(mp).await
        } else if content_type.starts_with("application/json") {
            let Json(form) = Json::<UserForm>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            Ok(form)
        } else {
            Err(AppError::UnsupportedMediaType)
        }
    }
}

async fn read_multipart(mut mp: Multipart) -> Result<UserForm, AppError> {
    let mut form = UserForm::default();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "avatar" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let body = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            form.avatar = Some(UploadedFile {
                file_name,
                content_type,
                body,
            });
            continue;
        }

        let slot = match name.as_str() {
            "email" => &mut form.email,
            "password" => &mut form.password,
            "fullname" => &mut form.fullname,
            "gender" => &mut form.gender,
            "role" => &mut form.role,
            "birthday" => &mut form.birthday,
            _ => continue,
        };
        *slot = Some(
            field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?,
        );
    }
    Ok(form)
}

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::{Gender, Role};

time::serde::format_description!(date_ymd, Date, "[year]-[month]-[day]");

/// File part of a multipart body, before validation.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Raw create/update input as it arrives over the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserForm {
    pub email: Option<String>,
    pub password: Option<String>,
    pub fullname: Option<String>,
    pub gender: Option<String>,
    pub role: Option<String>,
    pub birthday: Option<String>,
    #[serde(skip)]
    pub avatar: Option<UploadedFile>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    /// Anything that is not a positive integer reads as page 1.
    pub fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AvatarView {
    pub name: String,
    pub original_name: String,
    pub extname: String,
    pub size: u64,
    pub mime_type: String,
    pub url: String,
}

/// Public projection of a user; never carries the credential.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub fullname: String,
    pub gender: Gender,
    pub role: Role,
    #[serde(with = "date_ymd")]
    pub birthday: Date,
    pub avatar: Option<AvatarView>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub page_total: u64,
    pub data: Vec<UserView>,
}

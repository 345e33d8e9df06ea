use anyhow::Context;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::AppState;
use crate::users::dto::AvatarView;
use crate::users::repo_types::StoredFile;
use crate::users::validation::ValidatedFile;

fn mime_from_ext(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

/// Uploads the file under a fresh key and returns the reference to persist.
pub async fn store_file(
    st: &AppState,
    folder: &str,
    file: ValidatedFile,
) -> anyhow::Result<StoredFile> {
    let key = format!("{}/{}.{}", folder, Uuid::new_v4(), file.extname);
    let mime_type = file
        .content_type
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
        .unwrap_or_else(|| mime_from_ext(&file.extname).to_string());
    let size = file.body.len() as u64;

    st.storage
        .put_object(&key, file.body, &mime_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    debug!(%key, size, "attachment stored");

    Ok(StoredFile {
        name: key,
        original_name: file.original_name,
        extname: file.extname,
        size,
        mime_type,
    })
}

/// Removes a replaced object. Failures are logged, not returned.
pub async fn discard_file(st: &AppState, file: &StoredFile) {
    if let Err(e) = st.storage.delete_object(&file.name).await {
        warn!(error = %e, key = %file.name, "failed to delete replaced attachment");
    }
}

pub async fn render_file(st: &AppState, file: &StoredFile) -> anyhow::Result<AvatarView> {
    let url = st
        .storage
        .presign_get(&file.name, st.config.avatar_url_ttl_secs)
        .await
        .with_context(|| format!("presign url for {}", file.name))?;
    Ok(AvatarView {
        name: file.name.clone(),
        original_name: file.original_name.clone(),
        extname: file.extname.clone(),
        size: file.size,
        mime_type: file.mime_type.clone(),
        url,
    })
}

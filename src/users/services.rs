use sqlx::types::Json;
use tracing::{debug, info};
use uuid::Uuid;

use super::dto::{UserPage, UserView};
use super::password::hash_password;
use super::repo_types::{NewUser, User};
use super::validation::ValidatedUser;
use crate::attachments::{discard_file, render_file, store_file};
use crate::error::AppError;
use crate::state::AppState;

pub const PAGE_SIZE: u64 = 50;
const AVATAR_FOLDER: &str = "avatars";

pub async fn render_user(st: &AppState, user: User) -> Result<UserView, AppError> {
    let avatar = match &user.avatar {
        Some(Json(file)) => Some(render_file(st, file).await?),
        None => None,
    };
    Ok(UserView {
        id: user.id,
        email: user.email,
        fullname: user.fullname,
        gender: user.gender,
        role: user.role,
        birthday: user.birthday,
        avatar,
        created_at: user.created_at,
        updated_at: user.updated_at,
    })
}

/// One page of users; out-of-range pages come back empty.
pub async fn list_users(st: &AppState, page: u32) -> Result<UserPage, AppError> {
    let page = u64::from(page.max(1));
    let total = st.users.count().await?;
    let rows = st.users.list((page - 1) * PAGE_SIZE, PAGE_SIZE).await?;
    debug!(page, total, returned = rows.len(), "users listed");

    let mut data = Vec::with_capacity(rows.len());
    for user in rows {
        data.push(render_user(st, user).await?);
    }
    Ok(UserPage {
        page_total: total.div_ceil(PAGE_SIZE),
        data,
    })
}

/// Creates an account. Without a password the email becomes the credential.
pub async fn create_user(st: &AppState, input: ValidatedUser) -> Result<UserView, AppError> {
    let credential = input.password.as_deref().unwrap_or(input.email.as_str());
    let password_hash = hash_password(credential)?;

    let avatar = match input.avatar {
        Some(file) => Some(store_file(st, AVATAR_FOLDER, file).await?),
        None => None,
    };

    let user = st
        .users
        .create(NewUser {
            email: input.email,
            password_hash,
            fullname: input.fullname,
            gender: input.gender,
            role: input.role,
            birthday: input.birthday,
            avatar,
        })
        .await?;

    info!(user_id = %user.id, role = ?user.role, "user created");
    render_user(st, user).await
}

/// Overwrites profile fields; password and avatar change only when supplied.
pub async fn update_user(
    st: &AppState,
    id: Uuid,
    input: ValidatedUser,
) -> Result<UserView, AppError> {
    let mut user = st
        .users
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound(id))?;

    user.email = input.email;
    user.fullname = input.fullname;
    user.gender = input.gender;
    user.role = input.role;
    user.birthday = input.birthday;

    if let Some(password) = input.password.as_deref() {
        user.password_hash = hash_password(password)?;
    }

    let replaced = match input.avatar {
        Some(file) => {
            let stored = store_file(st, AVATAR_FOLDER, file).await?;
            user.avatar.replace(Json(stored))
        }
        None => None,
    };

    let saved = st
        .users
        .update(&user)
        .await?
        .ok_or(AppError::NotFound(id))?;

    if let Some(Json(old)) = replaced {
        discard_file(st, &old).await;
    }

    info!(user_id = %saved.id, "user updated");
    render_user(st, saved).await
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use time::macros::date;

    use super::*;
    use crate::users::password::verify_password;
    use crate::users::repo_types::{Gender, Role};
    use crate::users::validation::ValidatedFile;

    fn input(email: &str) -> ValidatedUser {
        ValidatedUser {
            email: email.into(),
            password: None,
            fullname: "A B".into(),
            gender: Gender::Male,
            role: Role::Student,
            birthday: date!(2000 - 01 - 01),
            avatar: None,
        }
    }

    fn png(name: &str) -> ValidatedFile {
        ValidatedFile {
            original_name: name.into(),
            extname: "png".into(),
            content_type: Some("image/png".into()),
            body: Bytes::from_static(b"\x89PNG\r\n"),
        }
    }

    async fn stored(st: &AppState, id: Uuid) -> User {
        st.users.find_by_id(id).await.unwrap().expect("user exists")
    }

    #[tokio::test]
    async fn create_defaults_credential_to_email() {
        let st = AppState::fake();
        let view = create_user(&st, input("a@b.com")).await.unwrap();

        let user = stored(&st, view.id).await;
        assert_eq!(user.email, "a@b.com");
        assert_eq!(user.fullname, "A B");
        assert_eq!(user.gender, Gender::Male);
        assert_eq!(user.role, Role::Student);
        assert_eq!(user.birthday, date!(2000 - 01 - 01));
        assert!(user.avatar.is_none());
        assert!(verify_password("a@b.com", &user.password_hash).unwrap());

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn create_uses_supplied_password_and_avatar() {
        let (st, storage) = AppState::fake_with_storage();
        let mut payload = input("t@school.edu");
        payload.password = Some("hunter22".into());
        payload.avatar = Some(png("face.png"));

        let view = create_user(&st, payload).await.unwrap();
        let user = stored(&st, view.id).await;
        assert!(verify_password("hunter22", &user.password_hash).unwrap());
        assert!(!verify_password("t@school.edu", &user.password_hash).unwrap());

        let avatar = view.avatar.expect("avatar rendered");
        assert_eq!(avatar.original_name, "face.png");
        assert_eq!(avatar.url, format!("https://fake.local/{}", avatar.name));
        assert!(storage.get(&avatar.name).is_some());
    }

    #[tokio::test]
    async fn create_with_taken_email_conflicts() {
        let st = AppState::fake();
        create_user(&st, input("dup@b.com")).await.unwrap();
        let err = create_user(&st, input("dup@b.com")).await.unwrap_err();
        assert!(matches!(err, AppError::EmailTaken));
        assert_eq!(st.users.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_changes_password_only_when_supplied() {
        let st = AppState::fake();
        let id = create_user(&st, input("a@b.com")).await.unwrap().id;

        let mut first = input("a@b.com");
        first.password = Some("new-secret".into());
        update_user(&st, id, first).await.unwrap();
        let hash_after_first = stored(&st, id).await.password_hash;
        assert!(verify_password("new-secret", &hash_after_first).unwrap());

        let mut second = input("renamed@b.com");
        second.fullname = "Renamed".into();
        second.role = Role::Teacher;
        let view = update_user(&st, id, second).await.unwrap();
        assert_eq!(view.email, "renamed@b.com");
        assert_eq!(view.fullname, "Renamed");
        assert_eq!(view.role, Role::Teacher);

        let user = stored(&st, id).await;
        assert_eq!(user.password_hash, hash_after_first);
        assert!(verify_password("new-secret", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn update_keeps_or_replaces_avatar() {
        let (st, storage) = AppState::fake_with_storage();
        let mut payload = input("pic@b.com");
        payload.avatar = Some(png("old.png"));
        let created = create_user(&st, payload).await.unwrap();
        let old_key = created.avatar.unwrap().name;

        let kept = update_user(&st, created.id, input("pic@b.com")).await.unwrap();
        assert_eq!(kept.avatar.as_ref().map(|a| a.name.as_str()), Some(old_key.as_str()));
        assert!(storage.get(&old_key).is_some());

        let mut replace = input("pic@b.com");
        replace.avatar = Some(png("new.png"));
        let replaced = update_user(&st, created.id, replace).await.unwrap();
        let new_avatar = replaced.avatar.unwrap();
        assert_ne!(new_avatar.name, old_key);
        assert_eq!(new_avatar.original_name, "new.png");
        assert!(storage.get(&old_key).is_none());
        assert!(storage.get(&new_avatar.name).is_some());
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found_and_writes_nothing() {
        let (st, storage) = AppState::fake_with_storage();
        let id = Uuid::new_v4();
        let mut payload = input("a@b.com");
        payload.avatar = Some(png("x.png"));

        let err = update_user(&st, id, payload).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(missing) if missing == id));
        assert_eq!(st.users.count().await.unwrap(), 0);
        assert_eq!(storage.len(), 0);
    }

    #[tokio::test]
    async fn update_to_taken_email_keeps_row_but_not_the_upload() {
        let (st, storage) = AppState::fake_with_storage();
        create_user(&st, input("first@b.com")).await.unwrap();
        let second = create_user(&st, input("second@b.com")).await.unwrap();

        let mut payload = input("first@b.com");
        payload.avatar = Some(png("late.png"));
        let err = update_user(&st, second.id, payload).await.unwrap_err();
        assert!(matches!(err, AppError::EmailTaken));

        let user = stored(&st, second.id).await;
        assert_eq!(user.email, "second@b.com");
        assert!(user.avatar.is_none());
        // The object is uploaded before the write and is not rolled back.
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn list_on_empty_store() {
        let st = AppState::fake();
        let page = list_users(&st, 1).await.unwrap();
        assert_eq!(page.page_total, 0);
        assert!(page.data.is_empty());
    }

    #[tokio::test]
    async fn pages_partition_the_whole_set() {
        let st = AppState::fake();
        let mut ids = Vec::new();
        for i in 0..120 {
            let user = st
                .users
                .create(NewUser {
                    email: format!("user{i}@school.edu"),
                    password_hash: "x".into(),
                    fullname: format!("User {i}"),
                    gender: Gender::Female,
                    role: Role::Student,
                    birthday: date!(2001 - 02 - 03),
                    avatar: None,
                })
                .await
                .unwrap();
            ids.push(user.id);
        }

        let mut seen = Vec::new();
        for p in 1..=3 {
            let page = list_users(&st, p).await.unwrap();
            assert_eq!(page.page_total, 3);
            assert!(page.data.len() as u64 <= PAGE_SIZE);
            seen.extend(page.data.into_iter().map(|u| u.id));
        }
        assert_eq!(seen, ids);

        let beyond = list_users(&st, 4).await.unwrap();
        assert_eq!(beyond.page_total, 3);
        assert!(beyond.data.is_empty());
    }
}

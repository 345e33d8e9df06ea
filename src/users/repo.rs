use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo_types::{NewUser, User};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("email already in use")]
    DuplicateEmail,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::DuplicateEmail,
            _ => RepoError::Store(e.into()),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence port for user accounts.
///
/// `list` returns rows in insertion order (`created_at`, then `id`).
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn create(&self, new: NewUser) -> RepoResult<User>;
    /// Writes every mutable column of `user`. `None` if the row no longer exists.
    async fn update(&self, user: &User) -> RepoResult<Option<User>>;
    async fn count(&self) -> RepoResult<u64>;
    async fn list(&self, offset: u64, limit: u64) -> RepoResult<Vec<User>>;
}

const USER_COLUMNS: &str =
    "id, email, password_hash, fullname, gender, role, birthday, avatar, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> RepoResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, fullname, gender, role, birthday, avatar)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.fullname)
        .bind(new.gender)
        .bind(new.role)
        .bind(new.birthday)
        .bind(new.avatar.map(Json))
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update(&self, user: &User) -> RepoResult<Option<User>> {
        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET email = $2, password_hash = $3, fullname = $4, gender = $5,
                   role = $6, birthday = $7, avatar = $8, updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.fullname)
        .bind(user.gender)
        .bind(user.role)
        .bind(user.birthday)
        .bind(user.avatar.as_ref())
        .fetch_optional(&self.db)
        .await?;
        Ok(updated)
    }

    async fn count(&self) -> RepoResult<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        Ok(n as u64)
    }

    async fn list(&self, offset: u64, limit: u64) -> RepoResult<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM users
             ORDER BY created_at ASC, id ASC
             LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

/// Insertion-ordered store kept in process memory.
#[derive(Default)]
pub struct InMemoryUserRepository {
    rows: RwLock<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.rows.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, new: NewUser) -> RepoResult<User> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|u| u.email == new.email) {
            return Err(RepoError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            fullname: new.fullname,
            gender: new.gender,
            role: new.role,
            birthday: new.birthday,
            avatar: new.avatar.map(Json),
            created_at: now,
            updated_at: now,
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> RepoResult<Option<User>> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|u| u.id != user.id && u.email == user.email) {
            return Err(RepoError::DuplicateEmail);
        }
        let Some(row) = rows.iter_mut().find(|u| u.id == user.id) else {
            return Ok(None);
        };
        *row = User {
            created_at: row.created_at,
            updated_at: OffsetDateTime::now_utc(),
            ..user.clone()
        };
        Ok(Some(row.clone()))
    }

    async fn count(&self) -> RepoResult<u64> {
        Ok(self.rows.read().await.len() as u64)
    }

    async fn list(&self, offset: u64, limit: u64) -> RepoResult<Vec<User>> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::{Gender, Role};
    use time::macros::date;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password_hash: "hash".into(),
            fullname: "Test User".into(),
            gender: Gender::Female,
            role: Role::Teacher,
            birthday: date!(1990 - 05 - 17),
            avatar: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_lists_in_insertion_order() {
        let repo = InMemoryUserRepository::new();
        let a = repo.create(new_user("a@x.io")).await.unwrap();
        let b = repo.create(new_user("b@x.io")).await.unwrap();
        let c = repo.create(new_user("c@x.io")).await.unwrap();
        assert_ne!(a.id, b.id);

        assert_eq!(repo.count().await.unwrap(), 3);
        let page: Vec<Uuid> = repo.list(1, 5).await.unwrap().iter().map(|u| u.id).collect();
        assert_eq!(page, vec![b.id, c.id]);
        assert!(repo.list(3, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let repo = InMemoryUserRepository::new();
        repo.create(new_user("dup@x.io")).await.unwrap();
        let err = repo.create(new_user("dup@x.io")).await.unwrap_err();
        assert!(matches!(err, RepoError::DuplicateEmail));

        let mut other = repo.create(new_user("other@x.io")).await.unwrap();
        other.email = "dup@x.io".into();
        let err = repo.update(&other).await.unwrap_err();
        assert!(matches!(err, RepoError::DuplicateEmail));
    }

    #[tokio::test]
    async fn update_overwrites_and_keeps_created_at() {
        let repo = InMemoryUserRepository::new();
        let mut user = repo.create(new_user("u@x.io")).await.unwrap();
        let created_at = user.created_at;
        user.fullname = "Renamed".into();
        user.role = Role::Administrator;

        let saved = repo.update(&user).await.unwrap().expect("row exists");
        assert_eq!(saved.fullname, "Renamed");
        assert_eq!(saved.role, Role::Administrator);
        assert_eq!(saved.created_at, created_at);

        let loaded = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(loaded.fullname, "Renamed");
    }

    #[tokio::test]
    async fn update_missing_row_returns_none() {
        let repo = InMemoryUserRepository::new();
        let mut ghost = repo.create(new_user("ghost@x.io")).await.unwrap();
        ghost.id = Uuid::new_v4();
        assert!(repo.update(&ghost).await.unwrap().is_none());
        assert!(repo.find_by_id(ghost.id).await.unwrap().is_none());
    }
}

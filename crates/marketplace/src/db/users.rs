//! User repository for database operations.
//!
//! Emails are matched case-insensitively (`lower(email)`), mirroring the
//! unique index on the table.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument};

use raredoor_core::{Email, UserId, Username};

use super::{RepositoryError, conflict_on_unique};
use crate::models::User;

const USER_COLUMNS: &str = "id, email, username, first_name, last_name, is_active, is_staff, \
                            date_joined, last_login";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    username: String,
    first_name: String,
    last_name: String,
    is_active: bool,
    is_staff: bool,
    date_joined: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| RepositoryError::corrupt("email", e))?;
        let username = Username::from_email(&email);
        if username.as_str() != row.username {
            return Err(RepositoryError::DataCorruption(format!(
                "username for user {} does not match its email",
                row.id
            )));
        }
        Ok(Self {
            id: row.id,
            email,
            username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_active: row.is_active,
            is_staff: row.is_staff,
            date_joined: row.date_joined,
            last_login: row.last_login,
        })
    }
}

/// Fields for a new user.
#[derive(Debug, Clone, Default)]
pub struct NewUser<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    /// Argon2 PHC string; `None` creates a user that cannot log in with a
    /// password.
    pub password_hash: Option<&'a str>,
    pub is_staff: bool,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their email address, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM marketplace.user WHERE lower(email) = $1"
        ))
        .bind(email.normalized())
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM marketplace.user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists in any case.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, email: &Email, new: &NewUser<'_>) -> Result<User, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        create_user(&mut conn, email, new).await
    }

    /// Get a user and their password hash by email.
    ///
    /// Returns `None` if the user doesn't exist or has no password set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            user: UserRow,
            password_hash: Option<String>,
        }

        let row = sqlx::query_as::<_, Row>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM marketplace.user WHERE lower(email) = $1"
        ))
        .bind(email.normalized())
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Some(password_hash) = row.password_hash else {
            return Ok(None);
        };

        Ok(Some((User::try_from(row.user)?, password_hash)))
    }

    /// Replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn set_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE marketplace.user SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Stamp a successful login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE marketplace.user SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(self.pool)
            .await?;

        debug!(user_id = %id, "Recorded login");
        Ok(())
    }

    /// Activate or deactivate an account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn set_active(&self, id: UserId, is_active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE marketplace.user SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        info!(user_id = %id, is_active, "Updated account status");
        Ok(())
    }
}

/// Insert a user on an existing connection (used inside transactions).
#[instrument(skip(conn, new), fields(email = %email))]
pub(crate) async fn create_user(
    conn: &mut PgConnection,
    email: &Email,
    new: &NewUser<'_>,
) -> Result<User, RepositoryError> {
    let username = Username::from_email(email);

    let row = sqlx::query_as::<_, UserRow>(&format!(
        r"
        INSERT INTO marketplace.user
            (id, email, username, first_name, last_name, password_hash, is_staff)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {USER_COLUMNS}
        "
    ))
    .bind(UserId::generate())
    .bind(email.as_str())
    .bind(username.as_str())
    .bind(new.first_name)
    .bind(new.last_name)
    .bind(new.password_hash)
    .bind(new.is_staff)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| conflict_on_unique(e, "email"))?;

    let user = User::try_from(row)?;
    info!(user_id = %user.id, "Created user");
    Ok(user)
}

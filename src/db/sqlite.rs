use crate::db::models::{DbContact, DbUser, NewContact, NewUser};
use crate::db::schema::SQLITE_INIT;
use crate::error::HeavenError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use tracing::info;

pub type SqlitePool = Pool<Sqlite>;

const USER_COLUMNS: &str = "id, name, email, password_hash, google_id, is_verified, \
     otp, otp_expiry, reset_expiry, created_at";

/// Open a pool for `database_url`, creating the file when missing.
///
/// An in-memory database lives only as long as its connection, so it gets a
/// single connection that is never recycled.
pub async fn connect(database_url: &str) -> Result<SqlitePool, HeavenError> {
    let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let mut pool_opts = SqlitePoolOptions::new();
    if database_url.contains(":memory:") {
        pool_opts = pool_opts
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }
    let pool = pool_opts.connect_with(connect_opts).await?;
    info!(database_url = %database_url, "database pool ready");
    Ok(pool)
}

#[derive(Clone)]
pub struct HeavenStorage {
    pool: SqlitePool,
}

impl HeavenStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), HeavenError> {
        // sqlx::query runs one statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        // databases created before the OTP guess counter existed
        let (has_attempts,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM pragma_table_info('users') WHERE name = 'otp_attempts'",
        )
        .fetch_one(&self.pool)
        .await?;
        if has_attempts == 0 {
            sqlx::query("ALTER TABLE users ADD COLUMN otp_attempts INTEGER NOT NULL DEFAULT 0")
                .execute(&self.pool)
                .await?;
            info!("added users.otp_attempts column");
        }
        Ok(())
    }

    /// Insert a user. A taken email (or Google id) maps to `UserExists`.
    pub async fn create_user(&self, user: NewUser) -> Result<DbUser, HeavenError> {
        let created_at = Utc::now();
        let verified_i = if user.is_verified { 1 } else { 0 };
        let rec: Result<(i64,), sqlx::Error> = sqlx::query_as(
            r#"INSERT INTO users (name, email, password_hash, google_id, is_verified, created_at)
               VALUES (?, ?, ?, ?, ?, ?)
               RETURNING id"#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.google_id)
        .bind(verified_i)
        .bind(created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await;

        let id = match rec {
            Ok((id,)) => id,
            Err(e) if is_unique_violation(&e) => return Err(HeavenError::UserExists),
            Err(e) => return Err(e.into()),
        };
        self.get_user(id).await?.ok_or(HeavenError::UserNotFound)
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<DbUser>, HeavenError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_user).transpose()
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<DbUser>, HeavenError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_user).transpose()
    }

    pub async fn find_user_by_google_id(
        &self,
        google_id: &str,
    ) -> Result<Option<DbUser>, HeavenError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE google_id = ?"
        ))
        .bind(google_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_user).transpose()
    }

    /// Replace the pending OTP; any previous code stops working.
    pub async fn set_otp(
        &self,
        id: i64,
        otp: &str,
        expiry: DateTime<Utc>,
    ) -> Result<(), HeavenError> {
        sqlx::query("UPDATE users SET otp = ?, otp_expiry = ?, otp_attempts = 0 WHERE id = ?")
            .bind(otp)
            .bind(expiry.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_verified(&self, id: i64) -> Result<(), HeavenError> {
        sqlx::query(
            "UPDATE users SET is_verified = 1, otp = NULL, otp_expiry = NULL, otp_attempts = 0 \
             WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Consume the reset OTP and allow one password change until `until`.
    pub async fn open_reset_window(
        &self,
        id: i64,
        until: DateTime<Utc>,
    ) -> Result<(), HeavenError> {
        sqlx::query(
            "UPDATE users SET otp = NULL, otp_expiry = NULL, otp_attempts = 0, reset_expiry = ? \
             WHERE id = ?",
        )
        .bind(until.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Count a wrong guess against the pending OTP and return the new total.
    /// Reaching `max_attempts` discards the code so only a fresh one works.
    pub async fn record_otp_failure(
        &self,
        id: i64,
        max_attempts: u32,
    ) -> Result<u32, HeavenError> {
        let (attempts,): (i64,) = sqlx::query_as(
            r#"UPDATE users SET
                otp_attempts = otp_attempts + 1,
                otp = CASE WHEN otp_attempts + 1 >= ? THEN NULL ELSE otp END,
                otp_expiry = CASE WHEN otp_attempts + 1 >= ? THEN NULL ELSE otp_expiry END
              WHERE id = ?
              RETURNING otp_attempts"#,
        )
        .bind(i64::from(max_attempts))
        .bind(i64::from(max_attempts))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(HeavenError::UserNotFound)?;
        Ok(u32::try_from(attempts).unwrap_or(u32::MAX))
    }

    /// Store a new password hash; closes the reset window and marks the
    /// address verified since the reset code proved ownership.
    pub async fn reset_password(&self, id: i64, password_hash: &str) -> Result<(), HeavenError> {
        sqlx::query(
            r#"UPDATE users SET
                password_hash = ?,
                is_verified = 1,
                reset_expiry = NULL
              WHERE id = ?"#,
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn link_google(&self, id: i64, google_id: &str) -> Result<(), HeavenError> {
        sqlx::query("UPDATE users SET google_id = ?, is_verified = 1 WHERE id = ?")
            .bind(google_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_contact(
        &self,
        user_id: i64,
        contact: NewContact,
    ) -> Result<DbContact, HeavenError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"INSERT INTO emergency_contacts (user_id, name, email, phone, relation)
               VALUES (?, ?, ?, ?, ?)
               RETURNING id"#,
        )
        .bind(user_id)
        .bind(&contact.name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(&contact.relation)
        .fetch_one(&self.pool)
        .await?;

        Ok(DbContact {
            id,
            user_id,
            name: contact.name,
            email: contact.email,
            phone: contact.phone,
            relation: contact.relation,
        })
    }

    pub async fn list_contacts(&self, user_id: i64) -> Result<Vec<DbContact>, HeavenError> {
        let rows = sqlx::query(
            r#"SELECT id, user_id, name, email, phone, relation
               FROM emergency_contacts WHERE user_id = ? ORDER BY id"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_contact).collect()
    }

    /// Fetch a contact only when `user_id` owns it.
    pub async fn get_contact(
        &self,
        user_id: i64,
        id: i64,
    ) -> Result<Option<DbContact>, HeavenError> {
        let row = sqlx::query(
            r#"SELECT id, user_id, name, email, phone, relation
               FROM emergency_contacts WHERE id = ? AND user_id = ?"#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_contact).transpose()
    }

    /// Replace every editable field. `None` when the contact is not owned.
    pub async fn update_contact(
        &self,
        user_id: i64,
        id: i64,
        contact: NewContact,
    ) -> Result<Option<DbContact>, HeavenError> {
        let result = sqlx::query(
            r#"UPDATE emergency_contacts SET
                name = ?,
                email = ?,
                phone = ?,
                relation = ?
              WHERE id = ? AND user_id = ?"#,
        )
        .bind(&contact.name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(&contact.relation)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(DbContact {
            id,
            user_id,
            name: contact.name,
            email: contact.email,
            phone: contact.phone,
            relation: contact.relation,
        }))
    }

    /// Returns whether a row owned by `user_id` was removed.
    pub async fn delete_contact(&self, user_id: i64, id: i64) -> Result<bool, HeavenError> {
        let result = sqlx::query("DELETE FROM emergency_contacts WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_user(row: SqliteRow) -> Result<DbUser, HeavenError> {
        let verified_i: i64 = row.try_get("is_verified")?;
        let otp_expiry: Option<String> = row.try_get("otp_expiry")?;
        let reset_expiry: Option<String> = row.try_get("reset_expiry")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(DbUser {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            google_id: row.try_get("google_id")?,
            is_verified: verified_i != 0,
            otp: row.try_get("otp")?,
            otp_expiry: otp_expiry.as_deref().map(parse_timestamp).transpose()?,
            reset_expiry: reset_expiry.as_deref().map(parse_timestamp).transpose()?,
            created_at: parse_timestamp(&created_at)?,
        })
    }

    fn row_to_contact(row: SqliteRow) -> Result<DbContact, HeavenError> {
        Ok(DbContact {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            relation: row.try_get("relation")?,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

/// Admin user lookup and provisioning
use crate::{
    admin::{AdminUser, Role},
    error::{AppError, AppResult},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

/// Read access to admin identities, plus out-of-band provisioning
#[derive(Clone)]
pub struct AdminDirectory {
    db: SqlitePool,
}

impl AdminDirectory {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Hash a password using Argon2id
    pub fn hash_password(password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against a stored hash
    pub fn verify_password(password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Create a new admin. Used by startup bootstrap and operator tooling,
    /// never by the request pipeline.
    pub async fn provision(
        &self,
        email: &str,
        name: &str,
        role: Role,
        password: &str,
    ) -> AppResult<AdminUser> {
        let email = normalize_email(email);
        if !email.contains('@') {
            return Err(AppError::Validation(format!("Invalid email: {}", email)));
        }
        if name.trim().is_empty() {
            return Err(AppError::Validation("Name cannot be empty".to_string()));
        }

        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM admin_users WHERE email = ?1")
                .bind(&email)
                .fetch_optional(&self.db)
                .await?;
        if existing.is_some() {
            return Err(AppError::Conflict(format!("Admin {} already exists", email)));
        }

        let password_hash = Self::hash_password(password)?;
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO admin_users (id, email, name, role, active, password_hash, created_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)
            "#,
        )
        .bind(&id)
        .bind(&email)
        .bind(name.trim())
        .bind(role.as_str())
        .bind(&password_hash)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        tracing::info!(admin_id = %id, email = %email, role = %role, "Provisioned admin");

        Ok(AdminUser {
            id,
            email,
            name: name.trim().to_string(),
            role,
            active: true,
        })
    }

    /// Get an admin by id, active or not
    pub async fn get_admin(&self, id: &str) -> AppResult<Option<AdminUser>> {
        let row = sqlx::query("SELECT id, email, name, role, active FROM admin_users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(row_to_admin).transpose()
    }

    /// Check an email/password pair.
    ///
    /// Returns `None` for unknown emails, wrong passwords and inactive admins alike.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<Option<AdminUser>> {
        let row = sqlx::query(
            "SELECT id, email, name, role, active, password_hash FROM admin_users WHERE email = ?1",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let password_hash: String = row.get("password_hash");
        if !Self::verify_password(password, &password_hash) {
            return Ok(None);
        }

        let admin = row_to_admin(&row)?;
        if !admin.active {
            tracing::warn!(admin_id = %admin.id, "Login attempt for inactive admin");
            return Ok(None);
        }

        Ok(Some(admin))
    }

    /// Number of provisioned admins
    pub async fn count(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM admin_users")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn row_to_admin(row: &SqliteRow) -> AppResult<AdminUser> {
    let role_str: String = row.get("role");
    Ok(AdminUser {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        role: role_str.parse()?,
        active: row.get("active"),
    })
}

//! Bearer token identity provider backed by the `api_tokens` table.
//!
//! Tokens are shown once at issue time; only their SHA-256 hash is stored.

use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::Row;
use tracing::debug;
use workdesk_core::repository::identity::IdentityProvider;
use workdesk_types::error::RepositoryError;
use workdesk_types::identity::{Caller, Role};

use super::pool::{DatabasePool, now, query_error};

const TOKEN_PREFIX: &str = "wd_";

/// A freshly issued token. `token` is the only copy of the plaintext.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub id: i64,
    pub token: String,
    pub caller: Caller,
}

pub struct SqliteIdentityProvider {
    pool: DatabasePool,
}

impl SqliteIdentityProvider {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Generate a token for `user_id` and store its hash.
    pub async fn issue(
        &self,
        user_id: i64,
        role: Role,
        label: Option<&str>,
    ) -> Result<IssuedToken, RepositoryError> {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = format!(
            "{TOKEN_PREFIX}{}",
            bytes.iter().map(|b| format!("{b:02x}")).collect::<String>()
        );

        let result = sqlx::query(
            "INSERT INTO api_tokens (token_hash, user_id, role, label, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(hash_token(&token))
        .bind(user_id)
        .bind(role.to_string())
        .bind(label)
        .bind(now())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(IssuedToken {
            id: result.last_insert_rowid(),
            token,
            caller: Caller { user_id, role },
        })
    }

    /// Delete a token by id. Returns whether a row was removed.
    pub async fn revoke(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM api_tokens WHERE id = ?")
            .bind(id)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected() > 0)
    }
}

/// SHA-256 of a token (lowercase hex).
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

impl IdentityProvider for SqliteIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Option<Caller>, RepositoryError> {
        if !token.starts_with(TOKEN_PREFIX) {
            return Ok(None);
        }

        let row = sqlx::query("SELECT id, user_id, role FROM api_tokens WHERE token_hash = ?")
            .bind(hash_token(token))
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;
        let Some(row) = row else {
            return Ok(None);
        };

        let id: i64 = row.try_get("id").map_err(query_error)?;
        let user_id: i64 = row.try_get("user_id").map_err(query_error)?;
        let role: String = row.try_get("role").map_err(query_error)?;
        let role: Role = role.parse().map_err(|e: String| RepositoryError::Query(e))?;

        // Best effort; the writer may be held by a long attachment write.
        let writer = self.pool.writer.clone();
        tokio::spawn(async move {
            if let Err(e) = sqlx::query("UPDATE api_tokens SET last_used_at = ? WHERE id = ?")
                .bind(now())
                .bind(id)
                .execute(&writer)
                .await
            {
                debug!(token_id = id, error = %e, "failed to record token use");
            }
        });

        Ok(Some(Caller { user_id, role }))
    }
}

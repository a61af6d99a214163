use rusqlite::{Connection, params};

use crate::Database;
use crate::error::{constraint_message, not_found_on_no_rows};
use crate::models::UserRow;
use crate::{StoreError, StoreResult};

impl Database {
    /// First half of the registration saga: the user row and its activation
    /// token digest land in one transaction, so no partial identity can
    /// survive a failure between the two inserts.
    pub fn create_user_with_invitation(
        &self,
        user: &UserRow,
        token_hash: &str,
        expires_at: &str,
    ) -> StoreResult<()> {
        self.with_tx(|tx| {
            insert_user(tx, user)?;
            tx.execute(
                "INSERT INTO activation_tokens (token_hash, user_id, expires_at)
                 VALUES (?1, ?2, ?3)",
                params![token_hash, user.id, expires_at],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> StoreResult<UserRow> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, email, password, is_active, created_at
                 FROM users
                 WHERE id = ?1",
                [id],
                user_from_row,
            )
            .map_err(not_found_on_no_rows)
        })
    }

    /// Redeem an activation token. Wrong and expired tokens are deliberately
    /// indistinguishable: both are a plain not-found. On success every token
    /// for that user is consumed, so nothing is replayable afterwards.
    pub fn activate_user(&self, token_hash: &str, now: &str) -> StoreResult<()> {
        self.with_tx(|tx| {
            let user_id: String = tx
                .query_row(
                    "SELECT u.id
                     FROM users u
                     JOIN activation_tokens t ON t.user_id = u.id
                     WHERE t.token_hash = ?1 AND t.expires_at > ?2 AND u.is_active = 0",
                    params![token_hash, now],
                    |row| row.get(0),
                )
                .map_err(not_found_on_no_rows)?;

            tx.execute("UPDATE users SET is_active = 1 WHERE id = ?1", [&user_id])?;
            tx.execute(
                "DELETE FROM activation_tokens WHERE user_id = ?1",
                [&user_id],
            )?;
            Ok(())
        })
    }

    /// Compensating delete for the registration saga: removes the identity
    /// and, in the same transaction, every token issued to it.
    pub fn delete_user(&self, id: &str) -> StoreResult<()> {
        self.with_tx(|tx| {
            tx.execute("DELETE FROM activation_tokens WHERE user_id = ?1", [id])?;
            let rows = tx.execute("DELETE FROM users WHERE id = ?1", [id])?;
            if rows == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }
}

fn insert_user(conn: &Connection, user: &UserRow) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO users (id, username, email, password, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id,
            user.username,
            user.email,
            user.password,
            user.is_active,
            user.created_at
        ],
    )
    .map_err(map_user_insert_err)?;
    Ok(())
}

/// The caller must be able to tell which column collided.
fn map_user_insert_err(err: rusqlite::Error) -> StoreError {
    match constraint_message(&err) {
        Some(msg) if msg.contains("users.email") => StoreError::DuplicateEmail,
        Some(msg) if msg.contains("users.username") => StoreError::DuplicateUsername,
        Some(_) => StoreError::Conflict,
        None => StoreError::Storage(err),
    }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

//! Account record operations.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};

use super::Database;
use super::models::{Account, format_timestamp};
use crate::error::{DatabaseError, ServiceResult};

const ACCOUNT_COLUMNS: &str =
    "id, email, credential_hash, name, surname, reset_token, reset_token_expires, created_at";

impl Database {
    /// Insert a new account
    pub fn insert_account(&self, account: &Account) -> ServiceResult<()> {
        let conn = self.conn();

        conn.execute(
            r#"
            INSERT INTO accounts (id, email, credential_hash, name, surname, reset_token, reset_token_expires, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                account.id,
                account.email,
                account.credential_hash,
                account.name,
                account.surname,
                account.reset_token,
                account.reset_token_expires.as_ref().map(format_timestamp),
                format_timestamp(&account.created_at),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Get an account by ID
    pub fn get_account(&self, id: &str) -> ServiceResult<Option<Account>> {
        let conn = self.conn();

        conn.query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
            params![id],
            Account::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Get an account by email address
    pub fn find_account_by_email(&self, email: &str) -> ServiceResult<Option<Account>> {
        let conn = self.conn();

        conn.query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?1"),
            params![email],
            Account::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Update the optional profile fields
    pub fn update_account_profile(
        &self,
        id: &str,
        name: Option<&str>,
        surname: Option<&str>,
    ) -> ServiceResult<bool> {
        let conn = self.conn();

        let rows = conn
            .execute(
                "UPDATE accounts SET name = ?1, surname = ?2 WHERE id = ?3",
                params![name, surname, id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Store a password-reset challenge, replacing any earlier one
    pub fn set_reset_challenge(
        &self,
        id: &str,
        token: &str,
        expires: DateTime<Utc>,
    ) -> ServiceResult<bool> {
        let conn = self.conn();

        let rows = conn
            .execute(
                "UPDATE accounts SET reset_token = ?1, reset_token_expires = ?2 WHERE id = ?3",
                params![token, format_timestamp(&expires), id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Find the account holding an unexpired reset challenge with this token
    pub fn find_account_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<Account>> {
        let conn = self.conn();

        conn.query_row(
            &format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE reset_token = ?1 AND reset_token_expires > ?2"
            ),
            params![token, format_timestamp(&now)],
            Account::from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// Replace the credential hash and clear the reset challenge
    pub fn complete_password_reset(&self, id: &str, credential_hash: &str) -> ServiceResult<bool> {
        let conn = self.conn();

        let rows = conn
            .execute(
                "UPDATE accounts SET credential_hash = ?1, reset_token = NULL, reset_token_expires = NULL WHERE id = ?2",
                params![credential_hash, id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows > 0)
    }

    /// Delete an account record, returning the number of rows removed
    pub fn delete_account(&self, id: &str) -> ServiceResult<usize> {
        let conn = self.conn();

        let rows = conn
            .execute("DELETE FROM accounts WHERE id = ?1", params![id])
            .map_err(DatabaseError::Query)?;

        Ok(rows)
    }
}

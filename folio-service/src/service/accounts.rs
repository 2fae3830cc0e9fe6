//! Account records: registration, profile and password-reset challenges.
//!
//! Credential hashing and verification belong to the auth collaborator; this
//! module only stores the hashes it is handed.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand::RngCore;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::db::Account;
use crate::error::{ServiceError, ServiceResult};
use crate::service::FolioService;

/// Reset challenges expire after this long
const RESET_CHALLENGE_TTL_HOURS: i64 = 1;

/// Public view of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountProfile {
    pub email: String,
    pub name: Option<String>,
    pub surname: Option<String>,
}

impl From<Account> for AccountProfile {
    fn from(account: Account) -> Self {
        Self {
            email: account.email,
            name: account.name,
            surname: account.surname,
        }
    }
}

/// 32 random bytes, URL-safe base64 without padding (43 characters)
fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl FolioService {
    /// Create an account from an already-hashed credential, returning its id
    pub fn register_account(&self, email: &str, credential_hash: &str) -> ServiceResult<String> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ServiceError::InvalidInput {
                message: "Email is required".to_string(),
            });
        }
        if credential_hash.is_empty() {
            return Err(ServiceError::InvalidInput {
                message: "Credential is required".to_string(),
            });
        }
        if self.email_registered(email)? {
            return Err(ServiceError::InvalidInput {
                message: "Email is already registered".to_string(),
            });
        }

        let account = Account {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            credential_hash: credential_hash.to_string(),
            name: None,
            surname: None,
            reset_token: None,
            reset_token_expires: None,
            created_at: Utc::now(),
        };
        self.metadata.insert_account(&account)?;

        info!(account_id = %account.id, "Account registered");
        Ok(account.id)
    }

    pub fn email_registered(&self, email: &str) -> ServiceResult<bool> {
        Ok(self.metadata.find_account_by_email(email.trim())?.is_some())
    }

    pub fn account_profile(&self, account_id: &str) -> ServiceResult<AccountProfile> {
        self.metadata
            .get_account(account_id)?
            .map(AccountProfile::from)
            .ok_or(ServiceError::NotFoundOrForbidden)
    }

    /// Replace the profile fields; blank values clear them
    pub fn update_profile(
        &self,
        account_id: &str,
        name: Option<&str>,
        surname: Option<&str>,
    ) -> ServiceResult<AccountProfile> {
        if !self
            .metadata
            .update_account_profile(account_id, non_empty(name), non_empty(surname))?
        {
            return Err(ServiceError::NotFoundOrForbidden);
        }

        info!(account_id = %account_id, "Profile updated");
        self.account_profile(account_id)
    }

    /// Store a fresh reset challenge for the account with this email and
    /// return its token for delivery. `None` when no account has the email.
    pub fn issue_reset_challenge(&self, email: &str) -> ServiceResult<Option<String>> {
        let Some(account) = self.metadata.find_account_by_email(email.trim())? else {
            return Ok(None);
        };

        let token = generate_reset_token();
        let expires = Utc::now() + Duration::hours(RESET_CHALLENGE_TTL_HOURS);
        self.metadata
            .set_reset_challenge(&account.id, &token, expires)?;

        info!(account_id = %account.id, expires = %expires, "Password reset challenge issued");
        Ok(Some(token))
    }

    /// Consume a reset challenge, replacing the credential hash
    pub fn complete_password_reset(
        &self,
        token: &str,
        new_credential_hash: &str,
    ) -> ServiceResult<()> {
        let invalid = || ServiceError::InvalidInput {
            message: "Invalid or expired reset token".to_string(),
        };

        if token.is_empty() || new_credential_hash.is_empty() {
            return Err(invalid());
        }

        let account = self
            .metadata
            .find_account_by_reset_token(token, Utc::now())?
            .ok_or_else(invalid)?;

        if !self
            .metadata
            .complete_password_reset(&account.id, new_credential_hash)?
        {
            return Err(invalid());
        }

        info!(account_id = %account.id, "Password reset completed");
        Ok(())
    }
}

use std::sync::Arc;

use chrono::Utc;
use flowrunner_storage::StorageProvider;
use flowrunner_types::{Account, AccountId};
use rand::RngCore;

use crate::config::AccountConfig;
use crate::error::{AccountError, AccountResult};
use crate::password::PasswordService;
use crate::rate_limit::RateLimiter;

const TOKEN_BYTES: usize = 32;

/// Ties password hashing, opaque bearer tokens, and rate limiting together
/// over a `StorageProvider`. This is the one entry point the HTTP layer
/// calls for account creation and authentication — it never touches
/// `StorageProvider` directly for those operations.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn StorageProvider>,
    passwords: PasswordService,
    pub rate_limiter: RateLimiter,
}

impl AccountService {
    pub fn new(store: Arc<dyn StorageProvider>, config: AccountConfig) -> Self {
        Self {
            store,
            passwords: PasswordService::new(config.password),
            rate_limiter: RateLimiter::new(config.rate_limit),
        }
    }

    pub async fn create_account(&self, username: &str, password: &str) -> AccountResult<Account> {
        let password_hash = self.passwords.hash_password(password)?;
        let now = Utc::now();
        let account = Account {
            id: AccountId::new(),
            username: username.to_string(),
            password_hash,
            api_token: generate_token(),
            created_at: now,
            updated_at: now,
        };

        match self.store.create_account(account).await {
            Ok(account) => Ok(account),
            Err(flowrunner_storage::StorageError::Conflict(_)) => Err(AccountError::UsernameTaken),
            Err(e) => Err(e.into()),
        }
    }

    /// Username + password login. On success, issues a fresh bearer token
    /// and persists it, invalidating whatever token was live before.
    pub async fn login(&self, username: &str, password: &str) -> AccountResult<Account> {
        self.rate_limiter.check_login_limit(username).await?;

        let account = match self.store.get_account_by_username(username).await {
            Ok(account) => account,
            Err(flowrunner_storage::StorageError::NotFound) => {
                // Still run verify_password against a dummy hash so the
                // unknown-username and wrong-password paths take the same
                // amount of time.
                let _ = self
                    .passwords
                    .verify_password(password, &dummy_hash_for_timing());
                self.rate_limiter.record_failed_login(username).await;
                return Err(AccountError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !self.passwords.verify_password(password, &account.password_hash)? {
            self.rate_limiter.record_failed_login(username).await;
            return Err(AccountError::InvalidCredentials);
        }

        self.rate_limiter.record_successful_login(username).await;

        let mut updated = account;
        updated.api_token = generate_token();
        updated.updated_at = Utc::now();
        Ok(self.store.update_account(updated).await?)
    }

    /// Resolves a bearer token to its owning account. Does not itself apply
    /// rate limiting — callers should follow up with `check_account_limit`
    /// once the account id is known.
    pub async fn authenticate_token(&self, token: &str) -> AccountResult<Account> {
        match self.store.get_account_by_token(token).await {
            Ok(account) => Ok(account),
            Err(flowrunner_storage::StorageError::NotFound) => Err(AccountError::InvalidToken),
            Err(e) => Err(e.into()),
        }
    }

    /// Rotates an account's bearer token, invalidating the old one.
    pub async fn rotate_token(&self, account_id: &AccountId) -> AccountResult<Account> {
        let mut account = self.store.get_account(account_id).await?;
        account.api_token = generate_token();
        account.updated_at = Utc::now();
        Ok(self.store.update_account(account).await?)
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A syntactically valid but unmatched Argon2id hash, used only to keep the
/// unknown-username login path on the same timing profile as a real
/// password check.
fn dummy_hash_for_timing() -> String {
    "$argon2id$v=19$m=19456,t=2,p=1$AAAAAAAAAAAAAAAAAAAAAA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".to_string()
}

impl From<flowrunner_storage::StorageError> for AccountError {
    fn from(err: flowrunner_storage::StorageError) -> Self {
        match err {
            flowrunner_storage::StorageError::NotFound => AccountError::NotFound,
            other => AccountError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowrunner_storage::MemoryStore;

    fn service() -> AccountService {
        let mut config = AccountConfig::default();
        config.password.memory_cost = 4096;
        config.password.time_cost = 1;
        AccountService::new(Arc::new(MemoryStore::new()), config)
    }

    #[tokio::test]
    async fn create_then_login_round_trips() {
        let svc = service();
        svc.create_account("alice", "CorrectHorseBattery9").await.unwrap();

        let account = svc.login("alice", "CorrectHorseBattery9").await.unwrap();
        assert_eq!(account.username, "alice");

        let via_token = svc.authenticate_token(&account.api_token).await.unwrap();
        assert_eq!(via_token.id, account.id);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let svc = service();
        svc.create_account("bob", "CorrectHorseBattery9").await.unwrap();
        let result = svc.login("bob", "WrongPassword1").await;
        assert!(matches!(result, Err(AccountError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn unknown_username_is_rejected_not_leaked() {
        let svc = service();
        let result = svc.login("nobody", "whatever").await;
        assert!(matches!(result, Err(AccountError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let svc = service();
        svc.create_account("carol", "CorrectHorseBattery9").await.unwrap();
        let result = svc.create_account("carol", "AnotherPassword9").await;
        assert!(matches!(result, Err(AccountError::UsernameTaken)));
    }

    #[tokio::test]
    async fn login_locks_out_after_repeated_failures() {
        let svc = service();
        svc.create_account("dave", "CorrectHorseBattery9").await.unwrap();
        for _ in 0..5 {
            let _ = svc.login("dave", "wrong").await;
        }
        let result = svc.login("dave", "CorrectHorseBattery9").await;
        assert!(matches!(result, Err(AccountError::AccountLocked { .. })));
    }

    #[tokio::test]
    async fn rotating_the_token_invalidates_the_old_one() {
        let svc = service();
        let account = svc.create_account("erin", "CorrectHorseBattery9").await.unwrap();
        let old_token = account.api_token.clone();

        let rotated = svc.rotate_token(&account.id).await.unwrap();
        assert_ne!(rotated.api_token, old_token);
        assert!(svc.authenticate_token(&old_token).await.is_err());
        assert!(svc.authenticate_token(&rotated.api_token).await.is_ok());
    }
}

use flowrunner_types::AccountId;

use crate::auth::AuthenticatedAccount;
use crate::error::{ApiError, ApiResult};

/// Every secret route is nested under `/accounts/{accountId}/...`; the path
/// account id must match the authenticated caller. A mismatch reads as
/// `NotFound`, not `Forbidden` — the same no-existence-leak posture used
/// throughout storage (spec §8 isolation).
pub fn ensure_self(auth: &AuthenticatedAccount, path_account_id: &AccountId) -> ApiResult<()> {
    if auth.id() == path_account_id {
        Ok(())
    } else {
        Err(ApiError::NotFound)
    }
}

use async_trait::async_trait;

use crate::domain::account::models::Account;
use crate::domain::auth::errors::NotifierError;
use crate::domain::auth::ports::AccountNotifier;

/// Notifier that records the event in the log and delivers nothing.
///
/// The token itself is never logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl AccountNotifier for LoggingNotifier {
    async fn verification_issued(
        &self,
        account: &Account,
        _token: &str,
    ) -> Result<(), NotifierError> {
        tracing::info!(
            account_id = %account.id,
            expires_at = ?account.email_verification.as_ref().map(|v| v.expires_at),
            "Email verification issued"
        );
        Ok(())
    }
}

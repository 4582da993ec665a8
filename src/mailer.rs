use tracing::info;

use crate::models::models::AccountId;
use crate::tokens::Token;

/// Outbound account mail. Delivery is fire-and-forget: errors are logged by
/// the caller and never retried.
pub trait Mailer {
    fn send_activation(&self, email: &str, account_id: &AccountId, token: &Token) -> anyhow::Result<()>;
    fn send_password_reset(&self, email: &str, token: &Token) -> anyhow::Result<()>;
}

/// Drops every message. Useful where no transport is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMailer;

impl Mailer for NullMailer {
    fn send_activation(&self, _email: &str, account_id: &AccountId, _token: &Token) -> anyhow::Result<()> {
        info!("No mail transport, dropping activation mail for {account_id}");
        Ok(())
    }

    fn send_password_reset(&self, _email: &str, _token: &Token) -> anyhow::Result<()> {
        info!("No mail transport, dropping password reset mail");
        Ok(())
    }
}

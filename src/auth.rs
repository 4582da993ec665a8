use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::Config;
use crate::core::db::{AccountField, Persistence};
use crate::core::errors::{CoreError, Field};
use crate::core::helpers::{normalize_email, Clock, SystemClock};
use crate::credentials::{accept_password, CredentialStore};
use crate::mailer::Mailer;
use crate::models::models::{Account, AccountId};
use crate::tokens::{Token, TokenKind, TokenLedger};

/// Account-side orchestration: signup, activation, persistent sessions,
/// password resets and login. Holds only collaborators and startup
/// configuration; every call is a self-contained unit of work.
pub struct AccountLifecycle<S, M> {
    pub(crate) store: S,
    pub(crate) mailer: M,
    pub(crate) credentials: CredentialStore,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: Config,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    Activated(Account),
    /// The account was already active; nothing was checked or written.
    AlreadyActive(Account),
}

impl Activation {
    pub fn account(&self) -> &Account {
        match self {
            Activation::Activated(a) | Activation::AlreadyActive(a) => a,
        }
    }
}

/// Values the request layer stores client-side for a persistent session.
#[derive(Debug, Clone)]
pub struct RememberCookie {
    pub account_id: AccountId,
    pub token: Token,
    pub expires_at: DateTime<Utc>,
}

/// A persistent-session cookie as sent back by a returning visitor.
#[derive(Debug, Clone)]
pub struct PresentedCookie {
    pub account_id: AccountId,
    pub token: Token,
}

impl PresentedCookie {
    pub fn parse(account_id: &str, remember_token: &str) -> Option<Self> {
        let account_id = AccountId::parse(account_id)?;
        if remember_token.is_empty() {
            return None;
        }
        Some(Self {
            account_id,
            token: Token::new(remember_token),
        })
    }
}

impl From<&RememberCookie> for PresentedCookie {
    fn from(cookie: &RememberCookie) -> Self {
        Self {
            account_id: cookie.account_id,
            token: cookie.token.clone(),
        }
    }
}

/// Per-request login state. Created from the session cookie at the start of
/// a request and dropped at its end; the resolved account is cached here
/// rather than anywhere process-wide.
#[derive(Debug, Default, Clone)]
pub struct Session {
    account_id: Option<AccountId>,
    current: Option<Account>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resume(account_id: AccountId) -> Self {
        Self {
            account_id: Some(account_id),
            current: None,
        }
    }

    pub fn account_id(&self) -> Option<AccountId> {
        self.account_id
    }

    pub fn is_logged_in(&self) -> bool {
        self.account_id.is_some()
    }
}

pub(crate) fn dispatch(result: anyhow::Result<()>, what: &str, account_id: &AccountId) {
    if let Err(e) = result {
        warn!("Failed to send {what} mail for account {account_id}: {e}");
    }
}

impl<S: Persistence, M: Mailer> AccountLifecycle<S, M> {
    pub fn new(store: S, mailer: M, config: Config) -> anyhow::Result<Self> {
        Ok(Self {
            store,
            mailer,
            credentials: CredentialStore::new(config.hash_cost)?,
            clock: Arc::new(SystemClock),
            config,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn ledger(&self, kind: TokenKind) -> TokenLedger<'_> {
        TokenLedger::new(kind, &self.credentials)
    }

    pub(crate) fn load(&self, id: &AccountId) -> Result<Account, CoreError> {
        self.store
            .find_account(id)?
            .ok_or(CoreError::NotFound("Account"))
    }

    pub(crate) fn patch(&self, id: &AccountId, fields: &[AccountField]) -> Result<Account, CoreError> {
        self.store
            .patch_account(id, fields)?
            .ok_or(CoreError::NotFound("Account"))
    }

    /// Whether `token` matches the account's current digest of `kind`.
    pub fn is_authenticated(&self, account: &Account, kind: TokenKind, token: &str) -> bool {
        self.ledger(kind).verify_for(account, token)
    }

    // === Activation ===

    pub fn activate(&self, account_id: &AccountId, token: &str) -> Result<Activation, CoreError> {
        let Some(account) = self.store.find_account(account_id)? else {
            warn!("Activation attempted for unknown account {account_id}");
            return Err(CoreError::InvalidCredentials);
        };

        if account.activated {
            return Ok(Activation::AlreadyActive(account));
        }

        if !self.is_authenticated(&account, TokenKind::Activation, token) {
            warn!("Invalid activation token for account {account_id}");
            return Err(CoreError::InvalidCredentials);
        }

        let account = self.patch(
            account_id,
            &[
                AccountField::Activated(self.clock.now()),
                self.ledger(TokenKind::Activation).revoke(),
            ],
        )?;

        info!("Activated account {account_id}");
        Ok(Activation::Activated(account))
    }

    // === Persistent sessions ===

    /// Issues a remember token. Only the remember digest is written.
    pub fn remember(&self, account_id: &AccountId) -> Result<RememberCookie, CoreError> {
        let (token, digest) = self.ledger(TokenKind::Remember).issue_field()?;
        let account = self.patch(account_id, &[digest])?;

        Ok(RememberCookie {
            account_id: account.id,
            token,
            expires_at: self.clock.now() + self.config.remember_for,
        })
    }

    pub fn forget(&self, account_id: &AccountId) -> Result<(), CoreError> {
        self.patch(account_id, &[self.ledger(TokenKind::Remember).revoke()])?;
        Ok(())
    }

    pub fn log_in(&self, session: &mut Session, account: Account) {
        session.account_id = Some(account.id);
        session.current = Some(account);
    }

    /// Forgets the persistent session of the logged-in account, if any, and
    /// clears the request's login state.
    pub fn log_out(&self, session: &mut Session) -> Result<(), CoreError> {
        let account_id = session.current.take().map(|a| a.id).or(session.account_id);
        session.account_id = None;

        let Some(id) = account_id else {
            return Ok(());
        };
        // A deleted account has nothing left to forget.
        let forgotten = self
            .store
            .patch_account(&id, &[self.ledger(TokenKind::Remember).revoke()])?;
        if forgotten.is_some() {
            info!("Logged out account {id}");
        }
        Ok(())
    }

    /// Resolves the account behind this request, at most once per session
    /// value. Falls back to the persistent cookie and promotes it to a live
    /// session when its token checks out.
    pub fn current_account(
        &self,
        session: &mut Session,
        cookie: Option<&PresentedCookie>,
    ) -> Result<Option<Account>, CoreError> {
        if let Some(account) = &session.current {
            return Ok(Some(account.clone()));
        }

        if let Some(id) = session.account_id {
            let account = self.store.find_account(&id)?;
            if account.is_none() {
                session.account_id = None;
            }
            session.current = account.clone();
            return Ok(account);
        }

        let Some(cookie) = cookie else {
            return Ok(None);
        };
        let Some(account) = self.store.find_account(&cookie.account_id)? else {
            return Ok(None);
        };
        if !self.is_authenticated(&account, TokenKind::Remember, cookie.token.as_str()) {
            warn!("Rejected remember cookie for account {}", account.id);
            return Ok(None);
        }

        self.log_in(session, account.clone());
        Ok(Some(account))
    }

    // === Password reset ===

    pub fn request_password_reset(&self, email: &str) -> Result<(), CoreError> {
        let Some(account) = self.store.find_account_by_email(&normalize_email(email))? else {
            info!("Password reset requested for unknown email");
            return Err(CoreError::InvalidCredentials);
        };
        if !account.activated {
            return Err(CoreError::NotActivated);
        }

        let (token, digest) = self.ledger(TokenKind::Reset).issue_field()?;
        let account = self.patch(
            &account.id,
            &[digest, AccountField::ResetSentAt(Some(self.clock.now()))],
        )?;

        dispatch(
            self.mailer.send_password_reset(&account.email, &token),
            "password reset",
            &account.id,
        );
        info!("Issued password reset for account {}", account.id);
        Ok(())
    }

    /// True once the reset window has passed, or when no reset was requested.
    pub fn password_reset_expired(&self, account: &Account) -> bool {
        match account.reset_sent_at {
            Some(sent_at) => self.clock.now() - sent_at > self.config.reset_window,
            None => true,
        }
    }

    pub fn reset_password(
        &self,
        email: &str,
        token: &str,
        new_password: &str,
    ) -> Result<Account, CoreError> {
        let Some(account) = self.store.find_account_by_email(&normalize_email(email))? else {
            return Err(CoreError::InvalidCredentials);
        };
        if !account.activated {
            return Err(CoreError::InvalidCredentials);
        }

        // Expiry first: an old link is rejected whatever token it carries.
        if self.password_reset_expired(&account) {
            info!("Expired password reset for account {}", account.id);
            return Err(CoreError::Expired);
        }
        if !self.is_authenticated(&account, TokenKind::Reset, token) {
            warn!("Invalid password reset token for account {}", account.id);
            return Err(CoreError::InvalidCredentials);
        }

        let password = accept_password(Some(new_password), true)?
            .ok_or_else(|| CoreError::validation(Field::Password, "can't be blank"))?;
        let account = self.patch(
            &account.id,
            &[
                AccountField::PasswordDigest(self.credentials.hash(password)?),
                self.ledger(TokenKind::Reset).revoke(),
                AccountField::ResetSentAt(None),
            ],
        )?;

        info!("Password reset for account {}", account.id);
        Ok(account)
    }

    // === Login ===

    /// Never reveals whether the email or the password was wrong. An unknown
    /// email still pays for one verification, against the decoy digest.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Account, CoreError> {
        let verified = match self.store.find_account_by_email(&normalize_email(email))? {
            Some(account) => self
                .credentials
                .verify(password, Some(&account.password_digest))
                .then_some(account),
            None => {
                self.credentials.verify_decoy(password);
                None
            }
        };

        verified.ok_or_else(|| {
            warn!("Rejected login attempt");
            CoreError::InvalidCredentials
        })
    }
}

use tracing::{info, warn};

use crate::auth::{dispatch, AccountLifecycle};
use crate::config::*;
use crate::core::db::{AccountField, Persistence};
use crate::core::errors::{CoreError, Field};
use crate::core::helpers::{is_valid_email, normalize_email};
use crate::credentials::accept_password;
use crate::mailer::Mailer;
use crate::models::models::{Account, AccountId};
use crate::tokens::TokenKind;

/// Signup form as received from the request layer.
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
}

/// Profile edit. `None` (or a blank password) leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub fn validate_name(name: &str) -> Result<String, CoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::validation(Field::Name, "can't be blank"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(CoreError::validation(
            Field::Name,
            format!("is too long (maximum is {} characters)", MAX_NAME_LENGTH),
        ));
    }
    Ok(name.to_string())
}

/// Lower-cases and checks the shape of an email address.
pub fn validate_email(email: &str) -> Result<String, CoreError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(CoreError::validation(Field::Email, "can't be blank"));
    }
    if email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(CoreError::validation(
            Field::Email,
            format!("is too long (maximum is {} characters)", MAX_EMAIL_LENGTH),
        ));
    }
    if !is_valid_email(&email) {
        return Err(CoreError::validation(Field::Email, "is invalid"));
    }
    Ok(email)
}

impl<S: Persistence, M: Mailer> AccountLifecycle<S, M> {
    /// Creates an unactivated account with a live activation digest and
    /// mails the activation token.
    pub fn signup(&self, new_account: NewAccount) -> Result<Account, CoreError> {
        let name = validate_name(&new_account.name)?;
        let email = validate_email(&new_account.email)?;
        let password = accept_password(new_account.password.as_deref(), true)?
            .ok_or_else(|| CoreError::validation(Field::Password, "can't be blank"))?;

        if self.store.find_account_by_email(&email)?.is_some() {
            warn!("Signup with an email already in use");
            return Err(CoreError::Conflict(Field::Email));
        }

        let mut account = Account {
            id: AccountId::new(),
            name,
            email,
            password_digest: self.credentials.hash(password)?,
            remember_digest: None,
            activation_digest: None,
            reset_digest: None,
            activated: false,
            activated_at: None,
            reset_sent_at: None,
            created_at: self.clock.now(),
        };
        let (token, digest) = self.ledger(TokenKind::Activation).issue_field()?;
        digest.apply(&mut account);

        // A concurrent signup can still win the unique index; that surfaces as Conflict.
        self.store.insert_account(&account)?;

        dispatch(
            self.mailer.send_activation(&account.email, &account.id, &token),
            "activation",
            &account.id,
        );
        info!("Created account {}", account.id);
        Ok(account)
    }

    /// Issues a fresh activation token for an unactivated account. The
    /// previously mailed token stops working. Returns false, sending nothing,
    /// when the account is already active.
    pub fn resend_activation(&self, email: &str) -> Result<bool, CoreError> {
        let Some(account) = self.store.find_account_by_email(&normalize_email(email))? else {
            return Err(CoreError::InvalidCredentials);
        };
        if account.activated {
            return Ok(false);
        }

        let (token, digest) = self.ledger(TokenKind::Activation).issue_field()?;
        let account = self.patch(&account.id, &[digest])?;

        dispatch(
            self.mailer.send_activation(&account.email, &account.id, &token),
            "activation",
            &account.id,
        );
        Ok(true)
    }

    pub fn find_account(&self, id: &AccountId) -> Result<Option<Account>, CoreError> {
        Ok(self.store.find_account(id)?)
    }

    pub fn update_account(
        &self,
        id: &AccountId,
        changes: AccountChanges,
    ) -> Result<Account, CoreError> {
        let account = self.load(id)?;
        let mut fields = Vec::new();

        if let Some(name) = changes.name.as_deref() {
            fields.push(AccountField::Name(validate_name(name)?));
        }

        if let Some(email) = changes.email.as_deref() {
            let email = validate_email(email)?;
            if email != account.email {
                if self.store.find_account_by_email(&email)?.is_some() {
                    return Err(CoreError::Conflict(Field::Email));
                }
                fields.push(AccountField::Email(email));
            }
        }

        if let Some(password) = accept_password(changes.password.as_deref(), false)? {
            fields.push(AccountField::PasswordDigest(self.credentials.hash(password)?));
        }

        if fields.is_empty() {
            return Ok(account);
        }
        self.patch(id, &fields)
    }

    /// Removes the account along with its posts and follow edges.
    pub fn destroy_account(&self, id: &AccountId) -> Result<(), CoreError> {
        if !self.store.delete_account(id)? {
            return Err(CoreError::NotFound("Account"));
        }
        info!("Destroyed account {id}");
        Ok(())
    }
}

use base64::{engine::general_purpose, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

use crate::config::TOKEN_BYTES;
use crate::core::db::AccountField;
use crate::credentials::CredentialStore;
use crate::models::models::Account;

/// The three token lifecycles an account carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Remember,
    Activation,
    Reset,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Remember => "remember",
            TokenKind::Activation => "activation",
            TokenKind::Reset => "reset",
        }
    }

    /// Current digest of this kind on `account`.
    pub fn digest_of(self, account: &Account) -> Option<&str> {
        match self {
            TokenKind::Remember => account.remember_digest.as_deref(),
            TokenKind::Activation => account.activation_digest.as_deref(),
            TokenKind::Reset => account.reset_digest.as_deref(),
        }
    }

    pub fn digest_slot(self, account: &mut Account) -> &mut Option<String> {
        match self {
            TokenKind::Remember => &mut account.remember_digest,
            TokenKind::Activation => &mut account.activation_digest,
            TokenKind::Reset => &mut account.reset_digest,
        }
    }
}

/// Plaintext secret handed to a client. Never persisted, never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

pub struct IssuedToken {
    pub token: Token,
    pub digest: String,
}

/// Issues and checks opaque tokens of one kind.
pub struct TokenLedger<'a> {
    kind: TokenKind,
    credentials: &'a CredentialStore,
}

impl<'a> TokenLedger<'a> {
    pub fn new(kind: TokenKind, credentials: &'a CredentialStore) -> Self {
        Self { kind, credentials }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn issue(&self) -> anyhow::Result<IssuedToken> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let token = Token(general_purpose::URL_SAFE_NO_PAD.encode(bytes));
        let digest = self.credentials.hash(token.as_str())?;
        Ok(IssuedToken { token, digest })
    }

    /// Issues a token together with the column write that makes it the one
    /// outstanding token of this kind, replacing any earlier digest.
    pub fn issue_field(&self) -> anyhow::Result<(Token, AccountField)> {
        let IssuedToken { token, digest } = self.issue()?;
        Ok((token, AccountField::Digest(self.kind, Some(digest))))
    }

    pub fn verify(&self, presented: &str, stored_digest: Option<&str>) -> bool {
        self.credentials.verify(presented, stored_digest)
    }

    /// Checks `presented` against the digest `account` holds right now.
    pub fn verify_for(&self, account: &Account, presented: &str) -> bool {
        self.verify(presented, self.kind.digest_of(account))
    }

    /// Column write that nulls this kind's digest.
    pub fn revoke(&self) -> AccountField {
        AccountField::Digest(self.kind, None)
    }
}

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::core::errors::{CoreError, Field};
use crate::core::helpers::Clock;
use crate::core::query::PostQuery;
use crate::credentials::CredentialStore;
use crate::models::models::{Account, AccountId, FollowEdge, Post, PostId};
use crate::tokens::TokenKind;

/// Unique constraints a store must enforce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Case-insensitive `accounts.email`.
    AccountEmail,
    /// `(follower_id, followed_id)`.
    FollowEdge,
}

#[derive(Debug)]
pub enum StoreError {
    Duplicate(Constraint),
    Backend(anyhow::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Duplicate(c) => write!(f, "Unique constraint violated: {:?}", c),
            StoreError::Backend(e) => write!(f, "Store backend error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Backend(err)
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(Constraint::AccountEmail) => CoreError::Conflict(Field::Email),
            StoreError::Duplicate(Constraint::FollowEdge) => CoreError::Conflict(Field::Followed),
            StoreError::Backend(e) => CoreError::PersistenceFailure(e.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One column of a stored account. Writes after signup name only the
/// columns they own, so a caller holding an old copy of the row can never
/// put back a digest or password that has since been replaced.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountField {
    Name(String),
    /// Stored lower-cased; the unique index follows it.
    Email(String),
    PasswordDigest(String),
    Digest(TokenKind, Option<String>),
    /// Sets `activated` and `activated_at` together.
    Activated(DateTime<Utc>),
    ResetSentAt(Option<DateTime<Utc>>),
}

impl AccountField {
    pub fn apply(&self, account: &mut Account) {
        match self {
            AccountField::Name(name) => account.name = name.clone(),
            AccountField::Email(email) => account.email = email.to_lowercase(),
            AccountField::PasswordDigest(digest) => account.password_digest = digest.clone(),
            AccountField::Digest(kind, digest) => *kind.digest_slot(account) = digest.clone(),
            AccountField::Activated(at) => {
                account.activated = true;
                account.activated_at = Some(*at);
            }
            AccountField::ResetSentAt(at) => account.reset_sent_at = *at,
        }
    }
}

/// Durable state of accounts, posts and follow edges.
///
/// Every method is one round trip. A new token digest lands through
/// [`Persistence::patch_account`], and that write is what invalidates the
/// older token of the same kind.
pub trait Persistence {
    /// Fails with `Duplicate(AccountEmail)` when the lower-cased email exists.
    fn insert_account(&self, account: &Account) -> StoreResult<()>;
    /// Applies `fields` to the stored row in one write and returns the row as
    /// written, or `None` when there is no such account. Columns not named
    /// keep their stored values. An `Email` already used by another account
    /// fails with `Duplicate(AccountEmail)` and writes nothing.
    fn patch_account(&self, id: &AccountId, fields: &[AccountField]) -> StoreResult<Option<Account>>;
    fn find_account(&self, id: &AccountId) -> StoreResult<Option<Account>>;
    fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;
    /// Removes the account together with its posts and every edge touching it.
    fn delete_account(&self, id: &AccountId) -> StoreResult<bool>;

    fn insert_post(&self, post: &Post) -> StoreResult<()>;
    fn find_post(&self, id: &PostId) -> StoreResult<Option<Post>>;
    fn delete_post(&self, id: &PostId) -> StoreResult<bool>;
    /// Evaluates the query's author membership and ordering store-side.
    fn posts(&self, query: &PostQuery) -> StoreResult<Vec<Post>>;

    /// Fails with `Duplicate(FollowEdge)` when the ordered pair exists.
    fn insert_edge(&self, edge: &FollowEdge) -> StoreResult<()>;
    fn delete_edge(&self, follower_id: &AccountId, followed_id: &AccountId) -> StoreResult<bool>;
    fn edge_exists(&self, follower_id: &AccountId, followed_id: &AccountId) -> StoreResult<bool>;
    fn followed_ids(&self, follower_id: &AccountId) -> StoreResult<Vec<AccountId>>;
    fn follower_ids(&self, followed_id: &AccountId) -> StoreResult<Vec<AccountId>>;
}

// === Sample data ===

pub const SAMPLE_PASSWORD: &str = "password";

const SAMPLE_ACCOUNTS: [(&str, &str, &[&str]); 3] = [
    ("Test User", "test@example.com", &["This is my first post!"]),
    (
        "Alice",
        "alice@example.com",
        &[
            "Welcome to my board! Excited to share thoughts here.",
            "Just finished an amazing project. Feeling productive today!",
        ],
    ),
    (
        "Bob",
        "bob@example.com",
        &["Hey everyone! Just joined, looking forward to connecting with you all."],
    ),
];

/// Seeds activated sample accounts with posts, and makes the test user follow
/// bob. Accounts that already exist are left alone.
pub fn init_sample_data<S: Persistence + ?Sized>(
    store: &S,
    credentials: &CredentialStore,
    clock: &dyn Clock,
) -> Result<Vec<AccountId>, CoreError> {
    let mut ids = Vec::with_capacity(SAMPLE_ACCOUNTS.len());

    for (name, email, contents) in SAMPLE_ACCOUNTS {
        if let Some(existing) = store.find_account_by_email(email)? {
            ids.push(existing.id);
            continue;
        }

        let now = clock.now();
        let account = Account {
            id: AccountId::new(),
            name: name.to_string(),
            email: email.to_string(),
            password_digest: credentials.hash(SAMPLE_PASSWORD)?,
            remember_digest: None,
            activation_digest: None,
            reset_digest: None,
            activated: true,
            activated_at: Some(now),
            reset_sent_at: None,
            created_at: now,
        };
        store.insert_account(&account)?;

        for content in contents.iter() {
            store.insert_post(&Post {
                id: PostId::new(),
                author_id: account.id,
                content: content.to_string(),
                picture: None,
                created_at: clock.now(),
            })?;
        }

        info!("Seeded sample account {}", account.id);
        ids.push(account.id);
    }

    let (test_id, bob_id) = (ids[0], ids[2]);
    match store.insert_edge(&FollowEdge {
        follower_id: test_id,
        followed_id: bob_id,
        created_at: clock.now(),
    }) {
        Ok(()) | Err(StoreError::Duplicate(Constraint::FollowEdge)) => {}
        Err(e) => return Err(e.into()),
    }

    Ok(ids)
}

/// Deletes the sample accounts (and through the cascade, their posts and edges).
pub fn reset_sample_data<S: Persistence + ?Sized>(store: &S) -> Result<usize, CoreError> {
    let mut removed = 0;
    for (_, email, _) in SAMPLE_ACCOUNTS {
        if let Some(account) = store.find_account_by_email(email)? {
            if store.delete_account(&account.id)? {
                removed += 1;
            }
        }
    }
    Ok(removed)
}

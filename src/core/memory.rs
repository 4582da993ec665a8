use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::db::{AccountField, Constraint, Persistence, StoreError, StoreResult};
use crate::core::query::PostQuery;
use crate::models::models::{Account, AccountId, FollowEdge, Post, PostId};

#[derive(Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    /// Lower-cased email -> id; the unique index.
    emails: HashMap<String, AccountId>,
    posts: BTreeMap<PostId, Post>,
    /// Keyed by `(follower_id, followed_id)`; the unique index.
    edges: BTreeMap<(AccountId, AccountId), FollowEdge>,
}

/// Process-local store. Each trait call holds the lock for its whole
/// duration, so single calls are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("memory store lock poisoned")))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("memory store lock poisoned")))
    }

    pub fn account_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.accounts.len())
    }

    pub fn post_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.posts.len())
    }

    pub fn edge_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.edges.len())
    }
}

impl Persistence for MemoryStore {
    fn insert_account(&self, account: &Account) -> StoreResult<()> {
        let mut tables = self.write()?;
        let email = account.email.to_lowercase();
        if tables.emails.contains_key(&email) {
            return Err(StoreError::Duplicate(Constraint::AccountEmail));
        }
        tables.emails.insert(email, account.id);
        tables.accounts.insert(account.id, account.clone());
        Ok(())
    }

    fn patch_account(&self, id: &AccountId, fields: &[AccountField]) -> StoreResult<Option<Account>> {
        let mut tables = self.write()?;
        let Some(mut account) = tables.accounts.get(id).cloned() else {
            return Ok(None);
        };

        let previous_email = account.email.to_lowercase();
        for field in fields {
            field.apply(&mut account);
        }

        let email = account.email.to_lowercase();
        if email != previous_email {
            if tables.emails.contains_key(&email) {
                return Err(StoreError::Duplicate(Constraint::AccountEmail));
            }
            tables.emails.remove(&previous_email);
            tables.emails.insert(email, *id);
        }
        tables.accounts.insert(*id, account.clone());
        Ok(Some(account))
    }

    fn find_account(&self, id: &AccountId) -> StoreResult<Option<Account>> {
        Ok(self.read()?.accounts.get(id).cloned())
    }

    fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let tables = self.read()?;
        Ok(tables
            .emails
            .get(&email.to_lowercase())
            .and_then(|id| tables.accounts.get(id))
            .cloned())
    }

    fn delete_account(&self, id: &AccountId) -> StoreResult<bool> {
        let mut tables = self.write()?;
        let Some(account) = tables.accounts.remove(id) else {
            return Ok(false);
        };
        tables.emails.remove(&account.email.to_lowercase());
        tables.posts.retain(|_, post| post.author_id != *id);
        tables
            .edges
            .retain(|(follower, followed), _| follower != id && followed != id);
        Ok(true)
    }

    fn insert_post(&self, post: &Post) -> StoreResult<()> {
        self.write()?.posts.insert(post.id, post.clone());
        Ok(())
    }

    fn find_post(&self, id: &PostId) -> StoreResult<Option<Post>> {
        Ok(self.read()?.posts.get(id).cloned())
    }

    fn delete_post(&self, id: &PostId) -> StoreResult<bool> {
        Ok(self.write()?.posts.remove(id).is_some())
    }

    fn posts(&self, query: &PostQuery) -> StoreResult<Vec<Post>> {
        let tables = self.read()?;
        let follows = |follower: &AccountId, followed: &AccountId| {
            tables.edges.contains_key(&(*follower, *followed))
        };

        let mut posts: Vec<Post> = tables
            .posts
            .values()
            .filter(|post| query.authors.admits(&post.author_id, &follows))
            .cloned()
            .collect();
        query.sort(&mut posts);
        Ok(posts)
    }

    fn insert_edge(&self, edge: &FollowEdge) -> StoreResult<()> {
        let mut tables = self.write()?;
        let key = (edge.follower_id, edge.followed_id);
        if tables.edges.contains_key(&key) {
            return Err(StoreError::Duplicate(Constraint::FollowEdge));
        }
        tables.edges.insert(key, edge.clone());
        Ok(())
    }

    fn delete_edge(&self, follower_id: &AccountId, followed_id: &AccountId) -> StoreResult<bool> {
        Ok(self
            .write()?
            .edges
            .remove(&(*follower_id, *followed_id))
            .is_some())
    }

    fn edge_exists(&self, follower_id: &AccountId, followed_id: &AccountId) -> StoreResult<bool> {
        Ok(self
            .read()?
            .edges
            .contains_key(&(*follower_id, *followed_id)))
    }

    fn followed_ids(&self, follower_id: &AccountId) -> StoreResult<Vec<AccountId>> {
        let tables = self.read()?;
        Ok(tables
            .edges
            .keys()
            .filter(|(follower, _)| follower == follower_id)
            .map(|(_, followed)| *followed)
            .collect())
    }

    fn follower_ids(&self, followed_id: &AccountId) -> StoreResult<Vec<AccountId>> {
        let tables = self.read()?;
        Ok(tables
            .edges
            .keys()
            .filter(|(_, followed)| followed == followed_id)
            .map(|(follower, _)| *follower)
            .collect())
    }
}

use serde::de::DeserializeOwned;
use serde::Serialize;
use spin_sdk::key_value::Store;

use crate::config::*;
use crate::core::db::{AccountField, Constraint, Persistence, StoreError, StoreResult};
use crate::core::query::{AuthorScope, PostQuery};
use crate::models::models::{Account, AccountId, FollowEdge, Followers, Followings, Post, PostId};

/// Byte-level key-value operations the store needs. Implemented for the
/// Spin host store; anything with the same get/set/delete shape will do.
pub trait KeyValue {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;
    fn delete(&self, key: &str) -> anyhow::Result<()>;
}

impl KeyValue for Store {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(Store::get(self, key)?)
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        Ok(Store::set(self, key, value)?)
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        Ok(Store::delete(self, key)?)
    }
}

/// Persistence over a key-value store, by default Spin's.
///
/// Layout: `account:{id}`, `email:{email}` (unique index), `accounts_list`,
/// `post:{id}`, `posts_by:{author}` (newest first), `followings:{id}` and
/// `followers:{id}` adjacency lists.
///
/// Limits of the backend:
/// - No transactions. A call issues several writes, and a crash between them
///   can leave an index behind. `patch_account` is a read then a write of one
///   key, so two racing patches of one account can lose the earlier one.
/// - No queries. A feed is assembled here by reading the `followings:` list
///   and then each author's posts, one key at a time, rather than by the
///   backend evaluating the membership filter.
pub struct KvStore<B = Store> {
    backend: B,
}

impl KvStore<Store> {
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::new(Store::open_default()?))
    }
}

impl<B: KeyValue> KvStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.backend.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn set<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        self.backend.set(key, &serde_json::to_vec(value)?)
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.backend.delete(key)
    }

    fn list(&self, key: &str) -> anyhow::Result<Vec<String>> {
        Ok(self.get(key)?.unwrap_or_default())
    }

    fn ids(&self, key: &str) -> anyhow::Result<Vec<AccountId>> {
        Ok(self.get(key)?.unwrap_or_default())
    }

    fn author_posts(&self, author_id: &AccountId) -> anyhow::Result<Vec<Post>> {
        let post_ids: Vec<PostId> = self.get(&posts_by_key(author_id))?.unwrap_or_default();
        let mut posts = Vec::with_capacity(post_ids.len());
        for id in post_ids {
            if let Some(p) = self.get::<Post>(&post_key(&id))? {
                posts.push(p);
            }
        }
        Ok(posts)
    }
}

impl<B: KeyValue> Persistence for KvStore<B> {
    fn insert_account(&self, account: &Account) -> StoreResult<()> {
        let index = email_key(&account.email);
        if self.get::<AccountId>(&index)?.is_some() {
            return Err(StoreError::Duplicate(Constraint::AccountEmail));
        }
        self.set(&account_key(&account.id), account)?;
        self.set(&index, &account.id)?;

        let mut accounts = self.list(ACCOUNTS_LIST_KEY)?;
        accounts.push(account.id.to_string());
        self.set(ACCOUNTS_LIST_KEY, &accounts)?;
        Ok(())
    }

    fn patch_account(&self, id: &AccountId, fields: &[AccountField]) -> StoreResult<Option<Account>> {
        let key = account_key(id);
        let Some(mut account) = self.get::<Account>(&key)? else {
            return Ok(None);
        };

        let previous_email = account.email.to_lowercase();
        for field in fields {
            field.apply(&mut account);
        }

        if account.email.to_lowercase() != previous_email {
            let index = email_key(&account.email);
            if self.get::<AccountId>(&index)?.is_some() {
                return Err(StoreError::Duplicate(Constraint::AccountEmail));
            }
            self.set(&index, id)?;
            self.delete(&email_key(&previous_email))?;
        }
        self.set(&key, &account)?;
        Ok(Some(account))
    }

    fn find_account(&self, id: &AccountId) -> StoreResult<Option<Account>> {
        Ok(self.get(&account_key(id))?)
    }

    fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        match self.get::<AccountId>(&email_key(email))? {
            Some(id) => self.find_account(&id),
            None => Ok(None),
        }
    }

    fn delete_account(&self, id: &AccountId) -> StoreResult<bool> {
        let key = account_key(id);
        let Some(account) = self.get::<Account>(&key)? else {
            return Ok(false);
        };

        for post in self.author_posts(id)? {
            self.delete(&post_key(&post.id))?;
        }
        for followed in self.ids(&followings_key(id))? {
            let mut followers = self.ids(&followers_key(&followed))?;
            followers.retain(|f| f != id);
            self.set(&followers_key(&followed), &followers)?;
        }
        for follower in self.ids(&followers_key(id))? {
            let mut followings = self.ids(&followings_key(&follower))?;
            followings.retain(|f| f != id);
            self.set(&followings_key(&follower), &followings)?;
        }

        for k in [
            posts_by_key(id),
            followings_key(id),
            followers_key(id),
            email_key(&account.email),
            key,
        ] {
            self.delete(&k)?;
        }

        let mut accounts = self.list(ACCOUNTS_LIST_KEY)?;
        let id_str = id.to_string();
        accounts.retain(|a| *a != id_str);
        self.set(ACCOUNTS_LIST_KEY, &accounts)?;
        Ok(true)
    }

    fn insert_post(&self, post: &Post) -> StoreResult<()> {
        self.set(&post_key(&post.id), post)?;

        let index = posts_by_key(&post.author_id);
        let mut post_ids: Vec<PostId> = self.get(&index)?.unwrap_or_default();
        post_ids.insert(0, post.id); // prepend newest
        self.set(&index, &post_ids)?;
        Ok(())
    }

    fn find_post(&self, id: &PostId) -> StoreResult<Option<Post>> {
        Ok(self.get(&post_key(id))?)
    }

    fn delete_post(&self, id: &PostId) -> StoreResult<bool> {
        let key = post_key(id);
        let Some(post) = self.get::<Post>(&key)? else {
            return Ok(false);
        };
        self.delete(&key)?;

        let index = posts_by_key(&post.author_id);
        let mut post_ids: Vec<PostId> = self.get(&index)?.unwrap_or_default();
        post_ids.retain(|p| p != id);
        self.set(&index, &post_ids)?;
        Ok(true)
    }

    fn posts(&self, query: &PostQuery) -> StoreResult<Vec<Post>> {
        let mut posts = match query.authors {
            AuthorScope::Only(author_id) => self.author_posts(&author_id)?,
            AuthorScope::FeedOf(account_id) => {
                let mut posts = self.author_posts(&account_id)?;
                for followed in self.ids(&followings_key(&account_id))? {
                    posts.extend(self.author_posts(&followed)?);
                }
                posts
            }
        };
        query.sort(&mut posts);
        Ok(posts)
    }

    fn insert_edge(&self, edge: &FollowEdge) -> StoreResult<()> {
        let key = followings_key(&edge.follower_id);
        let mut followings: Followings = self.ids(&key)?;
        if followings.contains(&edge.followed_id) {
            return Err(StoreError::Duplicate(Constraint::FollowEdge));
        }
        followings.push(edge.followed_id);
        self.set(&key, &followings)?;

        let key = followers_key(&edge.followed_id);
        let mut followers: Followers = self.ids(&key)?;
        followers.push(edge.follower_id);
        self.set(&key, &followers)?;
        Ok(())
    }

    fn delete_edge(&self, follower_id: &AccountId, followed_id: &AccountId) -> StoreResult<bool> {
        let key = followings_key(follower_id);
        let mut followings = self.ids(&key)?;
        let before = followings.len();
        followings.retain(|id| id != followed_id);
        if followings.len() == before {
            return Ok(false);
        }
        self.set(&key, &followings)?;

        let key = followers_key(followed_id);
        let mut followers = self.ids(&key)?;
        followers.retain(|id| id != follower_id);
        self.set(&key, &followers)?;
        Ok(true)
    }

    fn edge_exists(&self, follower_id: &AccountId, followed_id: &AccountId) -> StoreResult<bool> {
        Ok(self.ids(&followings_key(follower_id))?.contains(followed_id))
    }

    fn followed_ids(&self, follower_id: &AccountId) -> StoreResult<Vec<AccountId>> {
        Ok(self.ids(&followings_key(follower_id))?)
    }

    fn follower_ids(&self, followed_id: &AccountId) -> StoreResult<Vec<AccountId>> {
        Ok(self.ids(&followers_key(followed_id))?)
    }
}

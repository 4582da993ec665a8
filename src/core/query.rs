use std::cmp::Ordering;

use crate::models::models::{AccountId, Post};

/// Which authors a post listing draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorScope {
    /// Posts written by one account.
    Only(AccountId),
    /// Posts written by the account or anyone it follows.
    FeedOf(AccountId),
}

impl AuthorScope {
    /// Membership test against the follow relation, evaluated per post by the
    /// store. `follows(a, b)` answers "does `a` follow `b`".
    pub fn admits<F>(&self, author_id: &AccountId, follows: F) -> bool
    where
        F: Fn(&AccountId, &AccountId) -> bool,
    {
        match self {
            AuthorScope::Only(id) => author_id == id,
            AuthorScope::FeedOf(id) => author_id == id || follows(id, author_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostOrder {
    /// `created_at DESC, id DESC`
    #[default]
    NewestFirst,
}

impl PostOrder {
    pub fn compare(&self, a: &Post, b: &Post) -> Ordering {
        match self {
            PostOrder::NewestFirst => b
                .created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id)),
        }
    }
}

/// A post listing handed to the store in one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostQuery {
    pub authors: AuthorScope,
    pub order: PostOrder,
}

impl PostQuery {
    pub fn authored_by(author_id: AccountId) -> Self {
        Self {
            authors: AuthorScope::Only(author_id),
            order: PostOrder::NewestFirst,
        }
    }

    pub fn feed_of(account_id: AccountId) -> Self {
        Self {
            authors: AuthorScope::FeedOf(account_id),
            order: PostOrder::NewestFirst,
        }
    }

    pub fn sort(&self, posts: &mut [Post]) {
        posts.sort_by(|a, b| self.order.compare(a, b));
    }
}

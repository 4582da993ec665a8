use tracing::{info, warn};

use crate::core::db::{Constraint, Persistence, StoreError};
use crate::core::errors::{CoreError, Field};
use crate::core::helpers::Clock;
use crate::models::models::{AccountId, FollowEdge, Followers, Followings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FollowCounts {
    pub following: usize,
    pub followers: usize,
}

/// Makes `follower_id` follow `followed_id`. Following twice leaves one edge;
/// a duplicate reported by the store's unique constraint is not an error.
pub fn follow_user<S: Persistence + ?Sized>(
    store: &S,
    clock: &dyn Clock,
    follower_id: &AccountId,
    followed_id: &AccountId,
) -> Result<(), CoreError> {
    if follower_id == followed_id {
        return Err(CoreError::validation(Field::Followed, "can't be yourself"));
    }
    if store.find_account(follower_id)?.is_none() {
        return Err(CoreError::NotFound("Follower"));
    }
    if store.find_account(followed_id)?.is_none() {
        return Err(CoreError::NotFound("Target user"));
    }

    let edge = FollowEdge {
        follower_id: *follower_id,
        followed_id: *followed_id,
        created_at: clock.now(),
    };
    match store.insert_edge(&edge) {
        Ok(()) => {
            info!("{follower_id} followed {followed_id}");
            Ok(())
        }
        Err(StoreError::Duplicate(Constraint::FollowEdge)) => Ok(()),
        Err(e) => {
            warn!("Error storing follow edge {follower_id} -> {followed_id}: {e}");
            Err(e.into())
        }
    }
}

/// Removes the edge if present; unfollowing someone you don't follow is a no-op.
pub fn unfollow_user<S: Persistence + ?Sized>(
    store: &S,
    follower_id: &AccountId,
    followed_id: &AccountId,
) -> Result<(), CoreError> {
    if store.delete_edge(follower_id, followed_id)? {
        info!("{follower_id} unfollowed {followed_id}");
    }
    Ok(())
}

pub fn is_following<S: Persistence + ?Sized>(
    store: &S,
    follower_id: &AccountId,
    followed_id: &AccountId,
) -> Result<bool, CoreError> {
    Ok(store.edge_exists(follower_id, followed_id)?)
}

/// Ids only, straight from the edge relation.
pub fn get_followings<S: Persistence + ?Sized>(
    store: &S,
    account_id: &AccountId,
) -> Result<Followings, CoreError> {
    Ok(store.followed_ids(account_id)?)
}

pub fn get_followers<S: Persistence + ?Sized>(
    store: &S,
    account_id: &AccountId,
) -> Result<Followers, CoreError> {
    Ok(store.follower_ids(account_id)?)
}

pub fn follow_counts<S: Persistence + ?Sized>(
    store: &S,
    account_id: &AccountId,
) -> Result<FollowCounts, CoreError> {
    Ok(FollowCounts {
        following: store.followed_ids(account_id)?.len(),
        followers: store.follower_ids(account_id)?.len(),
    })
}

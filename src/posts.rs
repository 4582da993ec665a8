use tracing::{info, warn};

use crate::config::*;
use crate::core::db::Persistence;
use crate::core::errors::{CoreError, Field};
use crate::core::helpers::Clock;
use crate::core::query::PostQuery;
use crate::models::models::{AccountId, Picture, Post, PostId};

#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub content: String,
    pub picture: Option<Picture>,
}

/// Trims and checks post content, returning what will be stored.
pub fn validate_content(content: &str) -> Result<String, CoreError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(CoreError::validation(Field::Content, "can't be blank"));
    }
    if content.chars().count() > MAX_POST_LENGTH {
        return Err(CoreError::validation(
            Field::Content,
            format!("is too long (maximum is {} characters)", MAX_POST_LENGTH),
        ));
    }
    Ok(content.to_string())
}

pub fn validate_picture(picture: &Picture) -> Result<(), CoreError> {
    if picture.size_bytes > MAX_PICTURE_BYTES {
        return Err(CoreError::validation(Field::Picture, "should be less than 5MB"));
    }
    Ok(())
}

pub fn create_post<S: Persistence + ?Sized>(
    store: &S,
    clock: &dyn Clock,
    author_id: &AccountId,
    new_post: NewPost,
) -> Result<Post, CoreError> {
    let content = validate_content(&new_post.content)?;
    if let Some(picture) = &new_post.picture {
        validate_picture(picture)?;
    }
    if store.find_account(author_id)?.is_none() {
        warn!("Post attempted by unknown account {author_id}");
        return Err(CoreError::validation(Field::Author, "must exist"));
    }

    let post = Post {
        id: PostId::new(),
        author_id: *author_id,
        content,
        picture: new_post.picture,
        created_at: clock.now(),
    };
    store.insert_post(&post)?;

    info!("Account {author_id} created post {}", post.id);
    Ok(post)
}

/// Only the author may delete a post.
pub fn delete_post<S: Persistence + ?Sized>(
    store: &S,
    actor_id: &AccountId,
    post_id: &PostId,
) -> Result<(), CoreError> {
    let Some(post) = store.find_post(post_id)? else {
        return Err(CoreError::NotFound("Post"));
    };
    if post.author_id != *actor_id {
        warn!("Account {actor_id} tried to delete post {post_id} of {}", post.author_id);
        return Err(CoreError::Forbidden);
    }

    store.delete_post(post_id)?;
    Ok(())
}

/// Posts by the account and everyone it follows, newest first.
pub fn get_feed<S: Persistence + ?Sized>(
    store: &S,
    account_id: &AccountId,
) -> Result<Vec<Post>, CoreError> {
    Ok(store.posts(&PostQuery::feed_of(*account_id))?)
}

/// A single account's posts, newest first.
pub fn list_posts<S: Persistence + ?Sized>(
    store: &S,
    author_id: &AccountId,
) -> Result<Vec<Post>, CoreError> {
    Ok(store.posts(&PostQuery::authored_by(*author_id))?)
}

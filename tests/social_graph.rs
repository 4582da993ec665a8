mod common;

use chrono::Duration;
use common::{activated, lifecycle, TestLifecycle};
use murmur_core::core::db::{init_sample_data, reset_sample_data, SAMPLE_PASSWORD};
use murmur_core::core::query::{AuthorScope, PostQuery};
use murmur_core::follow::{
    follow_counts, follow_user, get_followers, get_followings, is_following, unfollow_user,
    FollowCounts,
};
use murmur_core::posts::{create_post, delete_post, get_feed, list_posts, NewPost};
use murmur_core::{Account, AccountId, CoreError, Field, Persistence, Picture, Post};

fn post(lifecycle: &TestLifecycle, author: &Account, content: &str) -> Post {
    create_post(
        lifecycle.store(),
        lifecycle.clock(),
        &author.id,
        NewPost {
            content: content.to_string(),
            picture: None,
        },
    )
    .expect("post")
}

fn follow(lifecycle: &TestLifecycle, follower: &Account, followed: &Account) {
    follow_user(lifecycle.store(), lifecycle.clock(), &follower.id, &followed.id)
        .expect("follow");
}

fn contents(posts: &[Post]) -> Vec<&str> {
    posts.iter().map(|p| p.content.as_str()).collect()
}

#[test]
fn test_follow_and_unfollow() {
    let (lifecycle, _clock) = lifecycle();
    let alice = activated(&lifecycle, "Alice", "alice@example.com");
    let bob = activated(&lifecycle, "Bob", "bob@example.com");
    let store = lifecycle.store();

    assert!(!is_following(store, &alice.id, &bob.id).unwrap());

    follow(&lifecycle, &alice, &bob);
    assert!(is_following(store, &alice.id, &bob.id).unwrap());
    assert!(!is_following(store, &bob.id, &alice.id).unwrap());
    assert_eq!(get_followings(store, &alice.id).unwrap(), vec![bob.id]);
    assert_eq!(get_followers(store, &bob.id).unwrap(), vec![alice.id]);

    unfollow_user(store, &alice.id, &bob.id).unwrap();
    assert!(!is_following(store, &alice.id, &bob.id).unwrap());
    assert!(get_followers(store, &bob.id).unwrap().is_empty());
}

#[test]
fn test_follow_is_idempotent() {
    let (lifecycle, _clock) = lifecycle();
    let alice = activated(&lifecycle, "Alice", "alice@example.com");
    let bob = activated(&lifecycle, "Bob", "bob@example.com");

    follow(&lifecycle, &alice, &bob);
    follow(&lifecycle, &alice, &bob);
    assert_eq!(lifecycle.store().edge_count().unwrap(), 1);

    // Unfollowing twice, or someone never followed, is harmless
    unfollow_user(lifecycle.store(), &alice.id, &bob.id).unwrap();
    unfollow_user(lifecycle.store(), &alice.id, &bob.id).unwrap();
    unfollow_user(lifecycle.store(), &bob.id, &alice.id).unwrap();
    assert_eq!(lifecycle.store().edge_count().unwrap(), 0);
}

#[test]
fn test_follow_rejects_self_and_unknown_accounts() {
    let (lifecycle, _clock) = lifecycle();
    let alice = activated(&lifecycle, "Alice", "alice@example.com");
    let (store, clock) = (lifecycle.store(), lifecycle.clock());
    let ghost = AccountId::new();

    let err = follow_user(store, clock, &alice.id, &alice.id).unwrap_err();
    assert!(matches!(
        err,
        CoreError::ValidationFailed { field: Field::Followed, .. }
    ));

    let err = follow_user(store, clock, &alice.id, &ghost).unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    let err = follow_user(store, clock, &ghost, &alice.id).unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    assert_eq!(lifecycle.store().edge_count().unwrap(), 0);
}

#[test]
fn test_follow_counts() {
    let (lifecycle, _clock) = lifecycle();
    let alice = activated(&lifecycle, "Alice", "alice@example.com");
    let bob = activated(&lifecycle, "Bob", "bob@example.com");
    let carol = activated(&lifecycle, "Carol", "carol@example.com");

    follow(&lifecycle, &alice, &bob);
    follow(&lifecycle, &carol, &bob);
    follow(&lifecycle, &bob, &alice);

    assert_eq!(
        follow_counts(lifecycle.store(), &bob.id).unwrap(),
        FollowCounts {
            following: 1,
            followers: 2
        }
    );
    assert_eq!(
        follow_counts(lifecycle.store(), &carol.id).unwrap(),
        FollowCounts {
            following: 1,
            followers: 0
        }
    );

    let mut followers = get_followers(lifecycle.store(), &bob.id).unwrap();
    let mut expected = vec![alice.id, carol.id];
    followers.sort();
    expected.sort();
    assert_eq!(followers, expected);
}

#[test]
fn test_feed_contains_self_and_followed_only() {
    let (lifecycle, clock) = lifecycle();
    let alice = activated(&lifecycle, "Alice", "alice@example.com");
    let bob = activated(&lifecycle, "Bob", "bob@example.com");
    let carol = activated(&lifecycle, "Carol", "carol@example.com");

    post(&lifecycle, &alice, "alice 1");
    clock.advance(Duration::minutes(1));
    post(&lifecycle, &bob, "bob 1");
    clock.advance(Duration::minutes(1));
    post(&lifecycle, &carol, "carol 1");
    clock.advance(Duration::minutes(1));
    post(&lifecycle, &alice, "alice 2");

    follow(&lifecycle, &alice, &bob);

    let feed = get_feed(lifecycle.store(), &alice.id).unwrap();
    assert_eq!(contents(&feed), vec!["alice 2", "bob 1", "alice 1"]);

    // Following is one-way
    let feed = get_feed(lifecycle.store(), &bob.id).unwrap();
    assert_eq!(contents(&feed), vec!["bob 1"]);

    unfollow_user(lifecycle.store(), &alice.id, &bob.id).unwrap();
    let feed = get_feed(lifecycle.store(), &alice.id).unwrap();
    assert_eq!(contents(&feed), vec!["alice 2", "alice 1"]);
}

#[test]
fn test_feed_of_account_without_posts_or_follows_is_empty() {
    let (lifecycle, _clock) = lifecycle();
    let alice = activated(&lifecycle, "Alice", "alice@example.com");

    assert!(get_feed(lifecycle.store(), &alice.id).unwrap().is_empty());
    assert!(get_feed(lifecycle.store(), &AccountId::new()).unwrap().is_empty());
}

#[test]
fn test_posts_with_equal_timestamps_order_by_id() {
    let (lifecycle, _clock) = lifecycle();
    let alice = activated(&lifecycle, "Alice", "alice@example.com");

    for i in 0..5 {
        post(&lifecycle, &alice, &format!("post {}", i));
    }

    let posts = list_posts(lifecycle.store(), &alice.id).unwrap();
    assert_eq!(posts.len(), 5);
    for pair in posts.windows(2) {
        assert_eq!(pair[0].created_at, pair[1].created_at);
        assert!(pair[0].id > pair[1].id);
    }

    // Same order on every call
    let again = list_posts(lifecycle.store(), &alice.id).unwrap();
    assert_eq!(posts, again);
}

#[test]
fn test_list_posts_is_limited_to_author() {
    let (lifecycle, clock) = lifecycle();
    let alice = activated(&lifecycle, "Alice", "alice@example.com");
    let bob = activated(&lifecycle, "Bob", "bob@example.com");
    follow(&lifecycle, &alice, &bob);

    post(&lifecycle, &alice, "older");
    clock.advance(Duration::seconds(30));
    post(&lifecycle, &bob, "bob's");
    clock.advance(Duration::seconds(30));
    post(&lifecycle, &alice, "newer");

    let posts = list_posts(lifecycle.store(), &alice.id).unwrap();
    assert_eq!(contents(&posts), vec!["newer", "older"]);
}

#[test]
fn test_post_validation() {
    let (lifecycle, _clock) = lifecycle();
    let alice = activated(&lifecycle, "Alice", "alice@example.com");
    let make = |author: &AccountId, content: &str, picture: Option<Picture>| {
        create_post(
            lifecycle.store(),
            lifecycle.clock(),
            author,
            NewPost {
                content: content.to_string(),
                picture,
            },
        )
    };

    let err = make(&alice.id, "   ", None).unwrap_err();
    assert!(matches!(
        err,
        CoreError::ValidationFailed { field: Field::Content, .. }
    ));

    let err = make(&alice.id, &"a".repeat(141), None).unwrap_err();
    assert!(matches!(
        err,
        CoreError::ValidationFailed { field: Field::Content, .. }
    ));

    let err = make(&AccountId::new(), "hello", None).unwrap_err();
    assert!(matches!(
        err,
        CoreError::ValidationFailed { field: Field::Author, .. }
    ));

    let oversized = Picture {
        file_name: "huge.png".to_string(),
        size_bytes: 5 * 1024 * 1024 + 1,
    };
    let err = make(&alice.id, "look", Some(oversized)).unwrap_err();
    assert!(matches!(
        err,
        CoreError::ValidationFailed { field: Field::Picture, .. }
    ));

    assert_eq!(lifecycle.store().post_count().unwrap(), 0);

    // Exactly at the limits is fine; content is stored trimmed
    let post = make(&alice.id, &format!("  {}  ", "a".repeat(140)), None).unwrap();
    assert_eq!(post.content.len(), 140);
    let picture = Picture {
        file_name: "ok.png".to_string(),
        size_bytes: 5 * 1024 * 1024,
    };
    let post = make(&alice.id, "with picture", Some(picture.clone())).unwrap();
    assert_eq!(post.picture, Some(picture));
}

#[test]
fn test_delete_post() {
    let (lifecycle, _clock) = lifecycle();
    let alice = activated(&lifecycle, "Alice", "alice@example.com");
    let bob = activated(&lifecycle, "Bob", "bob@example.com");
    let mine = post(&lifecycle, &alice, "mine");

    let err = delete_post(lifecycle.store(), &bob.id, &mine.id).unwrap_err();
    assert!(matches!(err, CoreError::Forbidden));
    assert!(lifecycle.store().find_post(&mine.id).unwrap().is_some());

    delete_post(lifecycle.store(), &alice.id, &mine.id).unwrap();
    assert!(lifecycle.store().find_post(&mine.id).unwrap().is_none());

    let err = delete_post(lifecycle.store(), &alice.id, &mine.id).unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[test]
fn test_destroy_account_cascades() {
    let (lifecycle, _clock) = lifecycle();
    let alice = activated(&lifecycle, "Alice", "alice@example.com");
    let bob = activated(&lifecycle, "Bob", "bob@example.com");
    let carol = activated(&lifecycle, "Carol", "carol@example.com");

    post(&lifecycle, &alice, "alice");
    post(&lifecycle, &bob, "bob");
    follow(&lifecycle, &alice, &bob);
    follow(&lifecycle, &bob, &alice);
    follow(&lifecycle, &carol, &bob);

    lifecycle.destroy_account(&bob.id).unwrap();

    assert_eq!(lifecycle.store().post_count().unwrap(), 1);
    assert_eq!(lifecycle.store().edge_count().unwrap(), 0);
    assert!(get_followings(lifecycle.store(), &carol.id).unwrap().is_empty());
    assert_eq!(
        contents(&get_feed(lifecycle.store(), &alice.id).unwrap()),
        vec!["alice"]
    );
}

#[test]
fn test_author_scope_membership() {
    let (me, friend, stranger) = (AccountId::new(), AccountId::new(), AccountId::new());
    let follows = |a: &AccountId, b: &AccountId| *a == me && *b == friend;

    let feed = PostQuery::feed_of(me).authors;
    assert!(feed.admits(&me, follows));
    assert!(feed.admits(&friend, follows));
    assert!(!feed.admits(&stranger, follows));

    let only = AuthorScope::Only(friend);
    assert!(only.admits(&friend, follows));
    assert!(!only.admits(&me, follows));
}

#[test]
fn test_init_sample_data_is_idempotent() {
    let (lifecycle, _clock) = lifecycle();
    let seed = || {
        init_sample_data(lifecycle.store(), lifecycle.credentials(), lifecycle.clock()).unwrap()
    };

    let first = seed();
    let second = seed();
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);

    let store = lifecycle.store();
    assert_eq!(store.account_count().unwrap(), 3);
    assert_eq!(store.post_count().unwrap(), 4);
    assert_eq!(store.edge_count().unwrap(), 1);
    assert!(is_following(store, &first[0], &first[2]).unwrap());

    let test_user = lifecycle
        .authenticate("test@example.com", SAMPLE_PASSWORD)
        .unwrap();
    assert!(test_user.activated);
    assert_eq!(get_feed(store, &test_user.id).unwrap().len(), 2);

    assert_eq!(reset_sample_data(store).unwrap(), 3);
    assert_eq!(store.account_count().unwrap(), 0);
    assert_eq!(store.post_count().unwrap(), 0);
    assert_eq!(store.edge_count().unwrap(), 0);
    assert_eq!(reset_sample_data(store).unwrap(), 0);
}

#[test]
fn test_sample_data_leaves_other_accounts_alone() {
    let (lifecycle, _clock) = lifecycle();
    let dana = activated(&lifecycle, "Dana", "dana@example.com");
    post(&lifecycle, &dana, "still here");

    init_sample_data(lifecycle.store(), lifecycle.credentials(), lifecycle.clock()).unwrap();
    reset_sample_data(lifecycle.store()).unwrap();

    assert!(lifecycle.find_account(&dana.id).unwrap().is_some());
    assert_eq!(
        contents(&list_posts(lifecycle.store(), &dana.id).unwrap()),
        vec!["still here"]
    );
}

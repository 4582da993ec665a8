//! Credential and social-graph engine behind the Murmur microblog.
//!
//! The request layer owns routing, rendering and cookies. It calls into
//! [`auth::AccountLifecycle`] for accounts and tokens, [`follow`] for the
//! follow graph and [`posts`] for posting and the feed, handing over a
//! [`core::db::Persistence`] implementation and a [`mailer::Mailer`].

pub mod auth;
pub mod config;
pub mod core;
pub mod credentials;
pub mod follow;
pub mod mailer;
pub mod models;
pub mod posts;
pub mod tokens;
pub mod users;

pub use crate::auth::{AccountLifecycle, Activation, PresentedCookie, RememberCookie, Session};
pub use crate::config::Config;
pub use crate::core::db::{Persistence, StoreError};
pub use crate::core::errors::{CoreError, Field};
pub use crate::core::memory::MemoryStore;
pub use crate::credentials::{CredentialStore, HashCost};
pub use crate::models::models::{Account, AccountId, FollowEdge, Picture, Post, PostId};
pub use crate::tokens::{Token, TokenKind, TokenLedger};

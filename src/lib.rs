//! Client library for a community social network running entirely on a
//! hosted database/auth/storage backend.
//!
//! Every repository module (`posts`, `comments`, `users`, `follow`,
//! `interactions`) is a thin pass-through of CRUD calls against the
//! [`store::Store`] trait, reshaping wire rows into the view models in
//! [`models::models`]. The backend owns all authoritative state; this
//! crate holds nothing beyond what a caller keeps on screen.
//!
//! Construct a [`store::http::HttpStore`] for the real backend, or a
//! [`store::memory::MemoryStore`] for tests, and pass it into the
//! repository functions:
//!
//! ```no_run
//! # async fn demo() -> sangat::Result<()> {
//! let store = sangat::HttpStore::from_env()?;
//! let page = sangat::posts::get_all(&store, 20, 0).await?;
//! # Ok(()) }
//! ```

pub mod comments;
pub mod config;
pub mod core;
pub mod demo;
pub mod feed;
pub mod follow;
pub mod interactions;
pub mod models;
pub mod posts;
pub mod storage;
pub mod store;
pub mod users;

pub use config::StoreConfig;
pub use core::errors::{ApiError, Result};
pub use feed::{Feed, FeedState};
pub use store::http::HttpStore;
pub use store::memory::MemoryStore;
pub use store::{AuthUser, Filter, Join, JoinKind, Order, SelectQuery, Store};

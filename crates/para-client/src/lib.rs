//! # para-client
//!
//! Async Rust client for the [Para](https://paraio.org) backend server —
//! a multi-tenant data store with full-text search, object linking, and
//! per-resource permissions, exposed over a REST/JSON API.
//!
//! The client translates method calls into HTTP requests and responses
//! back into [`ParaObject`] values. Requests are authenticated with one
//! of three mechanisms, selected automatically:
//!
//! - **HMAC-signed** (AWS Signature V4 format) when an access key and
//!   secret key are configured;
//! - **bearer JWT** when a user has signed in through
//!   [`ParaClient::sign_in`], with silent token refresh;
//! - **anonymous** otherwise, relying on server-side guest permissions.
//!
//! ## Example
//!
//! ```no_run
//! use para_client::{ParaClient, ParaObject};
//!
//! # async fn run() -> Result<(), para_client::ParaError> {
//! let client = ParaClient::with_keys("app:myapp", "mysecret")?;
//!
//! let mut cat = ParaObject::new();
//! cat.type_ = "cat".to_string();
//! cat.name = "Whiskers".to_string();
//! cat.set_property("color", "gray");
//!
//! let created = client.create(&cat).await?;
//! # let _ = created;
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod constraint;
mod error;
mod object;
mod pager;
mod signer;

pub use auth::AuthMode;
pub use client::{
    ConstraintMap, ParaClient, ParaConfig, PermissionMap, DEFAULT_ENDPOINT, DEFAULT_PATH,
};
pub use constraint::Constraint;
pub use error::ParaError;
pub use object::ParaObject;
pub use pager::Pager;

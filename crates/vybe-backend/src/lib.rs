//! Vybe Backend - Remote collaborator contracts
//!
//! Everything durable lives in a hosted backend-as-a-service. This crate
//! describes what we need from it:
//!
//! - [`IdentityProvider`]: sessions, OAuth sign-in/out, auth change stream
//! - record repositories: entitlements, admin membership, assets, downloads
//! - [`ObjectStorage`]: uploads and signed URLs
//!
//! # Example
//!
//! ```rust,ignore
//! use vybe_backend::Backend;
//!
//! let backend = Backend::from_shared(Arc::new(HostedBackend::new(config)));
//! let row = backend.entitlements.find_by_user(&user_id).await?;
//! ```

pub mod error;
pub mod models;
pub mod repo;

pub use error::{BackendError, BackendResult};
pub use models::*;
pub use repo::*;

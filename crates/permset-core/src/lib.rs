//! Resource-scoped permission assignment.
//!
//! [`ResourcePermissionService`] binds friendly permission levels ("View", "Edit",
//! "Admin") or raw action sets to users, teams and built-in roles on one resource
//! type, persisting them through a [`permset_storage::Store`].

mod collaborators;
mod mapper;
mod options;
mod service;

pub use collaborators::*;
pub use mapper::*;
pub use options::*;
pub use service::*;

/// Boxed error returned by injected collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

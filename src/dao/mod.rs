/// Row-level entity definitions.
pub mod models;
/// Remote store abstraction and its backends.
pub mod remote_store;
/// Typed session data access on top of the remote store.
pub mod repository;
/// Backend-agnostic storage errors.
pub mod storage;

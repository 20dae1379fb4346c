// src/state/mod.rs
//! Shared service state: the record model, both stores, the registry
//! of known sources, and the debounced persistence engine they share.

mod persist;
mod record;
mod registry;
mod releases;
mod store;

pub use persist::DebouncedWriter;
pub use record::{OriginInfo, RepoKey, RepositoryRecord};
pub use registry::{InternalPlugin, Registry};
pub use releases::{private_download_url, PluginRelease, ReleaseAsset, ReleaseContext, ReleaseStore};
pub use store::RepositoryStore;

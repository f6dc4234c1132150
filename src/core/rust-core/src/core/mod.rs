//! Core domain types: users and claims, catalog containers, catalog
//! metadata, the cache entry file format and byte pipes.

mod cache_entry;
mod catalog_cache;
mod catalog_container;
mod catalog_metadata;
mod data_pipe;
mod users;

pub use cache_entry::{CacheEntry, Interval, MAX_INTERVAL_COUNT};
pub(crate) use cache_entry::push_merged;
pub use catalog_cache::CatalogCache;
pub use catalog_container::{
    CatalogContainer, CatalogItemRequest, PipelineReference, try_find, try_find_catalog_container,
};
pub use catalog_metadata::CatalogMetadata;
pub use data_pipe::{CatalogItemRequestPipeWriter, DataPipeReader, DataPipeWriter, data_pipe};
pub use users::{NexusClaim, NexusPrincipal, NexusUser, claims};

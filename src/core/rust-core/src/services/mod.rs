//! The data plane services: catalog management, pipeline persistence,
//! controller construction, caching, processing, memory budgeting, read
//! orchestration, jobs and the file database.

mod cache_service;
mod catalog_manager;
mod data_controller_service;
mod data_service;
mod database_service;
mod job_service;
mod memory_tracker;
mod pipeline_service;
mod processing_service;

pub use cache_service::CacheService;
pub use catalog_manager::CatalogManager;
pub use data_controller_service::{DataControllerService, SourceFactory};
pub use data_service::DataService;
pub use database_service::DatabaseService;
pub use job_service::{Job, JobProgress, JobService, JobStatus, JobStatusKind};
pub use memory_tracker::{AllocationToken, DEFAULT_ALLOCATION_FACTOR, MemoryTracker};
pub use pipeline_service::{
    DataSourcePipeline, DataSourceRegistration, InMemoryUserRepository, PipelineRecord,
    PipelineService, UserRepository,
};
pub use processing_service::ProcessingService;

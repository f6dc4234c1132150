use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use base64::{Engine, engine::general_purpose::STANDARD};
use nexus_extensibility::extensibility::DataSource;
use regex::Regex;
use serde_json::Value;

use crate::errors::{NexusError, Result};
use crate::extensibility::DataSourceController;
use crate::options::DataOptions;
use crate::services::{CacheService, DataSourcePipeline, ProcessingService};

/// Instantiates a data source of a registered type.
pub type SourceFactory = Arc<dyn Fn() -> Box<dyn DataSource> + Send + Sync>;

/// Builds initialized [DataSourceController]s from pipelines. Source types
/// are registered by the extension loader; the request configuration
/// arrives base64/JSON-encoded from the transport layer.
pub struct DataControllerService {
    processing_service: Arc<ProcessingService>,
    cache_service: Arc<CacheService>,
    cache_pattern: Option<Regex>,
    factories: RwLock<HashMap<String, SourceFactory>>,
}

impl DataControllerService {
    /// Creates the service.
    pub fn new(
        data_options: &DataOptions,
        processing_service: Arc<ProcessingService>,
        cache_service: Arc<CacheService>,
    ) -> Result<Self> {
        Ok(DataControllerService {
            processing_service,
            cache_service,
            cache_pattern: data_options.compiled_cache_pattern()?,
            factories: RwLock::new(HashMap::new()),
        })
    }

    /// Registers a source type.
    pub fn register_source<F>(&self, type_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn DataSource> + Send + Sync + 'static,
    {
        let mut factories = self
            .factories
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        factories.insert(type_name.into(), Arc::new(factory));
    }

    /// The registered source type names, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let factories = self
            .factories
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut types: Vec<String> = factories.keys().cloned().collect();
        types.sort();

        types
    }

    /// Instantiates the pipeline's sources and hands each its context,
    /// exactly once.
    pub async fn get_controller(
        &self,
        pipeline: &DataSourcePipeline,
        request_configuration: Option<HashMap<String, Value>>,
    ) -> Result<DataSourceController> {
        pipeline.validate()?;

        let mut sources = Vec::with_capacity(pipeline.registrations.len());

        for registration in &pipeline.registrations {
            let factory = {
                let factories = self
                    .factories
                    .read()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());

                factories.get(&registration.r#type).cloned()
            }
            .ok_or_else(|| {
                NexusError::validation(format!(
                    "the data source type {} is not registered",
                    registration.r#type
                ))
            })?;

            sources.push(factory());
        }

        let mut controller = DataSourceController::new(
            sources,
            pipeline.registrations.clone(),
            self.processing_service.clone(),
            self.cache_service.clone(),
            self.cache_pattern.clone(),
        );

        controller.initialize(request_configuration).await?;

        Ok(controller)
    }

    /// Decodes the request configuration header value: base64 over a JSON
    /// object.
    pub fn decode_request_configuration(encoded: &str) -> Result<HashMap<String, Value>> {
        let bytes = STANDARD.decode(encoded).map_err(|error| {
            NexusError::validation(format!("invalid request configuration encoding: {error}"))
        })?;

        serde_json::from_slice(&bytes).map_err(|error| {
            NexusError::validation(format!("invalid request configuration document: {error}"))
        })
    }
}

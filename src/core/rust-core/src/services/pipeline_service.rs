use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use url::Url;
use uuid::Uuid;

use crate::core::NexusUser;
use crate::errors::{NexusError, Result};
use crate::services::DatabaseService;

/// One position of a data source pipeline.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DataSourceRegistration {
    /// The registered source type, resolved through the extension registry.
    pub r#type: String,

    /// An optional URL which points to the data.
    #[serde(default)]
    pub resource_locator: Option<Url>,

    /// The source configuration.
    #[serde(default)]
    pub configuration: Option<HashMap<String, Value>>,

    /// An optional URL with information about the source.
    #[serde(default)]
    pub info_url: Option<String>,
}

/// An ordered, non-empty list of source registrations executed in sequence
/// for one user. The position in the list is the pipeline position of each
/// produced resource.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DataSourcePipeline {
    /// The registrations in pipeline order.
    pub registrations: Vec<DataSourceRegistration>,

    /// An optional regular expression which selects released catalogs.
    #[serde(default)]
    pub release_pattern: Option<String>,

    /// An optional regular expression which selects publicly visible
    /// catalogs.
    #[serde(default)]
    pub visibility_pattern: Option<String>,
}

impl DataSourcePipeline {
    /// Creates a pipeline from a non-empty registration list.
    pub fn new(registrations: Vec<DataSourceRegistration>) -> Result<Self> {
        let pipeline = DataSourcePipeline {
            registrations,
            release_pattern: None,
            visibility_pattern: None,
        };

        pipeline.validate()?;

        Ok(pipeline)
    }

    /// Validates the pipeline invariants.
    pub fn validate(&self) -> Result<()> {
        if self.registrations.is_empty() {
            return Err(NexusError::validation(
                "a pipeline requires at least one registration",
            ));
        }

        Ok(())
    }
}

/// A persisted pipeline with its identifier. A user's pipelines keep their
/// list order across restarts.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PipelineRecord {
    /// The pipeline identifier.
    pub id: Uuid,

    /// The pipeline.
    pub pipeline: DataSourcePipeline,
}

/// The user database boundary: the data plane only needs the users and
/// their claims.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// All known users.
    async fn get_users(&self) -> Result<Vec<NexusUser>>;
}

/// A fixed user set, used by tests and single-node setups.
pub struct InMemoryUserRepository {
    users: Vec<NexusUser>,
}

impl InMemoryUserRepository {
    /// Creates the repository.
    pub fn new(users: Vec<NexusUser>) -> Self {
        InMemoryUserRepository { users }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get_users(&self) -> Result<Vec<NexusUser>> {
        Ok(self.users.clone())
    }
}

/// Manages the per-user pipelines, persisted as one JSON document per user
/// under the configuration directory.
pub struct PipelineService {
    database: Arc<DatabaseService>,
    cache: RwLock<HashMap<String, Vec<(Uuid, Arc<DataSourcePipeline>)>>>,
}

impl PipelineService {
    /// Creates the service.
    pub fn new(database: Arc<DatabaseService>) -> Self {
        PipelineService {
            database,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The pipelines of the given user in list order.
    pub async fn get_pipelines(&self, user_id: &str) -> Result<Vec<(Uuid, Arc<DataSourcePipeline>)>> {
        {
            let cache = self.cache.read().await;

            if let Some(pipelines) = cache.get(user_id) {
                return Ok(pipelines.clone());
            }
        }

        let records = self.database.load_pipeline_records(user_id).await?;

        let pipelines: Vec<(Uuid, Arc<DataSourcePipeline>)> = records
            .into_iter()
            .map(|record| (record.id, Arc::new(record.pipeline)))
            .collect();

        let mut cache = self.cache.write().await;
        cache.insert(user_id.to_string(), pipelines.clone());

        Ok(pipelines)
    }

    /// Appends or replaces a pipeline of the given user.
    pub async fn put_pipeline(
        &self,
        user_id: &str,
        pipeline_id: Uuid,
        pipeline: DataSourcePipeline,
    ) -> Result<()> {
        pipeline.validate()?;

        let mut records = self.database.load_pipeline_records(user_id).await?;

        match records.iter_mut().find(|record| record.id == pipeline_id) {
            Some(record) => record.pipeline = pipeline,
            None => records.push(PipelineRecord {
                id: pipeline_id,
                pipeline,
            }),
        }

        self.database.save_pipeline_records(user_id, &records).await?;
        self.cache.write().await.remove(user_id);

        Ok(())
    }

    /// Deletes a pipeline of the given user.
    pub async fn delete_pipeline(&self, user_id: &str, pipeline_id: Uuid) -> Result<()> {
        let mut records = self.database.load_pipeline_records(user_id).await?;
        let length_before = records.len();

        records.retain(|record| record.id != pipeline_id);

        if records.len() == length_before {
            return Err(NexusError::not_found(format!("the pipeline {pipeline_id}")));
        }

        self.database.save_pipeline_records(user_id, &records).await?;
        self.cache.write().await.remove(user_id);

        Ok(())
    }
}

use std::path::PathBuf;

use chrono::{DateTime, Datelike, Utc};
use nexus_extensibility::data_model::SamplePeriod;
use tracing::debug;

use crate::core::CatalogMetadata;
use crate::errors::{NexusError, Result};
use crate::options::PathsOptions;
use crate::services::pipeline_service::PipelineRecord;

/// Owns the on-disk layout below the configured directories: catalog
/// metadata and attachments, artifacts, cache bucket files and pipeline
/// documents.
pub struct DatabaseService {
    paths: PathsOptions,
}

impl DatabaseService {
    /// Creates the service.
    pub fn new(paths: PathsOptions) -> Self {
        DatabaseService { paths }
    }

    /// The configured directory layout.
    pub fn paths(&self) -> &PathsOptions {
        &self.paths
    }

    /// Flattens a catalog identifier into one path segment.
    pub fn physical_catalog_id(catalog_id: &str) -> String {
        catalog_id.trim_start_matches('/').replace('/', "_")
    }

    // --- catalog metadata ---

    /// Loads the metadata of a catalog; a missing document yields the
    /// default metadata.
    pub async fn load_catalog_metadata(&self, catalog_id: &str) -> Result<CatalogMetadata> {
        let path = self.catalog_metadata_path(catalog_id);

        match tokio::fs::read(&path).await {
            Ok(content) => Ok(serde_json::from_slice(&content)?),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Ok(CatalogMetadata::default())
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Persists the metadata of a catalog.
    pub async fn save_catalog_metadata(
        &self,
        catalog_id: &str,
        metadata: &CatalogMetadata,
    ) -> Result<()> {
        let path = self.catalog_metadata_path(catalog_id);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_vec_pretty(metadata)?;
        tokio::fs::write(&path, content).await?;

        Ok(())
    }

    fn catalog_metadata_path(&self, catalog_id: &str) -> PathBuf {
        self.paths
            .catalogs
            .join(Self::physical_catalog_id(catalog_id))
            .join("metadata.json")
    }

    // --- attachments ---

    /// The attachment identifiers of a catalog, sorted.
    pub async fn enumerate_attachments(&self, catalog_id: &str) -> Result<Vec<String>> {
        let directory = self.attachment_directory(catalog_id);

        let mut attachments = Vec::new();

        let mut entries = match tokio::fs::read_dir(&directory).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(attachments);
            }
            Err(error) => return Err(error.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                let name = entry.file_name().to_string_lossy().to_string();

                if name != "metadata.json" {
                    attachments.push(name);
                }
            }
        }

        attachments.sort();

        Ok(attachments)
    }

    /// Reads an attachment.
    pub async fn read_attachment(
        &self,
        catalog_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>> {
        let path = self.attachment_path(catalog_id, attachment_id)?;

        match tokio::fs::read(&path).await {
            Ok(content) => Ok(content),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Err(
                NexusError::not_found(format!("the attachment {attachment_id}")),
            ),
            Err(error) => Err(error.into()),
        }
    }

    /// Writes an attachment. I/O conflicts surface as `Locked`.
    pub async fn write_attachment(
        &self,
        catalog_id: &str,
        attachment_id: &str,
        content: &[u8],
    ) -> Result<()> {
        let path = self.attachment_path(catalog_id, attachment_id)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&path, content).await.map_err(|error| {
            NexusError::Locked(format!(
                "cannot write the attachment {attachment_id}: {error}"
            ))
        })
    }

    /// Deletes an attachment. I/O conflicts surface as `Locked`.
    pub async fn delete_attachment(&self, catalog_id: &str, attachment_id: &str) -> Result<()> {
        let path = self.attachment_path(catalog_id, attachment_id)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Err(
                NexusError::not_found(format!("the attachment {attachment_id}")),
            ),
            Err(error) => Err(NexusError::Locked(format!(
                "cannot delete the attachment {attachment_id}: {error}"
            ))),
        }
    }

    fn attachment_directory(&self, catalog_id: &str) -> PathBuf {
        self.paths
            .catalogs
            .join(Self::physical_catalog_id(catalog_id))
    }

    fn attachment_path(&self, catalog_id: &str, attachment_id: &str) -> Result<PathBuf> {
        if attachment_id.is_empty()
            || attachment_id.contains('/')
            || attachment_id.contains('\\')
            || attachment_id.contains("..")
        {
            return Err(NexusError::validation(format!(
                "the attachment identifier {attachment_id} is not valid"
            )));
        }

        Ok(self.attachment_directory(catalog_id).join(attachment_id))
    }

    // --- artifacts ---

    /// Opens an artifact for streaming and returns its content length.
    pub async fn open_artifact(&self, artifact_id: &str) -> Result<(tokio::fs::File, u64)> {
        let path = self.artifact_path(artifact_id)?;

        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(NexusError::not_found(format!("the artifact {artifact_id}")));
            }
            Err(error) => return Err(error.into()),
        };

        let length = file.metadata().await?.len();

        Ok((file, length))
    }

    /// Persists an artifact.
    pub async fn write_artifact(&self, artifact_id: &str, content: &[u8]) -> Result<()> {
        let path = self.artifact_path(artifact_id)?;

        tokio::fs::create_dir_all(&self.paths.artifacts).await?;
        tokio::fs::write(&path, content).await?;

        Ok(())
    }

    fn artifact_path(&self, artifact_id: &str) -> Result<PathBuf> {
        if artifact_id.is_empty() || artifact_id.contains('/') || artifact_id.contains("..") {
            return Err(NexusError::validation(format!(
                "the artifact identifier {artifact_id} is not valid"
            )));
        }

        Ok(self.paths.artifacts.join(artifact_id))
    }

    // --- cache buckets ---

    /// The bucket file path
    /// `{cache}/{catalog}/{resource}/{samplePeriodNs}/{yyyy}/{MM}/{dd}/{fileBegin}.bin`.
    pub fn cache_entry_path(
        &self,
        catalog_id: &str,
        resource_id: &str,
        sample_period: &SamplePeriod,
        file_begin: DateTime<Utc>,
    ) -> PathBuf {
        self.paths
            .cache
            .join(Self::physical_catalog_id(catalog_id))
            .join(resource_id)
            .join(sample_period.as_nanos().to_string())
            .join(format!("{:04}", file_begin.year()))
            .join(format!("{:02}", file_begin.month()))
            .join(format!("{:02}", file_begin.day()))
            .join(format!(
                "{}.bin",
                file_begin.format("%Y-%m-%dT%H-%M-%S")
            ))
    }

    /// Deletes all cache buckets of the catalog for the given UTC day,
    /// across every resource and sample period.
    pub async fn clear_cache_entries(
        &self,
        catalog_id: &str,
        day: DateTime<Utc>,
    ) -> Result<()> {
        let catalog_directory = self
            .paths
            .cache
            .join(Self::physical_catalog_id(catalog_id));

        let day_suffix = PathBuf::new()
            .join(format!("{:04}", day.year()))
            .join(format!("{:02}", day.month()))
            .join(format!("{:02}", day.day()));

        let mut resources = match tokio::fs::read_dir(&catalog_directory).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(error) => return Err(error.into()),
        };

        while let Some(resource) = resources.next_entry().await? {
            if !resource.file_type().await?.is_dir() {
                continue;
            }

            let mut periods = tokio::fs::read_dir(resource.path()).await?;

            while let Some(period) = periods.next_entry().await? {
                let day_directory = period.path().join(&day_suffix);

                match tokio::fs::remove_dir_all(&day_directory).await {
                    Ok(()) => {
                        debug!(directory = %day_directory.display(), "cleared cache day");
                    }
                    Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                    Err(error) => return Err(error.into()),
                }
            }
        }

        Ok(())
    }

    // --- pipelines ---

    /// Loads the pipeline records of a user; a missing document yields an
    /// empty list.
    pub async fn load_pipeline_records(&self, user_id: &str) -> Result<Vec<PipelineRecord>> {
        let path = self.pipelines_path(user_id)?;

        match tokio::fs::read(&path).await {
            Ok(content) => Ok(serde_json::from_slice(&content)?),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(error) => Err(error.into()),
        }
    }

    /// Persists the pipeline records of a user.
    pub async fn save_pipeline_records(
        &self,
        user_id: &str,
        records: &[PipelineRecord],
    ) -> Result<()> {
        let path = self.pipelines_path(user_id)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&path, content).await?;

        Ok(())
    }

    fn pipelines_path(&self, user_id: &str) -> Result<PathBuf> {
        if user_id.is_empty() || user_id.contains('/') || user_id.contains("..") {
            return Err(NexusError::validation(format!(
                "the user identifier {user_id} is not valid"
            )));
        }

        Ok(self
            .paths
            .config
            .join("pipelines")
            .join(format!("{user_id}.json")))
    }
}

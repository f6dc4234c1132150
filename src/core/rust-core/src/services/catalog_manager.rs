use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::{CatalogContainer, PipelineReference};
use crate::errors::Result;
use crate::services::{
    DataControllerService, DatabaseService, PipelineService, UserRepository,
};

/// Builds the per-user catalog tree. Users are visited in descending
/// privilege (administrators first) and their pipelines in list order; a
/// registration whose identifier starts with an already-claimed identifier
/// is skipped, so each catalog appears at most once across all users.
pub struct CatalogManager {
    user_repository: Arc<dyn UserRepository>,
    pipeline_service: Arc<PipelineService>,
    controller_service: Arc<DataControllerService>,
    database: Arc<DatabaseService>,
}

impl CatalogManager {
    /// Creates the manager.
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        pipeline_service: Arc<PipelineService>,
        controller_service: Arc<DataControllerService>,
        database: Arc<DatabaseService>,
    ) -> Arc<Self> {
        Arc::new(CatalogManager {
            user_repository,
            pipeline_service,
            controller_service,
            database,
        })
    }

    /// The controller factory.
    pub fn controllers(&self) -> &Arc<DataControllerService> {
        &self.controller_service
    }

    /// The file database.
    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.database
    }

    /// Collects the child containers below the given parent from every
    /// user's pipelines. Failing pipelines are skipped so one broken source
    /// cannot take down the tree.
    pub(crate) async fn get_catalog_containers(
        self: &Arc<Self>,
        parent: &CatalogContainer,
    ) -> Result<Vec<Arc<CatalogContainer>>> {
        let parent_path = if parent.id() == "/" {
            "/".to_string()
        } else {
            format!("{}/", parent.id())
        };

        debug!(parent_path, "collect catalog containers");

        let mut users = self.user_repository.get_users().await?;
        users.sort_by_key(|user| if user.is_admin() { 0 } else { 1 });

        let mut claimed: Vec<String> = Vec::new();
        let mut containers: Vec<Arc<CatalogContainer>> = Vec::new();

        for user in users {
            let pipelines = self.pipeline_service.get_pipelines(&user.id).await?;

            for (pipeline_id, pipeline) in pipelines {
                let controller = match self
                    .controller_service
                    .get_controller(&pipeline, None)
                    .await
                {
                    Ok(controller) => controller,
                    Err(error) => {
                        warn!(
                            user_id = %user.id,
                            %pipeline_id,
                            %error,
                            "skipping pipeline, controller creation failed"
                        );
                        continue;
                    }
                };

                let registrations = match controller
                    .get_catalog_registrations(&parent_path)
                    .await
                {
                    Ok(registrations) => registrations,
                    Err(error) => {
                        warn!(
                            user_id = %user.id,
                            %pipeline_id,
                            %error,
                            "skipping pipeline, registration collection failed"
                        );
                        continue;
                    }
                };

                for registration in registrations {
                    let id = registration.path.as_str().to_string();

                    if claimed
                        .iter()
                        .any(|claimed_id| id.starts_with(claimed_id.as_str()))
                    {
                        debug!(id, "skipping catalog, its identifier is already claimed");
                        continue;
                    }

                    claimed.push(id.clone());

                    let metadata = self
                        .database
                        .load_catalog_metadata(&id)
                        .await
                        .unwrap_or_default();

                    containers.push(CatalogContainer::new(
                        id,
                        registration.title.clone(),
                        registration.is_transient,
                        registration.link_target.clone(),
                        user.clone(),
                        PipelineReference {
                            pipeline_id,
                            pipeline: pipeline.clone(),
                        },
                        metadata,
                        self.clone(),
                    ));
                }
            }
        }

        Ok(containers)
    }
}

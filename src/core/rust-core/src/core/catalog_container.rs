use std::sync::Arc;

use nexus_extensibility::data_model::{
    CatalogItem, Representation, RepresentationKind, ResourceCatalog, ResourcePath,
};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::core::catalog_cache::CatalogCache;
use crate::core::catalog_metadata::CatalogMetadata;
use crate::core::users::NexusUser;
use crate::errors::{NexusError, Result};
use crate::services::{CatalogManager, DataSourcePipeline};
use crate::utilities::CatalogPermissions;

/// The maximum number of soft links followed during catalog resolution.
const MAX_LINK_DEPTH: usize = 10;

/// The pipeline a catalog container was produced by.
#[derive(Clone, Debug)]
pub struct PipelineReference {
    /// The pipeline identifier.
    pub pipeline_id: Uuid,

    /// The pipeline itself.
    pub pipeline: Arc<DataSourcePipeline>,
}

#[derive(Default)]
struct ContainerState {
    child_catalog_containers: Option<Vec<Arc<CatalogContainer>>>,
    lazy_catalog: Option<ResourceCatalog>,
}

/// A node of the catalog tree. Children and the enriched catalog are
/// fetched lazily on first access and kept as long as the root lives;
/// transient nodes refetch on every access.
pub struct CatalogContainer {
    id: String,
    title: Option<String>,
    is_transient: bool,
    link_target: Option<String>,
    owner: Option<NexusUser>,
    pipeline: Option<PipelineReference>,
    catalog_manager: Arc<CatalogManager>,
    metadata: RwLock<CatalogMetadata>,
    state: Mutex<ContainerState>,
}

impl CatalogContainer {
    /// Creates the root container. The root owns no pipeline and no
    /// principal.
    pub fn new_root(catalog_manager: Arc<CatalogManager>) -> Arc<Self> {
        Arc::new(CatalogContainer {
            id: "/".to_string(),
            title: None,
            is_transient: false,
            link_target: None,
            owner: None,
            pipeline: None,
            catalog_manager,
            metadata: RwLock::new(CatalogMetadata::default()),
            state: Mutex::new(ContainerState::default()),
        })
    }

    /// Creates a non-root container.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        title: Option<String>,
        is_transient: bool,
        link_target: Option<String>,
        owner: NexusUser,
        pipeline: PipelineReference,
        metadata: CatalogMetadata,
        catalog_manager: Arc<CatalogManager>,
    ) -> Arc<Self> {
        Arc::new(CatalogContainer {
            id,
            title,
            is_transient,
            link_target,
            owner: Some(owner),
            pipeline: Some(pipeline),
            catalog_manager,
            metadata: RwLock::new(metadata),
            state: Mutex::new(ContainerState::default()),
        })
    }

    /// The catalog identifier, `/` for the root.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The optional title from the registration.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Whether children and catalog are refetched on every access.
    pub fn is_transient(&self) -> bool {
        self.is_transient
    }

    /// The soft-link target, if this container is a soft link.
    pub fn link_target(&self) -> Option<&str> {
        self.link_target.as_deref()
    }

    /// The owning principal, `None` only for the root.
    pub fn owner(&self) -> Option<&NexusUser> {
        self.owner.as_ref()
    }

    /// The producing pipeline, `None` only for the root.
    pub fn pipeline(&self) -> Option<&PipelineReference> {
        self.pipeline.as_ref()
    }

    /// The current metadata.
    pub async fn metadata(&self) -> CatalogMetadata {
        self.metadata.read().await.clone()
    }

    /// Persists new metadata and invalidates the lazily loaded catalog so
    /// overrides take effect on the next access.
    pub async fn update_metadata(&self, metadata: CatalogMetadata) -> Result<()> {
        self.catalog_manager
            .database()
            .save_catalog_metadata(&self.id, &metadata)
            .await?;

        *self.metadata.write().await = metadata;
        self.state.lock().await.lazy_catalog = None;

        Ok(())
    }

    /// The direct children of this node, loaded through the catalog manager
    /// on first access. When permissions are given, unreadable children are
    /// filtered out.
    pub async fn get_child_catalog_containers(
        self: &Arc<Self>,
        permissions: Option<&CatalogPermissions>,
    ) -> Result<Vec<Arc<CatalogContainer>>> {
        let children = {
            let mut state = self.state.lock().await;

            if state.child_catalog_containers.is_none() || self.is_transient {
                let children = self
                    .catalog_manager
                    .get_catalog_containers(self)
                    .await?;

                state.child_catalog_containers = Some(children);
            }

            state.child_catalog_containers.clone().unwrap_or_default()
        };

        match permissions {
            None => Ok(children),
            Some(permissions) => {
                let mut readable = Vec::with_capacity(children.len());

                for child in children {
                    let metadata = child.metadata().await;

                    if permissions.can_read(&child.id, metadata.groups(), child.owner.is_some()) {
                        readable.push(child);
                    }
                }

                Ok(readable)
            }
        }
    }

    /// The enriched catalog of this node, loaded through the pipeline's
    /// source controller on first access. Metadata overrides win over
    /// enriched properties.
    pub async fn get_catalog(self: &Arc<Self>) -> Result<ResourceCatalog> {
        let mut state = self.state.lock().await;

        if state.lazy_catalog.is_none() || self.is_transient {
            let pipeline = self.pipeline.as_ref().ok_or_else(|| {
                NexusError::not_found(format!("the catalog {} has no pipeline", self.id))
            })?;

            let controller = self
                .catalog_manager
                .controllers()
                .get_controller(&pipeline.pipeline, None)
                .await?;

            let mut catalog = controller.get_catalog(&self.id).await?;

            let metadata = self.metadata.read().await;

            if let Some(overrides) = &metadata.overrides {
                let mut properties = catalog.properties.take().unwrap_or_default();

                for (key, value) in overrides {
                    properties.insert(key.clone(), value.clone());
                }

                catalog.properties = Some(properties);
            }

            state.lazy_catalog = Some(catalog);
        }

        state
            .lazy_catalog
            .clone()
            .ok_or_else(|| NexusError::internal("the lazy catalog vanished"))
    }
}

/// A resolved read request: the requested item, its base item when the
/// representation is processed, and the container the catalog lives in.
#[derive(Clone)]
pub struct CatalogItemRequest {
    /// The requested item.
    pub item: CatalogItem,

    /// The base item, present iff the representation is processed.
    pub base_item: Option<CatalogItem>,

    /// The container of the catalog.
    pub container: Arc<CatalogContainer>,
}

impl PartialEq for CatalogItemRequest {
    fn eq(&self, other: &Self) -> bool {
        self.item == other.item
            && self.base_item == other.base_item
            && self.container.id() == other.container.id()
    }
}

impl std::fmt::Debug for CatalogItemRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogItemRequest")
            .field("item", &self.item.to_path())
            .field(
                "base_item",
                &self.base_item.as_ref().map(|item| item.to_path()),
            )
            .field("container", &self.container.id())
            .finish()
    }
}

/// Walks the tree from the root to the container with the given identifier,
/// following soft links through the root. Resolution fails with `NotFound`
/// after ten hops.
pub async fn try_find_catalog_container(
    root: &Arc<CatalogContainer>,
    catalog_id: &str,
) -> Result<Arc<CatalogContainer>> {
    let mut hops = 0;
    let mut target = catalog_id.to_string();

    'resolve: loop {
        let mut current = root.clone();

        while current.id() != target {
            let children = current.get_child_catalog_containers(None).await?;

            let child = children
                .iter()
                .find(|child| {
                    target == child.id() || target.starts_with(&format!("{}/", child.id()))
                })
                .cloned()
                .ok_or_else(|| NexusError::not_found(format!("the catalog {target}")))?;

            if let Some(link_target) = child.link_target() {
                hops += 1;

                if hops >= MAX_LINK_DEPTH {
                    return Err(NexusError::not_found(format!(
                        "the soft link {catalog_id} exceeds the maximum resolution depth"
                    )));
                }

                target = format!("{}{}", link_target, &target[child.id().len()..]);
                continue 'resolve;
            }

            current = child;
        }

        return Ok(current);
    }
}

/// Resolves a resource path into a [CatalogItemRequest]. Processed
/// representations produce a derived FLOAT64 item plus the original base
/// item; repeated calls within one catalog state return equal requests.
/// When a [CatalogCache] is given, catalogs resolved earlier in the same
/// request are reused.
pub async fn try_find(
    root: &Arc<CatalogContainer>,
    resource_path: &str,
    catalog_cache: Option<&CatalogCache>,
) -> Result<CatalogItemRequest> {
    let parsed = resource_path
        .parse::<ResourcePath>()
        .map_err(|error| NexusError::validation(error.to_string()))?;

    let container = try_find_catalog_container(root, &parsed.catalog_id).await?;

    let catalog = match catalog_cache.and_then(|cache| cache.get(container.id())) {
        Some(catalog) => catalog,
        None => {
            let catalog = container.get_catalog().await?;

            match catalog_cache {
                Some(cache) => cache.try_add(catalog),
                None => catalog,
            }
        }
    };

    let resource = catalog
        .find_resource(&parsed.resource_id)
        .ok_or_else(|| {
            NexusError::not_found(format!(
                "the resource {} in catalog {}",
                parsed.resource_id, parsed.catalog_id
            ))
        })?
        .clone();

    if parsed.kind == RepresentationKind::Original {
        let representation_id = parsed.sample_period.to_unit_string();

        let representation = resource
            .find_representation(&representation_id)
            .filter(|representation| representation.kind == RepresentationKind::Original)
            .ok_or_else(|| {
                NexusError::not_found(format!("the representation {representation_id}"))
            })?
            .clone();

        return Ok(CatalogItemRequest {
            item: CatalogItem {
                catalog,
                resource,
                representation,
                parameters: parsed.parameters,
            },
            base_item: None,
            container,
        });
    }

    let base_representation = find_base_representation(&resource, &parsed)?;

    validate_period_relation(&parsed, &base_representation)?;

    let base_item = CatalogItem {
        catalog: catalog.clone(),
        resource: resource.clone(),
        representation: base_representation,
        parameters: None,
    };

    let item = CatalogItem {
        catalog,
        resource,
        representation: Representation::processed(parsed.sample_period, parsed.kind),
        parameters: parsed.parameters,
    };

    Ok(CatalogItemRequest {
        item,
        base_item: Some(base_item),
        container,
    })
}

fn find_base_representation(
    resource: &nexus_extensibility::data_model::Resource,
    parsed: &ResourcePath,
) -> Result<Representation> {
    let originals: Vec<&Representation> = resource
        .representations
        .as_ref()
        .map(|representations| {
            representations
                .as_ref()
                .iter()
                .filter(|representation| representation.kind == RepresentationKind::Original)
                .collect()
        })
        .unwrap_or_default();

    match parsed.base_period {
        Some(base_period) => originals
            .into_iter()
            .find(|representation| representation.sample_period == base_period)
            .cloned()
            .ok_or_else(|| {
                NexusError::not_found(format!(
                    "an original representation with sample period {}",
                    base_period.to_unit_string()
                ))
            }),

        // Without a base fragment the resource must have exactly one
        // original representation to derive from.
        None => match originals.as_slice() {
            [single] => Ok((*single).clone()),
            [] => Err(NexusError::not_found(format!(
                "an original representation of resource {}",
                resource.id
            ))),
            _ => Err(NexusError::validation(format!(
                "the resource {} has multiple original representations, a #base fragment is required",
                resource.id
            ))),
        },
    }
}

fn validate_period_relation(parsed: &ResourcePath, base: &Representation) -> Result<()> {
    let target_ticks = parsed.sample_period.as_nanos();
    let base_ticks = base.sample_period.as_nanos();

    if parsed.kind == RepresentationKind::Resampled {
        if target_ticks > base_ticks || base_ticks % target_ticks != 0 {
            return Err(NexusError::validation(format!(
                "the base period {} is not an integer multiple of the resample period {}",
                base.sample_period.to_unit_string(),
                parsed.sample_period.to_unit_string()
            )));
        }
    } else if target_ticks < base_ticks || target_ticks % base_ticks != 0 {
        return Err(NexusError::validation(format!(
            "the aggregation period {} is not an integer multiple of the base period {}",
            parsed.sample_period.to_unit_string(),
            base.sample_period.to_unit_string()
        )));
    }

    Ok(())
}

use chrono::{DateTime, TimeDelta, Utc};
use nexus_core::core::{NexusClaim, NexusPrincipal, NexusUser, claims, try_find, try_find_catalog_container};
use nexus_core::errors::NexusError;
use nexus_core::utilities::CatalogPermissions;
use serde_json::json;

use crate::test_source::{DATA_CATALOG_ID, build_stack};

#[tokio::test]
async fn resolves_the_catalog_hierarchy_lazily() {
    let stack = build_stack(1024, 2).await;

    let container = try_find_catalog_container(&stack.root, DATA_CATALOG_ID)
        .await
        .unwrap();

    assert_eq!(container.id(), DATA_CATALOG_ID);
    assert_eq!(container.owner().unwrap().id, "admin");
}

#[tokio::test]
async fn soft_links_resolve_through_the_root() {
    let stack = build_stack(1024, 2).await;

    // /SOFT/B -> /SOFT/A -> /A/B/C
    let container = try_find_catalog_container(&stack.root, "/SOFT/B")
        .await
        .unwrap();

    assert_eq!(container.id(), DATA_CATALOG_ID);
}

#[tokio::test]
async fn cyclic_soft_links_fail_after_ten_hops() {
    let stack = build_stack(1024, 2).await;

    let result = try_find_catalog_container(&stack.root, "/SOFT/X").await;

    assert!(matches!(result, Err(NexusError::NotFound(_))));
}

#[tokio::test]
async fn unknown_catalogs_are_not_found() {
    let stack = build_stack(1024, 2).await;

    let result = try_find_catalog_container(&stack.root, "/NO/SUCH").await;

    assert!(matches!(result, Err(NexusError::NotFound(_))));
}

#[tokio::test]
async fn try_find_is_idempotent_within_one_catalog_state() {
    let stack = build_stack(1024, 2).await;
    let path = "/A/B/C/T1/1_min_mean#base=1_s";

    let first = try_find(&stack.root, path, None).await.unwrap();
    let second = try_find(&stack.root, path, None).await.unwrap();

    assert_eq!(first, second);
    assert!(first.base_item.is_some());
}

#[tokio::test]
async fn try_find_validates_the_period_relation() {
    let stack = build_stack(1024, 2).await;

    // 1.5 s is not an integer multiple of the 1 s base.
    let result = try_find(&stack.root, "/A/B/C/T1/1500_ms_mean#base=1_s", None).await;

    assert!(matches!(result, Err(NexusError::Validation(_))));
}

#[tokio::test]
async fn malformed_resource_paths_fail_validation() {
    let stack = build_stack(1024, 2).await;

    let result = try_find(&stack.root, "/A/B/C/T1/1_parsec", None).await;

    assert!(matches!(result, Err(NexusError::Validation(_))));
}

#[tokio::test]
async fn enrichment_stamps_positions_and_dedupes_groups() {
    let stack = build_stack(1024, 2).await;

    let container = try_find_catalog_container(&stack.root, DATA_CATALOG_ID)
        .await
        .unwrap();

    let catalog = container.get_catalog().await.unwrap();
    let resource = catalog.find_resource("T1").unwrap();
    let properties = resource.properties.as_ref().unwrap();

    assert_eq!(properties["nexus.pipeline-position"], json!(0));
    assert_eq!(properties["groups"], json!(["test", "other"]));
    assert_eq!(
        properties["nexus.data-source"]["info-url"],
        json!("https://example.org/test-source")
    );
    assert_eq!(
        properties["nexus.data-source"]["source-type"],
        json!("test")
    );
}

#[tokio::test]
async fn registrations_are_claimed_once_across_users() {
    let stack = build_stack(1024, 2).await;

    // Both users register the same catalogs; the admin claims them first.
    let children = stack.root.get_child_catalog_containers(None).await.unwrap();

    let mut ids: Vec<&str> = children.iter().map(|child| child.id()).collect();
    ids.sort();

    assert_eq!(ids, vec!["/A", "/SOFT"]);

    for child in &children {
        assert_eq!(child.owner().unwrap().id, "admin");
    }
}

#[tokio::test]
async fn enumeration_filters_unreadable_catalogs() {
    let stack = build_stack(1024, 2).await;

    let nobody = NexusUser::new("nobody", "Nobody", Vec::new());
    let principal = NexusPrincipal::for_user(&nobody);
    let permissions = CatalogPermissions::from_principal(&principal);

    let visible = stack
        .root
        .get_child_catalog_containers(Some(&permissions))
        .await
        .unwrap();

    assert!(visible.is_empty());

    let reader = NexusUser::new(
        "reader",
        "Reader",
        vec![NexusClaim::new(claims::CAN_READ_CATALOG, "^/A.*")],
    );
    let principal = NexusPrincipal::for_user(&reader);
    let permissions = CatalogPermissions::from_principal(&principal);

    let visible = stack
        .root
        .get_child_catalog_containers(Some(&permissions))
        .await
        .unwrap();

    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id(), "/A");
}

#[tokio::test]
async fn availability_rejects_requests_beyond_the_step_limit() {
    let stack = build_stack(1024, 2).await;

    let container = try_find_catalog_container(&stack.root, DATA_CATALOG_ID)
        .await
        .unwrap();

    let pipeline = container.pipeline().unwrap().pipeline.clone();
    let controller = stack
        .controller_service
        .get_controller(&pipeline, None)
        .await
        .unwrap();

    let begin = "2020-01-01T00:00:00Z".parse().unwrap();
    let end = "2020-01-02T00:00:00Z".parse().unwrap();

    // 86400 one-second steps are far beyond the limit of 1000.
    let result = controller
        .get_availability(DATA_CATALOG_ID, begin, end, TimeDelta::seconds(1))
        .await;

    assert!(matches!(result, Err(NexusError::Validation(_))));

    // 1000 steps are fine and every bucket reports full availability.
    let values = controller
        .get_availability(DATA_CATALOG_ID, begin, end, TimeDelta::seconds(87))
        .await
        .unwrap();

    assert_eq!(values.len(), 994);
    assert!(values.iter().all(|value| *value == 1.0));
}

#[tokio::test]
async fn time_range_spans_the_source_reports() {
    let stack = build_stack(1024, 2).await;

    let container = try_find_catalog_container(&stack.root, DATA_CATALOG_ID)
        .await
        .unwrap();

    let pipeline = container.pipeline().unwrap().pipeline.clone();
    let controller = stack
        .controller_service
        .get_controller(&pipeline, None)
        .await
        .unwrap();

    let range = controller
        .get_time_range(DATA_CATALOG_ID)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        range.begin,
        "2020-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
    );
    assert_eq!(
        range.end,
        "2021-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
    );

    assert!(controller.get_time_range("/A").await.unwrap().is_none());
}

#[tokio::test]
async fn metadata_updates_override_catalog_properties() {
    let stack = build_stack(1024, 2).await;

    let container = try_find_catalog_container(&stack.root, DATA_CATALOG_ID)
        .await
        .unwrap();

    let mut metadata = container.metadata().await;
    metadata.overrides = Some(
        [("license".to_string(), json!("CC-BY-4.0"))]
            .into_iter()
            .collect(),
    );

    container.update_metadata(metadata.clone()).await.unwrap();

    let catalog = container.get_catalog().await.unwrap();
    assert_eq!(
        catalog.properties.as_ref().unwrap()["license"],
        json!("CC-BY-4.0")
    );

    // The metadata survived in the database.
    assert_eq!(
        stack
            .database
            .load_catalog_metadata(DATA_CATALOG_ID)
            .await
            .unwrap(),
        metadata
    );
}

mod support;

use assert_matches::assert_matches;
use serde_json::json;

use udata_catalog::domain::{ListAction, ListItem, ListParams};
use udata_catalog::error::CatalogError;
use udata_catalog::log::NoopLog;

use support::{FakeCatalog, RecordingLog, anonymous, connector, remote_dataset, remote_resource};

fn catalog_of(count: usize) -> FakeCatalog {
    FakeCatalog::with_datasets(
        (1..=count)
            .map(|index| remote_dataset(&format!("ds{index}"), &format!("Jeu {index}")))
            .collect(),
    )
}

#[test]
fn folder_listing_returns_resources_with_composite_ids() {
    let mut dataset = remote_dataset("ds1", "Budget");
    dataset.description = Some("Budget primitif".to_string());
    let mut csv = remote_resource("r1", "budget.csv", "https://files.test/budget.csv");
    csv.format = Some("csv".to_string());
    csv.filesize = Some(512);
    dataset.resources = vec![
        csv,
        remote_resource("r2", "Notice", "https://files.test/notice"),
    ];
    let connector = connector(FakeCatalog::with_datasets(vec![dataset]));

    let params = ListParams {
        current_folder_id: Some("ds1".to_string()),
        ..ListParams::default()
    };
    let result = connector.list(&params, &NoopLog).unwrap();

    assert_eq!(result.count, 2);
    assert_eq!(result.path.len(), 1);
    assert_eq!(result.path[0].id, "ds1");
    assert_matches!(&result.results[0], ListItem::Resource(resource) => {
        assert_eq!(resource.id.to_string(), "ds1:r1");
        assert_eq!(resource.format, "csv");
        assert_eq!(resource.size, Some(512));
        assert_eq!(resource.description.as_deref(), Some("Budget primitif"));
    });
    assert_matches!(&result.results[1], ListItem::Resource(resource) => {
        assert_eq!(resource.format, "unknown");
    });

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["results"][0]["type"], "resource");
    assert_eq!(json["path"][0]["type"], "folder");
}

#[test]
fn root_listing_has_empty_path_and_folders() {
    let connector = connector(catalog_of(3));
    let result = connector.list(&ListParams::default(), &NoopLog).unwrap();
    assert_eq!(result.count, 3);
    assert!(result.path.is_empty());
    assert!(result.results.iter().all(ListItem::is_folder));
}

#[test]
fn own_datasets_are_paginated_client_side() {
    let connector = connector(catalog_of(25));
    let params = ListParams {
        page: Some(2),
        size: Some(10),
        ..ListParams::default()
    };
    let result = connector.list(&params, &NoopLog).unwrap();

    assert_eq!(result.count, 25);
    let ids = result.results.iter().map(ListItem::id).collect::<Vec<_>>();
    let expected = (11..=20).map(|index| format!("ds{index}")).collect::<Vec<_>>();
    assert_eq!(ids, expected);
}

#[test]
fn show_all_delegates_paging_to_the_catalog() {
    let connector = connector(catalog_of(25));
    let params = ListParams {
        page: Some(3),
        size: Some(10),
        show_all: true,
        organization: Some("org-1".to_string()),
        ..ListParams::default()
    };
    let result = connector.list(&params, &NoopLog).unwrap();

    assert_eq!(result.count, 25);
    assert_eq!(result.results.len(), 5);
    let state = connector.client().state.lock().unwrap();
    assert_eq!(state.searches[0].page, Some(3));
    assert_eq!(state.searches[0].page_size, Some(10));
    assert_eq!(state.searches[0].organization.as_deref(), Some("org-1"));
}

#[test]
fn action_requires_api_key_before_any_request() {
    let connector = anonymous(catalog_of(2));
    let params = ListParams {
        action: Some(ListAction::CreateFolderInRoot),
        ..ListParams::default()
    };
    let err = connector.list(&params, &NoopLog).unwrap_err();
    assert_matches!(err, CatalogError::MissingApiKey(_));
    assert!(connector.client().calls().is_empty());
}

#[test]
fn deleted_datasets_are_tagged_for_replacement() {
    let mut deleted = remote_dataset("old", "Ancien budget");
    deleted.deleted = Some(json!("2024-01-02T00:00:00"));
    let catalog = FakeCatalog::with_datasets(vec![remote_dataset("ds1", "Budget"), deleted]);
    let connector = connector(catalog);

    let hidden = connector.list(&ListParams::default(), &NoopLog).unwrap();
    assert_eq!(hidden.count, 1);

    let params = ListParams {
        action: Some(ListAction::ReplaceFolder),
        ..ListParams::default()
    };
    let shown = connector.list(&params, &NoopLog).unwrap();
    assert_eq!(shown.count, 2);
    assert_eq!(shown.results[1].title(), "[Supprimé] Ancien budget");
}

#[test]
fn resource_actions_skip_datasets_already_linked() {
    let mut linked = remote_dataset("ds1", "Déjà publié");
    linked.resources = vec![remote_resource(
        "r1",
        "Budget - Consultez les données",
        "https://portal.test/datasets/budget",
    )];
    let free = remote_dataset("ds2", "Libre");
    let broken = remote_dataset("ds3", "Inaccessible");
    let catalog = FakeCatalog::with_datasets(vec![linked, free, broken]);
    catalog.fail("get:ds3", 500);
    let connector = connector(catalog);
    let log = RecordingLog::default();

    let params = ListParams {
        action: Some(ListAction::CreateResource),
        ..ListParams::default()
    };
    let result = connector.list(&params, &log).unwrap();

    let ids = result.results.iter().map(ListItem::id).collect::<Vec<_>>();
    assert_eq!(ids, vec!["ds2", "ds3"]);
    assert_eq!(result.count, 2);
    assert_eq!(log.warnings().len(), 1);
}

#[test]
fn search_filters_own_datasets_by_title() {
    let catalog = FakeCatalog::with_datasets(vec![
        remote_dataset("ds1", "Qualité de l'air"),
        remote_dataset("ds2", "Budget"),
    ]);
    let connector = connector(catalog);
    let params = ListParams {
        q: Some("qualite AIR".to_string()),
        ..ListParams::default()
    };
    let result = connector.list(&params, &NoopLog).unwrap();
    assert_eq!(result.count, 1);
    assert_eq!(result.results[0].id(), "ds1");
}

#[test]
fn search_matches_descriptions_of_the_full_collection() {
    let mut described = remote_dataset("ds1", "Mesures 2024");
    described.description = Some("Qualité de l'air en Bretagne".to_string());
    let catalog = FakeCatalog::with_datasets(vec![
        described,
        remote_dataset("ds2", "Budget"),
        remote_dataset("ds3", "Qualite\u{301} de l'air"),
    ]);
    let connector = connector(catalog);
    let params = ListParams {
        q: Some("qualité air".to_string()),
        page: Some(1),
        size: Some(1),
        ..ListParams::default()
    };
    let result = connector.list(&params, &NoopLog).unwrap();
    assert_eq!(result.count, 2);
    assert_eq!(result.results[0].id(), "ds1");
    assert_eq!(connector.client().calls(), vec!["org_datasets"]);
}

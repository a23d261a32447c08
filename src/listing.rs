use crate::app::Connector;
use crate::domain::{
    Folder, ListAction, ListItem, ListParams, ListResult, PathEntry, ResourceListing, ResourceRef,
};
use crate::error::CatalogError;
use crate::log::LogSink;
use crate::publication::VIEW_DATA_TITLE;
use crate::spatial::normalize_name;
use crate::udata::{CatalogClient, DatasetQuery, RemoteDataset};

pub const DELETED_PREFIX: &str = "[Supprimé] ";

impl<C: CatalogClient> Connector<C> {
    pub fn list(&self, params: &ListParams, log: &dyn LogSink) -> Result<ListResult, CatalogError> {
        if params.action.is_some() {
            self.require_api_key("list datasets for publication")?;
        }

        match params.current_folder_id.as_deref().filter(|id| !id.is_empty()) {
            Some(folder_id) => self.list_resources(folder_id),
            None if params.show_all && params.action.is_none() => self.search_all(params),
            None => self.list_own(params, log),
        }
    }

    fn list_resources(&self, folder_id: &str) -> Result<ListResult, CatalogError> {
        let dataset = self.client.get_dataset(folder_id)?;
        let results = resource_listings(&dataset)
            .into_iter()
            .map(ListItem::Resource)
            .collect::<Vec<_>>();
        Ok(ListResult {
            count: results.len() as u64,
            results,
            path: vec![PathEntry {
                id: dataset.id.clone(),
                title: dataset.title.clone(),
            }],
        })
    }

    fn search_all(&self, params: &ListParams) -> Result<ListResult, CatalogError> {
        let window = params.window();
        let query = DatasetQuery {
            q: params.query().map(str::to_string),
            page: window.map(|(page, _)| page),
            page_size: window.map(|(_, size)| size),
            organization: params.organization.clone().filter(|org| !org.is_empty()),
        };
        let page = self.client.search_datasets(&query)?;
        Ok(ListResult {
            count: page.total,
            results: folders(&page.data, params.action),
            path: Vec::new(),
        })
    }

    fn list_own(&self, params: &ListParams, log: &dyn LogSink) -> Result<ListResult, CatalogError> {
        let datasets = self.client.org_datasets()?;
        let mut datasets = retain_visible(datasets, params.action);
        if let Some(q) = params.query() {
            datasets = search_locally(datasets, q);
        }
        if params.action.is_some_and(ListAction::targets_resource) {
            datasets = self.without_placeholder_resources(datasets, log);
        }

        let count = datasets.len() as u64;
        let datasets = match params.window() {
            Some((page, size)) => paginate(datasets, page, size),
            None => datasets,
        };
        Ok(ListResult {
            count,
            results: folders(&datasets, params.action),
            path: Vec::new(),
        })
    }

    fn without_placeholder_resources(
        &self,
        datasets: Vec<RemoteDataset>,
        log: &dyn LogSink,
    ) -> Vec<RemoteDataset> {
        log.task("filter", "Inspecting dataset resources", datasets.len() as u64);
        let mut kept = Vec::with_capacity(datasets.len());
        for (index, dataset) in datasets.into_iter().enumerate() {
            match self.client.get_dataset(&dataset.id) {
                Ok(detail) if has_placeholder_resource(&detail) => {}
                Ok(_) => kept.push(dataset),
                Err(err) => {
                    log.warning(&format!(
                        "Could not inspect dataset {}: {err}, keeping it",
                        dataset.id
                    ));
                    kept.push(dataset);
                }
            }
            log.progress("filter", index as u64 + 1, None);
        }
        kept
    }
}

pub fn resource_listings(dataset: &RemoteDataset) -> Vec<ResourceListing> {
    dataset
        .resources
        .iter()
        .map(|resource| ResourceListing {
            id: ResourceRef::new(dataset.id.as_str(), resource.id.as_str()),
            title: resource.title.clone().unwrap_or_default(),
            description: dataset.description.clone(),
            format: resource
                .format
                .clone()
                .filter(|format| !format.is_empty())
                .unwrap_or_else(|| "unknown".to_string()),
            mime_type: resource.mime.clone(),
            origin: dataset.page.clone(),
            size: resource.filesize,
        })
        .collect()
}

pub fn retain_visible(datasets: Vec<RemoteDataset>, action: Option<ListAction>) -> Vec<RemoteDataset> {
    if action == Some(ListAction::ReplaceFolder) {
        return datasets;
    }
    datasets
        .into_iter()
        .filter(|dataset| !dataset.is_deleted())
        .collect()
}

pub fn search_locally(datasets: Vec<RemoteDataset>, q: &str) -> Vec<RemoteDataset> {
    let wanted = normalize_name(q);
    let words = wanted.split(' ').filter(|word| !word.is_empty()).collect::<Vec<_>>();
    datasets
        .into_iter()
        .filter(|dataset| {
            let text = normalize_name(&format!(
                "{} {}",
                dataset.title,
                dataset.description.as_deref().unwrap_or_default()
            ));
            words.iter().all(|word| text.contains(word))
        })
        .collect()
}

pub fn paginate<T>(items: Vec<T>, page: u64, size: u64) -> Vec<T> {
    let start = page.saturating_sub(1).saturating_mul(size);
    let start = usize::try_from(start).unwrap_or(usize::MAX);
    let size = usize::try_from(size).unwrap_or(usize::MAX);
    items.into_iter().skip(start).take(size).collect()
}

pub fn has_placeholder_resource(dataset: &RemoteDataset) -> bool {
    dataset.resources.iter().any(|resource| {
        resource
            .title
            .as_deref()
            .is_some_and(|title| title.contains(VIEW_DATA_TITLE))
    })
}

fn folders(datasets: &[RemoteDataset], action: Option<ListAction>) -> Vec<ListItem> {
    datasets
        .iter()
        .map(|dataset| {
            let title = if dataset.is_deleted() && action == Some(ListAction::ReplaceFolder) {
                format!("{DELETED_PREFIX}{}", dataset.title)
            } else {
                dataset.title.clone()
            };
            ListItem::Folder(Folder {
                id: dataset.id.clone(),
                title,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(id: &str, title: &str) -> RemoteDataset {
        RemoteDataset {
            id: id.to_string(),
            title: title.to_string(),
            ..RemoteDataset::default()
        }
    }

    #[test]
    fn paginate_slices_one_based_pages() {
        let items = (0..7).collect::<Vec<_>>();
        assert_eq!(paginate(items.clone(), 1, 3), vec![0, 1, 2]);
        assert_eq!(paginate(items.clone(), 3, 3), vec![6]);
        assert!(paginate(items, 4, 3).is_empty());
    }

    #[test]
    fn local_search_is_accent_insensitive() {
        let datasets = vec![
            dataset("a", "Équipements sportifs"),
            dataset("b", "Budget primitif"),
            dataset("c", "Sports et loisirs"),
        ];
        let found = search_locally(datasets, "equipements SPORT");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");
    }

    #[test]
    fn local_search_reads_descriptions_and_decomposed_accents() {
        let mut described = dataset("a", "Budget 2024");
        described.description = Some("Dépenses par équipement".to_string());
        let datasets = vec![described, dataset("b", "E\u{301}quipements publics")];

        let found = search_locally(datasets.clone(), "equipement");
        assert_eq!(found.len(), 2);
        let found = search_locally(datasets, "dépenses");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");
    }

    #[test]
    fn deleted_datasets_only_kept_for_replace_folder() {
        let mut deleted = dataset("gone", "Ancien");
        deleted.deleted = Some(serde_json::json!("2024-01-01T00:00:00"));
        let datasets = vec![dataset("a", "Actif"), deleted];

        assert_eq!(retain_visible(datasets.clone(), None).len(), 1);
        let kept = retain_visible(datasets, Some(ListAction::ReplaceFolder));
        let items = folders(&kept, Some(ListAction::ReplaceFolder));
        assert_eq!(items[1].title(), "[Supprimé] Ancien");
        assert_eq!(items[0].title(), "Actif");
    }
}

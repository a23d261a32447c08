#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::Mutex;

use serde_json::{Value, json};

use udata_catalog::app::Connector;
use udata_catalog::config::{CatalogConfig, Organization};
use udata_catalog::error::CatalogError;
use udata_catalog::log::LogSink;
use udata_catalog::udata::{
    CatalogClient, DatasetPage, DatasetQuery, DownloadInfo, RemoteDataset, RemoteLicense,
    RemoteResource, RemoteUser, SpatialZone,
};

pub const CATALOG_URL: &str = "https://catalog.test";

/// In-memory catalog keeping datasets in insertion order.
#[derive(Default)]
pub struct FakeCatalog {
    pub state: Mutex<FakeState>,
}

#[derive(Default)]
pub struct FakeState {
    pub datasets: Vec<RemoteDataset>,
    pub licenses: Vec<RemoteLicense>,
    pub zones: HashMap<String, Vec<SpatialZone>>,
    pub failing_zones: HashSet<String>,
    pub downloads: HashMap<String, (Vec<u8>, Option<String>)>,
    pub user: Option<RemoteUser>,
    /// Forced status per request key, e.g. `get:ds1` or `delete:ds1/r1`.
    pub failures: HashMap<String, u16>,
    pub calls: Vec<String>,
    pub searches: Vec<DatasetQuery>,
    pub created: Vec<Value>,
    pub updated: Vec<(String, Value)>,
    next_id: u32,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_datasets(datasets: Vec<RemoteDataset>) -> Self {
        let catalog = Self::default();
        catalog.state.lock().unwrap().datasets = datasets;
        catalog
    }

    pub fn fail(&self, key: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(key.to_string(), status);
    }

    pub fn dataset(&self, id: &str) -> Option<RemoteDataset> {
        self.state
            .lock()
            .unwrap()
            .datasets
            .iter()
            .find(|dataset| dataset.id == id)
            .cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, state: &mut FakeState, key: String) -> Result<(), CatalogError> {
        state.calls.push(key.clone());
        match state.failures.get(&key) {
            Some(status) => Err(status_error(*status, &key)),
            None => Ok(()),
        }
    }
}

impl FakeState {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    /// Gives ids to new resources the way the catalog does on write.
    fn assign_resource_ids(&mut self, payload: &mut Value) {
        if let Some(resources) = payload.get_mut("resources").and_then(Value::as_array_mut) {
            for resource in resources {
                if resource.get("id").and_then(Value::as_str).is_none() {
                    let id = self.next("res");
                    resource["id"] = json!(id);
                }
            }
        }
    }
}

impl CatalogClient for FakeCatalog {
    fn current_user(&self) -> Result<RemoteUser, CatalogError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "me".to_string())?;
        state
            .user
            .clone()
            .ok_or_else(|| status_error(401, "me"))
    }

    fn search_datasets(&self, query: &DatasetQuery) -> Result<DatasetPage, CatalogError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "search".to_string())?;
        state.searches.push(query.clone());
        let total = state.datasets.len() as u64;
        let data = match (query.page, query.page_size) {
            (Some(page), Some(size)) => state
                .datasets
                .iter()
                .skip(((page - 1) * size) as usize)
                .take(size as usize)
                .cloned()
                .collect(),
            _ => state.datasets.clone(),
        };
        Ok(DatasetPage { data, total })
    }

    fn org_datasets(&self) -> Result<Vec<RemoteDataset>, CatalogError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "org_datasets".to_string())?;
        Ok(state.datasets.clone())
    }

    fn get_dataset(&self, id: &str) -> Result<RemoteDataset, CatalogError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("get:{id}"))?;
        state
            .datasets
            .iter()
            .find(|dataset| dataset.id == id)
            .cloned()
            .ok_or_else(|| status_error(404, id))
    }

    fn create_dataset(&self, payload: &Value) -> Result<RemoteDataset, CatalogError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "create".to_string())?;
        state.created.push(payload.clone());
        let id = state.next("ds");
        let mut body = payload.clone();
        body["id"] = json!(id);
        body["page"] = json!(format!("{CATALOG_URL}/datasets/{id}/"));
        state.assign_resource_ids(&mut body);
        let dataset: RemoteDataset = serde_json::from_value(body).unwrap();
        state.datasets.push(dataset.clone());
        Ok(dataset)
    }

    fn update_dataset(&self, id: &str, payload: &Value) -> Result<RemoteDataset, CatalogError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("update:{id}"))?;
        state.updated.push((id.to_string(), payload.clone()));
        let mut body = payload.clone();
        body["id"] = json!(id);
        state.assign_resource_ids(&mut body);
        let dataset: RemoteDataset = serde_json::from_value(body).unwrap();
        let slot = state
            .datasets
            .iter_mut()
            .find(|existing| existing.id == id)
            .ok_or_else(|| status_error(404, id))?;
        *slot = dataset.clone();
        Ok(dataset)
    }

    fn delete_dataset(&self, id: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("delete:{id}"))?;
        let before = state.datasets.len();
        state.datasets.retain(|dataset| dataset.id != id);
        if state.datasets.len() == before {
            return Err(status_error(404, id));
        }
        Ok(())
    }

    fn create_resource(
        &self,
        dataset_id: &str,
        payload: &Value,
    ) -> Result<RemoteResource, CatalogError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("create_resource:{dataset_id}"))?;
        let mut body = payload.clone();
        body["id"] = json!(state.next("res"));
        let resource: RemoteResource = serde_json::from_value(body).unwrap();
        let dataset = state
            .datasets
            .iter_mut()
            .find(|dataset| dataset.id == dataset_id)
            .ok_or_else(|| status_error(404, dataset_id))?;
        dataset.resources.push(resource.clone());
        Ok(resource)
    }

    fn update_resource(
        &self,
        dataset_id: &str,
        resource_id: &str,
        payload: &Value,
    ) -> Result<RemoteResource, CatalogError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("update_resource:{dataset_id}/{resource_id}"))?;
        let mut body = payload.clone();
        body["id"] = json!(resource_id);
        let resource: RemoteResource = serde_json::from_value(body).unwrap();
        let slot = state
            .datasets
            .iter_mut()
            .find(|dataset| dataset.id == dataset_id)
            .and_then(|dataset| {
                dataset
                    .resources
                    .iter_mut()
                    .find(|existing| existing.id == resource_id)
            })
            .ok_or_else(|| status_error(404, resource_id))?;
        *slot = resource.clone();
        Ok(resource)
    }

    fn delete_resource(&self, dataset_id: &str, resource_id: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("delete:{dataset_id}/{resource_id}"))?;
        let dataset = state
            .datasets
            .iter_mut()
            .find(|dataset| dataset.id == dataset_id)
            .ok_or_else(|| status_error(404, dataset_id))?;
        let before = dataset.resources.len();
        dataset.resources.retain(|resource| resource.id != resource_id);
        if dataset.resources.len() == before {
            return Err(status_error(404, resource_id));
        }
        Ok(())
    }

    fn licenses(&self) -> Result<Vec<RemoteLicense>, CatalogError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, "licenses".to_string())?;
        Ok(state.licenses.clone())
    }

    fn suggest_zones(&self, q: &str, size: usize) -> Result<Vec<SpatialZone>, CatalogError> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("zones:{q}"))?;
        if state.failing_zones.contains(q) {
            return Err(status_error(500, q));
        }
        let mut zones = state.zones.get(q).cloned().unwrap_or_default();
        zones.truncate(size);
        Ok(zones)
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<DownloadInfo, CatalogError> {
        let (body, content_type) = {
            let mut state = self.state.lock().unwrap();
            self.record(&mut state, format!("download:{url}"))?;
            state
                .downloads
                .get(url)
                .cloned()
                .ok_or_else(|| status_error(404, url))?
        };
        sink.write_all(&body)
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        sink.flush()
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        Ok(DownloadInfo { content_type })
    }
}

pub fn status_error(status: u16, target: &str) -> CatalogError {
    CatalogError::Status {
        status,
        url: format!("{CATALOG_URL}/{target}"),
        message: format!("status {status}"),
    }
}

#[derive(Default)]
pub struct RecordingLog {
    entries: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingLog {
    pub fn entries(&self, level: &str) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(entry_level, _)| *entry_level == level)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.entries("warning")
    }

    fn push(&self, level: &'static str, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}

impl LogSink for RecordingLog {
    fn info(&self, message: &str) {
        self.push("info", message);
    }

    fn warning(&self, message: &str) {
        self.push("warning", message);
    }

    fn error(&self, message: &str) {
        self.push("error", message);
    }

    fn step(&self, message: &str) {
        self.push("step", message);
    }

    fn task(&self, key: &str, message: &str, total: u64) {
        self.push("task", &format!("{key}: {message} ({total})"));
    }

    fn progress(&self, key: &str, progress: u64, _total: Option<u64>) {
        self.push("progress", &format!("{key}: {progress}"));
    }
}

pub fn config() -> CatalogConfig {
    CatalogConfig::new(CATALOG_URL)
}

pub fn config_with_org(org: &str) -> CatalogConfig {
    let mut config = config();
    config.organization = Some(Organization {
        id: org.to_string(),
        name: None,
    });
    config
}

pub fn connector(catalog: FakeCatalog) -> Connector<FakeCatalog> {
    Connector::new(config(), Some("secret-key".to_string()), catalog)
}

pub fn anonymous(catalog: FakeCatalog) -> Connector<FakeCatalog> {
    Connector::new(config(), None, catalog)
}

pub fn remote_dataset(id: &str, title: &str) -> RemoteDataset {
    RemoteDataset {
        id: id.to_string(),
        title: title.to_string(),
        page: Some(format!("{CATALOG_URL}/datasets/{id}/")),
        ..RemoteDataset::default()
    }
}

pub fn remote_resource(id: &str, title: &str, url: &str) -> RemoteResource {
    RemoteResource {
        id: id.to_string(),
        title: Some(title.to_string()),
        url: Some(url.to_string()),
        ..RemoteResource::default()
    }
}

pub fn zone(id: &str, name: &str, level: &str) -> SpatialZone {
    SpatialZone {
        id: id.to_string(),
        name: name.to_string(),
        code: None,
        level: Some(level.to_string()),
    }
}

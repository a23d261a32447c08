use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::app::Connector;
use crate::domain::{
    Attachment, AttachmentKind, FileInfo, LocalDataset, Publication, PublicationMode,
    PublicationSite, RemoteRef, ResourceRef, Temporal, file_extension,
};
use crate::error::CatalogError;
use crate::log::LogSink;
use crate::matching::{EMBED_MARKER, reconcile_resource_ids};
use crate::spatial::{SpatialCoverage, resolve_spatial_coverage};
use crate::udata::{CatalogClient, RemoteDataset};

pub const VIEW_DATA_TITLE: &str = "Consultez les données";

const API_DOC_TITLE: &str = "Documentation de l'API";
const API_DOC_DESCRIPTION: &str = "Documentation interactive de l'API à destination des développeurs. La description de l'API utilise la spécification [OpenAPI 3.1.1](https://github.com/OAI/OpenAPI-Specification)";
const FIELDS_TITLE: &str = "Description des champs";
const FIELDS_DESCRIPTION: &str = "Description détaillée et types sémantiques des champs";
const META_ONLY_DESCRIPTION: &str = "Consultez le jeu de données";
const WEB_PAGE_FORMAT: &str = "Page Web";
const HTML_MIME: &str = "text/html";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourcePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub url: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesize: Option<u64>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extras: Map<String, Value>,
}

impl ResourcePayload {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    fn web_page(title: &str, description: String, url: String, kind: &str, embed: &str) -> Self {
        let mut resource = Self::new(title, url);
        resource.description = Some(description);
        resource.kind = Some(kind.to_string());
        resource.filetype = Some("remote".to_string());
        resource.format = Some(WEB_PAGE_FORMAT.to_string());
        resource.mime = Some(HTML_MIME.to_string());
        resource.extras.insert(EMBED_MARKER.to_string(), json!(embed));
        resource
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemporalCoverage {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteDatasetPayload {
    pub title: String,
    pub description: String,
    pub private: bool,
    pub resources: Vec<ResourcePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporal_coverage: Option<TemporalCoverage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spatial: Option<SpatialCoverage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<OrganizationRef>,
}

impl<C: CatalogClient> Connector<C> {
    pub fn publish_dataset(
        &self,
        dataset: &LocalDataset,
        publication: Publication,
        site: &PublicationSite,
        log: &dyn LogSink,
    ) -> Result<Publication, CatalogError> {
        self.require_api_key("publish a dataset")?;
        match publication.mode() {
            PublicationMode::Dataset => self.create_or_update_dataset(dataset, publication, site, log),
            PublicationMode::Resource => {
                self.create_or_update_resource(dataset, publication, site, log)
            }
        }
    }

    fn create_or_update_dataset(
        &self,
        dataset: &LocalDataset,
        mut publication: Publication,
        site: &PublicationSite,
        log: &dyn LogSink,
    ) -> Result<Publication, CatalogError> {
        log.step("Preparing the dataset for publication");
        let access_url = dataset_access_url(site, dataset);
        log.info(&format!("Dataset access URL: {access_url}"));

        let mut payload = self.build_dataset_payload(dataset, site, &access_url, log)?;

        let known_id = publication
            .remote_folder
            .as_ref()
            .map(|remote| remote.id.clone())
            .filter(|id| !id.is_empty());

        let saved = match known_id {
            Some(id) => {
                log.step(&format!("Updating existing remote dataset {id}"));
                let mut existing = self.fetch_existing(&id)?;
                if existing.is_deleted() {
                    log.warning(&format!("Remote dataset {id} was deleted, restoring it"));
                    existing.deleted = None;
                }

                let preserved = reconcile_resource_ids(&mut payload.resources, &existing.resources);
                log.info(&format!(
                    "Preserved {preserved} of {} resource identifiers",
                    payload.resources.len()
                ));

                let mut body = to_json(&existing)?;
                deep_merge(&mut body, to_json(&payload)?);
                let updated = self.client.update_dataset(&id, &body)?;
                log.info(&format!("Remote dataset {id} updated"));
                updated
            }
            None => {
                log.step("Creating a new remote dataset");
                let created = self.client.create_dataset(&to_json(&payload)?)?;
                log.info(&format!("New dataset created with id {}", created.id));
                created
            }
        };

        publication.remote_folder = Some(RemoteRef {
            id: saved.id,
            title: Some(saved.title),
            url: saved.page,
        });
        Ok(publication)
    }

    fn fetch_existing(&self, id: &str) -> Result<RemoteDataset, CatalogError> {
        self.client.get_dataset(id).map_err(|err| match err {
            CatalogError::Status {
                status: status @ (404 | 410),
                ..
            } => CatalogError::RemoteDatasetMissing {
                id: id.to_string(),
                url: self.config.url.clone(),
                status,
            },
            other => other,
        })
    }

    fn build_dataset_payload(
        &self,
        dataset: &LocalDataset,
        site: &PublicationSite,
        access_url: &str,
        log: &dyn LogSink,
    ) -> Result<RemoteDatasetPayload, CatalogError> {
        log.info("Preparing resources to publish");
        let resources = build_resources(dataset, site, access_url);

        let license = match &dataset.license {
            Some(license) => {
                log.info(&format!("Searching for license {}", license.href));
                let found = self
                    .client
                    .licenses()?
                    .into_iter()
                    .find(|remote| remote.matches_url(&license.href));
                match found {
                    Some(remote) => {
                        log.info(&format!("License found: {}", remote.title));
                        Some(remote.id)
                    }
                    None => {
                        log.warning(&format!("License not found on the catalog: {}", license.href));
                        None
                    }
                }
            }
            None => None,
        };

        let spatial = dataset
            .spatial
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .map(|text| resolve_spatial_coverage(&self.client, text, log))
            .filter(|coverage| !coverage.is_empty());

        let organization = self.config.organization_id().map(|id| {
            log.info(&format!("Associating with organization {id}"));
            OrganizationRef { id: id.to_string() }
        });

        Ok(RemoteDatasetPayload {
            title: dataset.title.clone(),
            description: dataset
                .description
                .clone()
                .filter(|description| !description.trim().is_empty())
                .unwrap_or_else(|| dataset.title.clone()),
            private: !dataset.public,
            resources,
            frequency: dataset.frequency.clone().filter(|frequency| !frequency.is_empty()),
            temporal_coverage: dataset.temporal.as_ref().map(temporal_coverage).transpose()?,
            tags: Some(dataset.keywords.clone()).filter(|tags| !tags.is_empty()),
            spatial,
            license,
            organization,
        })
    }

    fn create_or_update_resource(
        &self,
        dataset: &LocalDataset,
        mut publication: Publication,
        site: &PublicationSite,
        log: &dyn LogSink,
    ) -> Result<Publication, CatalogError> {
        log.step("Preparing the resource for publication");
        let dataset_id = target_dataset_id(&publication).ok_or_else(|| {
            CatalogError::InvalidInput("no remote dataset associated with this publication".to_string())
        })?;

        let remote = self.fetch_existing(&dataset_id)?;
        if remote.is_deleted() {
            return Err(CatalogError::RemoteDatasetMissing {
                id: dataset_id,
                url: self.config.url.clone(),
                status: 410,
            });
        }

        let access_url = dataset_access_url(site, dataset);
        let resource = view_data_resource(
            format!("{} - {VIEW_DATA_TITLE}", dataset.title),
            view_data_description(dataset),
            access_url,
        );

        let known = publication
            .remote_resource
            .as_ref()
            .map(|remote_resource| plain_resource_id(&remote_resource.id))
            .and_then(|id| remote.resource(&id));

        match known {
            Some(existing) => {
                log.step(&format!("Updating existing resource {}", existing.id));
                let mut body = to_json(existing)?;
                let mut patch = to_json(&resource)?;
                // Remote extras are left untouched.
                if let Value::Object(fields) = &mut patch {
                    fields.remove("extras");
                }
                deep_merge(&mut body, patch);
                self.client.update_resource(&dataset_id, &existing.id, &body)?;
                log.info(&format!("Resource {} updated", existing.id));
            }
            None => {
                log.step("Creating a new resource");
                let created = self.client.create_resource(&dataset_id, &to_json(&resource)?)?;
                log.info(&format!("Resource created with id {}", created.id));
                publication.remote_resource = Some(RemoteRef {
                    id: ResourceRef::new(dataset_id.as_str(), created.id.as_str()).to_string(),
                    title: created.title,
                    url: None,
                });
                let folder = publication
                    .remote_folder
                    .get_or_insert_with(|| RemoteRef::new(dataset_id.as_str()));
                if folder.title.is_none() {
                    folder.title = Some(remote.title.clone());
                }
                folder.url = remote.page.clone();
            }
        }
        Ok(publication)
    }

    pub fn delete_publication(
        &self,
        folder_id: &str,
        resource_id: Option<&str>,
        log: &dyn LogSink,
    ) -> Result<(), CatalogError> {
        self.require_api_key("delete a publication")?;

        let (target, result) = match resource_id.filter(|id| !id.is_empty()) {
            Some(resource_id) => {
                let (dataset_id, resource_id) = match resource_id.parse::<ResourceRef>() {
                    Ok(id) => (id.dataset_id().to_string(), id.resource_id().to_string()),
                    Err(_) => (folder_id.to_string(), resource_id.to_string()),
                };
                log.step(&format!("Deleting resource {resource_id} from dataset {dataset_id}"));
                (
                    format!("resource {resource_id}"),
                    self.client.delete_resource(&dataset_id, &resource_id),
                )
            }
            None => {
                log.step(&format!("Deleting dataset {folder_id}"));
                (
                    format!("dataset {folder_id}"),
                    self.client.delete_dataset(folder_id),
                )
            }
        };

        match result {
            Ok(()) => {
                log.info(&format!("The {target} was deleted"));
                Ok(())
            }
            Err(err) if err.is_missing() => {
                log.warning(&format!(
                    "The {target} does not exist or was already deleted (code {})",
                    err.status()
                ));
                Ok(())
            }
            Err(err) => {
                log.error(&format!("Error deleting {target}: {err}"));
                Err(CatalogError::Delete {
                    target,
                    url: self.config.url.clone(),
                    message: err.to_string(),
                })
            }
        }
    }
}

pub fn dataset_access_url(site: &PublicationSite, dataset: &LocalDataset) -> String {
    let slug = dataset
        .slug
        .as_deref()
        .filter(|slug| !slug.is_empty())
        .unwrap_or(&dataset.id);
    match site.dataset_url_template.as_deref().filter(|template| !template.is_empty()) {
        Some(template) => template.replace("{id}", &dataset.id).replace("{slug}", slug),
        None => format!("{}/datasets/{slug}", site.url.trim_end_matches('/')),
    }
}

pub fn build_resources(
    dataset: &LocalDataset,
    site: &PublicationSite,
    access_url: &str,
) -> Vec<ResourcePayload> {
    let mut resources = Vec::new();

    if dataset.is_meta_only {
        resources.push(view_data_resource(
            VIEW_DATA_TITLE.to_string(),
            META_ONLY_DESCRIPTION.to_string(),
            access_url.to_string(),
        ));
    } else {
        resources.push(view_data_resource(
            VIEW_DATA_TITLE.to_string(),
            view_data_description(dataset),
            access_url.to_string(),
        ));
        resources.push(ResourcePayload::web_page(
            API_DOC_TITLE,
            API_DOC_DESCRIPTION.to_string(),
            format!("{access_url}/api-doc"),
            "documentation",
            "api-doc",
        ));
        if !dataset.schema.is_empty() {
            resources.push(ResourcePayload::web_page(
                FIELDS_TITLE,
                FIELDS_DESCRIPTION.to_string(),
                access_url.to_string(),
                "documentation",
                "fields",
            ));
        }
    }

    let api_base = format!(
        "{}/data-fair/api/v1/datasets/{}",
        site.url.trim_end_matches('/'),
        dataset.id
    );
    if let Some(file) = &dataset.file {
        let original = dataset.original_file.as_ref().unwrap_or(file);
        resources.push(file_resource(original, format!("{api_base}/raw")));
        if file.mimetype != original.mimetype {
            resources.push(file_resource(file, format!("{api_base}/convert")));
        }
    }

    resources.extend(
        dataset
            .attachments
            .iter()
            .filter(|attachment| attachment.include_in_catalog_publications)
            .filter_map(|attachment| attachment_resource(attachment, &api_base)),
    );

    resources
}

fn view_data_resource(title: String, description: String, url: String) -> ResourcePayload {
    ResourcePayload::web_page(&title, description, url, "main", "data")
}

fn view_data_description(dataset: &LocalDataset) -> String {
    let target = if dataset.bbox.as_ref().is_some_and(|bbox| !bbox.is_empty()) {
        "une carte interactive"
    } else {
        "un tableau"
    };
    format!("Consultez directement les données dans {target}.")
}

fn file_resource(file: &FileInfo, url: String) -> ResourcePayload {
    let format = file.extension();
    let mut resource = ResourcePayload::new(format!("Fichier {format}"), url);
    resource.description = Some(format!("Téléchargez le fichier complet au format {format}."));
    resource.kind = Some("main".to_string());
    resource.filetype = Some("remote".to_string());
    resource.filesize = file.size;
    resource.mime = file.mimetype.clone();
    resource.format = Some(format);
    resource
}

fn attachment_resource(attachment: &Attachment, api_base: &str) -> Option<ResourcePayload> {
    let mut resource = match attachment.kind {
        AttachmentKind::Url => {
            let url = attachment.url.as_deref().filter(|url| !url.is_empty())?;
            ResourcePayload::new(attachment.title.as_str(), url)
        }
        AttachmentKind::File | AttachmentKind::RemoteFile => {
            let name = attachment.name.as_deref().filter(|name| !name.is_empty())?;
            let mut resource = ResourcePayload::new(
                attachment.title.as_str(),
                format!("{api_base}/metadata-attachments/{name}"),
            );
            resource.filetype = Some("remote".to_string());
            resource.format = Some(file_extension(name))
                .filter(|format| !format.is_empty());
            if attachment.kind == AttachmentKind::File {
                resource.filesize = attachment.size;
                resource.mime = attachment.mimetype.clone();
            }
            resource
        }
    };
    resource.description = attachment.description.clone();
    Some(resource)
}

pub fn temporal_coverage(temporal: &Temporal) -> Result<TemporalCoverage, CatalogError> {
    let start = parse_instant(&temporal.start)?;
    let end = match temporal.end.as_deref().filter(|end| !end.is_empty()) {
        Some(end) => parse_instant(end)?,
        None => start,
    };
    Ok(TemporalCoverage {
        start: start.to_rfc3339_opts(SecondsFormat::Millis, true),
        end: end.to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>, CatalogError> {
    let value = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| CatalogError::InvalidInput(format!("invalid temporal coverage date \"{value}\"")))
}

/// Objects merge key by key; anything else in `patch` replaces the target value.
pub fn deep_merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

fn target_dataset_id(publication: &Publication) -> Option<String> {
    publication
        .remote_folder
        .as_ref()
        .map(|folder| folder.id.clone())
        .filter(|id| !id.is_empty())
        .or_else(|| {
            publication
                .remote_resource
                .as_ref()
                .and_then(|resource| resource.id.parse::<ResourceRef>().ok())
                .map(|id| id.dataset_id().to_string())
        })
}

fn plain_resource_id(id: &str) -> String {
    match id.parse::<ResourceRef>() {
        Ok(id) => id.resource_id().to_string(),
        Err(_) => id.to_string(),
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value, CatalogError> {
    serde_json::to_value(value).map_err(|err| CatalogError::InvalidInput(err.to_string()))
}

use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceRef {
    dataset_id: String,
    resource_id: String,
}

impl ResourceRef {
    pub fn new(dataset_id: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            resource_id: resource_id.into(),
        }
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dataset_id, self.resource_id)
    }
}

impl FromStr for ResourceRef {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts = value.split(':').collect::<Vec<_>>();
        match parts.as_slice() {
            [dataset_id, resource_id] if !dataset_id.is_empty() && !resource_id.is_empty() => {
                Ok(Self::new(*dataset_id, *resource_id))
            }
            _ => Err(CatalogError::InvalidResourceId(value.to_string())),
        }
    }
}

impl TryFrom<String> for ResourceRef {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceRef> for String {
    fn from(value: ResourceRef) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceListing {
    pub id: ResourceRef,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ListItem {
    Folder(Folder),
    Resource(ResourceListing),
}

impl ListItem {
    pub fn id(&self) -> String {
        match self {
            ListItem::Folder(folder) => folder.id.clone(),
            ListItem::Resource(resource) => resource.id.to_string(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ListItem::Folder(folder) => &folder.title,
            ListItem::Resource(resource) => &resource.title,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, ListItem::Folder(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResult {
    pub count: u64,
    pub results: Vec<ListItem>,
    pub path: Vec<PathEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "folder")]
pub struct PathEntry {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
#[value(rename_all = "camelCase")]
pub enum ListAction {
    CreateFolderInRoot,
    ReplaceFolder,
    CreateResource,
    ReplaceResource,
}

impl ListAction {
    pub fn targets_resource(self) -> bool {
        matches!(self, ListAction::CreateResource | ListAction::ReplaceResource)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub show_all: bool,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub current_folder_id: Option<String>,
    #[serde(default)]
    pub action: Option<ListAction>,
}

impl ListParams {
    pub fn query(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    pub fn window(&self) -> Option<(u64, u64)> {
        match (self.page, self.size) {
            (Some(page), Some(size)) if page > 0 && size > 0 => Some((page, size)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: ResourceRef,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub file_path: Utf8PathBuf,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
    pub keywords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MetadataSource {
    Dataset,
    #[default]
    Resource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportConfig {
    #[serde(default)]
    pub title_source: MetadataSource,
    #[serde(default = "dataset_source")]
    pub description_source: MetadataSource,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            title_source: MetadataSource::Resource,
            description_source: MetadataSource::Dataset,
        }
    }
}

fn dataset_source() -> MetadataSource {
    MetadataSource::Dataset
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RemoteRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
#[value(rename_all = "camelCase")]
pub enum PublicationAction {
    CreateFolderInRoot,
    ReplaceFolder,
    CreateResource,
    ReplaceResource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationMode {
    Dataset,
    Resource,
}

impl PublicationAction {
    pub fn mode(self) -> PublicationMode {
        match self {
            PublicationAction::CreateFolderInRoot | PublicationAction::ReplaceFolder => {
                PublicationMode::Dataset
            }
            PublicationAction::CreateResource | PublicationAction::ReplaceResource => {
                PublicationMode::Resource
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    pub action: PublicationAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_folder: Option<RemoteRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_resource: Option<RemoteRef>,
}

impl Publication {
    pub fn new(action: PublicationAction) -> Self {
        Self {
            action,
            remote_folder: None,
            remote_resource: None,
        }
    }

    pub fn mode(&self) -> PublicationMode {
        self.action.mode()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub mimetype: Option<String>,
}

impl FileInfo {
    pub fn extension(&self) -> String {
        file_extension(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttachmentKind {
    Url,
    File,
    RemoteFile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub include_in_catalog_publications: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Temporal {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRef {
    #[serde(default)]
    pub title: Option<String>,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub key: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDataset {
    pub id: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub is_meta_only: bool,
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    #[serde(default)]
    pub file: Option<FileInfo>,
    #[serde(default)]
    pub original_file: Option<FileInfo>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub temporal: Option<Temporal>,
    #[serde(default)]
    pub spatial: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub license: Option<LicenseRef>,
    #[serde(default)]
    pub schema: Vec<SchemaField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationSite {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub dataset_url_template: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    Import,
    Search,
    Pagination,
    AdditionalFilters,
    PublishDataset,
    DeletePublication,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Import,
        Capability::Search,
        Capability::Pagination,
        Capability::AdditionalFilters,
        Capability::PublishDataset,
        Capability::DeletePublication,
    ];
}

pub fn file_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_string(),
        _ => String::new(),
    }
}

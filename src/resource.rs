use std::fs;
use std::io::BufWriter;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use tempfile::NamedTempFile;
use url::Url;

use crate::app::Connector;
use crate::domain::{ImportConfig, License, MetadataSource, Resource, ResourceRef, file_extension};
use crate::error::CatalogError;
use crate::log::LogSink;
use crate::udata::{CatalogClient, RemoteDataset, RemoteResource};

pub const DEFAULT_EXTENSION: &str = ".dat";

pub const DEFAULT_FILE_NAME: &str = "resource";

static UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]").expect("valid file name pattern"));

impl<C: CatalogClient> Connector<C> {
    pub fn get_resource(
        &self,
        resource_id: &str,
        import: &ImportConfig,
        tmp_dir: &Utf8Path,
        log: &dyn LogSink,
    ) -> Result<Resource, CatalogError> {
        let id: ResourceRef = resource_id.parse()?;
        let dataset = self.client.get_dataset(id.dataset_id()).map_err(|err| {
            if err.is_missing() {
                CatalogError::NotFound(format!("dataset {} not found", id.dataset_id()))
            } else {
                err
            }
        })?;
        let remote = dataset.resource(id.resource_id()).ok_or_else(|| {
            CatalogError::NotFound(format!(
                "resource {} not found in dataset {}",
                id.resource_id(),
                id.dataset_id()
            ))
        })?;
        let url = remote
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                CatalogError::NotFound(format!("resource {} has no download URL", id.resource_id()))
            })?;

        log.step(&format!("Downloading resource {id}"));
        let file_path = self.download_to(url, remote.title.as_deref(), tmp_dir)?;
        log.info(&format!("Resource {id} saved to {file_path}"));

        let license = self.resolve_license(remote, &dataset, log)?;
        Ok(build_resource(
            id,
            &dataset,
            remote,
            import,
            file_path,
            license,
        ))
    }

    fn download_to(
        &self,
        url: &str,
        title: Option<&str>,
        tmp_dir: &Utf8Path,
    ) -> Result<Utf8PathBuf, CatalogError> {
        fs::create_dir_all(tmp_dir)
            .map_err(|err| CatalogError::Filesystem(format!("create {tmp_dir}: {err}")))?;
        let partial = NamedTempFile::new_in(tmp_dir)
            .map_err(|err| CatalogError::Filesystem(format!("create temp file in {tmp_dir}: {err}")))?;

        let info = {
            let mut writer = BufWriter::new(partial.as_file());
            self.client.download(url, &mut writer)?
        };

        let extension = extension_from_url(url)
            .or_else(|| info.content_type.as_deref().and_then(extension_from_content_type))
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        let file_path = tmp_dir.join(format!("{}{extension}", sanitize_file_name(title)));
        partial
            .persist(&file_path)
            .map_err(|err| CatalogError::Filesystem(format!("write {file_path}: {}", err.error)))?;
        Ok(file_path)
    }

    fn resolve_license(
        &self,
        remote: &RemoteResource,
        dataset: &RemoteDataset,
        log: &dyn LogSink,
    ) -> Result<Option<License>, CatalogError> {
        let Some(license_id) = remote
            .license
            .as_deref()
            .or(dataset.license.as_deref())
            .filter(|id| !id.is_empty())
        else {
            return Ok(None);
        };
        let licenses = self.client.licenses()?;
        let license = licenses
            .into_iter()
            .find(|license| license.id == license_id)
            .map(|license| License {
                title: license.title,
                href: license.url,
            });
        if license.is_none() {
            log.warning(&format!("License {license_id} is unknown to the catalog"));
        }
        Ok(license)
    }
}

pub fn build_resource(
    id: ResourceRef,
    dataset: &RemoteDataset,
    remote: &RemoteResource,
    import: &ImportConfig,
    file_path: Utf8PathBuf,
    license: Option<License>,
) -> Resource {
    let title = match import.title_source {
        MetadataSource::Dataset => dataset.title.clone(),
        MetadataSource::Resource => remote.title.clone().unwrap_or_default(),
    };
    let description = match import.description_source {
        MetadataSource::Dataset => dataset.description.clone(),
        MetadataSource::Resource => remote.description.clone(),
    };
    Resource {
        id,
        title,
        description,
        file_path,
        format: remote
            .format
            .clone()
            .filter(|format| !format.is_empty())
            .unwrap_or_else(|| "unknown".to_string()),
        frequency: dataset.frequency.clone(),
        license,
        keywords: dataset.tags.clone(),
        mime_type: remote.mime.clone(),
        origin: dataset.page.clone(),
        size: remote.filesize,
    }
}

pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let name = parsed.path_segments()?.next_back()?;
    let extension = file_extension(name);
    if extension.is_empty() || extension.eq_ignore_ascii_case("dat") {
        None
    } else {
        Some(format!(".{extension}"))
    }
}

pub fn extension_from_content_type(content_type: &str) -> Option<String> {
    let content_type = content_type.to_ascii_lowercase();
    let extension = if content_type.contains("json") {
        ".json"
    } else if content_type.contains("csv") {
        ".csv"
    } else if content_type.contains("excel") || content_type.contains("spreadsheet") {
        ".xlsx"
    } else if content_type.contains("xml") {
        ".xml"
    } else if content_type.contains("zip") {
        ".zip"
    } else {
        return None;
    };
    Some(extension.to_string())
}

pub fn sanitize_file_name(title: Option<&str>) -> String {
    match title.filter(|title| !title.is_empty()) {
        Some(title) => UNSAFE_FILE_CHARS.replace_all(title, "_").into_owned(),
        None => DEFAULT_FILE_NAME.to_string(),
    }
}

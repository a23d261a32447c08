use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CatalogError;

pub const API_KEY_MASK: &str = "**************************************************";

pub const API_KEY_SECRET: &str = "apiKey";

const DEFAULT_CONFIG_FILE: &str = "udata-catalog.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<Organization>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Organization {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CatalogConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            organization: None,
        }
    }

    pub fn organization_id(&self) -> Option<&str> {
        self.organization
            .as_ref()
            .map(|org| org.id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn api_url(&self, path: &str) -> Result<Url, CatalogError> {
        let mut base = self.url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)
            .map_err(|err| CatalogError::InvalidInput(format!("catalog url {}: {err}", self.url)))?;
        base.join(path.trim_start_matches('/'))
            .map_err(|err| CatalogError::InvalidInput(format!("catalog path {path}: {err}")))
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn config_path(path: Option<&str>) -> PathBuf {
        PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE))
    }

    pub fn resolve(path: Option<&str>) -> Result<CatalogConfig, CatalogError> {
        let config_path = Self::config_path(path);
        let content = fs::read_to_string(&config_path)
            .map_err(|_| CatalogError::ConfigRead(config_path.clone()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<CatalogConfig, CatalogError> {
        let config: CatalogConfig = serde_json::from_str(content)
            .map_err(|err| CatalogError::ConfigParse(err.to_string()))?;
        if config.url.trim().is_empty() {
            return Err(CatalogError::ConfigParse("catalog url is empty".to_string()));
        }
        config.api_url("")?;
        Ok(config)
    }

    pub fn save(path: &Path, config: &CatalogConfig) -> Result<(), CatalogError> {
        write_json(path, config)
    }
}

pub trait SecretStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str);

    fn api_key(&self) -> Option<String> {
        self.get(API_KEY_SECRET).filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct MemorySecrets {
    values: BTreeMap<String, String>,
}

impl MemorySecrets {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        let mut secrets = Self::default();
        secrets.set(API_KEY_SECRET, api_key.into());
        secrets
    }
}

impl SecretStore for MemorySecrets {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

#[derive(Debug, Clone)]
pub struct FileSecrets {
    path: PathBuf,
    inner: MemorySecrets,
}

impl FileSecrets {
    pub fn open(path: Option<&str>) -> Result<Self, CatalogError> {
        let path = match path {
            Some(path) => PathBuf::from(path),
            None => default_secrets_path()?,
        };
        let inner = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|_| CatalogError::ConfigRead(path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| CatalogError::ConfigParse(err.to_string()))?
        } else {
            MemorySecrets::default()
        };
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<(), CatalogError> {
        write_json(&self.path, &self.inner)
    }
}

impl SecretStore for FileSecrets {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: String) {
        self.inner.set(key, value);
    }

    fn remove(&mut self, key: &str) {
        self.inner.remove(key);
    }
}

fn default_secrets_path() -> Result<PathBuf, CatalogError> {
    ProjectDirs::from("fr", "data-fair", "udata-catalog")
        .map(|dirs| dirs.config_dir().join("secrets.json"))
        .ok_or_else(|| CatalogError::Filesystem("unable to resolve config directory".to_string()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CatalogError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| CatalogError::Filesystem(err.to_string()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    let content =
        serde_json::to_vec_pretty(value).map_err(|err| CatalogError::Filesystem(err.to_string()))?;
    fs::write(&tmp_path, &content).map_err(|err| CatalogError::Filesystem(err.to_string()))?;
    fs::rename(&tmp_path, path).map_err(|err| CatalogError::Filesystem(err.to_string()))?;
    Ok(())
}

use std::io::Write;
use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::config::CatalogConfig;
use crate::error::CatalogError;

const API_KEY_HEADER: &str = "X-API-KEY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteDataset {
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    /// Deletion timestamp; serialized even when empty so a PUT can clear it.
    #[serde(default)]
    pub deleted: Option<Value>,
    #[serde(default, deserialize_with = "null_default")]
    pub private: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub resources: Vec<RemoteResource>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RemoteDataset {
    pub fn is_deleted(&self) -> bool {
        !matches!(self.deleted, None | Some(Value::Null) | Some(Value::Bool(false)))
    }

    pub fn resource(&self, id: &str) -> Option<&RemoteResource> {
        self.resources.iter().find(|resource| resource.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteResource {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesize: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub extras: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DatasetPage {
    #[serde(default, deserialize_with = "null_default")]
    pub data: Vec<RemoteDataset>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteLicense {
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub alternate_urls: Vec<String>,
}

impl RemoteLicense {
    pub fn matches_url(&self, href: &str) -> bool {
        self.url.as_deref() == Some(href) || self.alternate_urls.iter().any(|url| url == href)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpatialZone {
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOrganization {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub organizations: Vec<RemoteOrganization>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetQuery {
    pub q: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadInfo {
    pub content_type: Option<String>,
}

pub trait CatalogClient: Send + Sync {
    fn current_user(&self) -> Result<RemoteUser, CatalogError>;
    fn search_datasets(&self, query: &DatasetQuery) -> Result<DatasetPage, CatalogError>;
    fn org_datasets(&self) -> Result<Vec<RemoteDataset>, CatalogError>;
    fn get_dataset(&self, id: &str) -> Result<RemoteDataset, CatalogError>;
    fn create_dataset(&self, payload: &Value) -> Result<RemoteDataset, CatalogError>;
    fn update_dataset(&self, id: &str, payload: &Value) -> Result<RemoteDataset, CatalogError>;
    fn delete_dataset(&self, id: &str) -> Result<(), CatalogError>;
    fn create_resource(
        &self,
        dataset_id: &str,
        payload: &Value,
    ) -> Result<RemoteResource, CatalogError>;
    fn update_resource(
        &self,
        dataset_id: &str,
        resource_id: &str,
        payload: &Value,
    ) -> Result<RemoteResource, CatalogError>;
    fn delete_resource(&self, dataset_id: &str, resource_id: &str) -> Result<(), CatalogError>;
    fn licenses(&self) -> Result<Vec<RemoteLicense>, CatalogError>;
    fn suggest_zones(&self, q: &str, size: usize) -> Result<Vec<SpatialZone>, CatalogError>;
    /// Streams the body at `url` into `sink`, returning once everything is written.
    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<DownloadInfo, CatalogError>;
}

#[derive(Clone)]
pub struct UdataHttpClient {
    client: Client,
    config: CatalogConfig,
    api_key: Option<String>,
}

impl UdataHttpClient {
    pub fn new(config: &CatalogConfig, api_key: Option<&str>) -> Result<Self, CatalogError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("udata-catalog/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| CatalogError::InvalidInput(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(None::<Duration>)
            .build()
            .map_err(|err| CatalogError::Http {
                url: config.url.clone(),
                message: err.to_string(),
            })?;
        let api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string);
        if let Some(key) = &api_key {
            HeaderValue::from_str(key)
                .map_err(|_| CatalogError::InvalidInput("API key is not a valid header".to_string()))?;
        }
        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        let request = self.client.request(method, url.clone());
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder, url: &Url) -> Result<Response, CatalogError> {
        let response = request.send().map_err(|err| CatalogError::Http {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        Self::handle_status(response, url)
    }

    fn handle_status(response: Response, url: &Url) -> Result<Response, CatalogError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .ok()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| "catalog request failed".to_string());
        Err(CatalogError::Status {
            status,
            url: url.to_string(),
            message,
        })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        let url = self.config.api_url(path)?;
        let request = self.request(Method::GET, &url).query(query);
        let response = self.send(request, &url)?;
        Self::decode(response, &url)
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: &Value,
    ) -> Result<T, CatalogError> {
        let url = self.config.api_url(path)?;
        let request = self.request(method, &url).json(payload);
        let response = self.send(request, &url)?;
        Self::decode(response, &url)
    }

    fn delete(&self, path: &str) -> Result<(), CatalogError> {
        let url = self.config.api_url(path)?;
        let request = self.request(Method::DELETE, &url);
        self.send(request, &url)?;
        Ok(())
    }

    fn decode<T: DeserializeOwned>(response: Response, url: &Url) -> Result<T, CatalogError> {
        response.json().map_err(|err| CatalogError::Http {
            url: url.to_string(),
            message: format!("invalid JSON response: {err}"),
        })
    }
}

impl CatalogClient for UdataHttpClient {
    fn current_user(&self) -> Result<RemoteUser, CatalogError> {
        self.get_json("api/1/me/", &[])
    }

    fn search_datasets(&self, query: &DatasetQuery) -> Result<DatasetPage, CatalogError> {
        let mut params = Vec::new();
        if let Some(q) = &query.q {
            params.push(("q", q.clone()));
        }
        if let Some(page) = query.page {
            params.push(("page", page.to_string()));
        }
        if let Some(page_size) = query.page_size {
            params.push(("page_size", page_size.to_string()));
        }
        if let Some(organization) = &query.organization {
            params.push(("organization", organization.clone()));
        }
        self.get_json("api/1/datasets/", &params)
    }

    fn org_datasets(&self) -> Result<Vec<RemoteDataset>, CatalogError> {
        self.get_json("api/1/me/org_datasets/", &[])
    }

    fn get_dataset(&self, id: &str) -> Result<RemoteDataset, CatalogError> {
        self.get_json(&format!("api/1/datasets/{id}/"), &[])
    }

    fn create_dataset(&self, payload: &Value) -> Result<RemoteDataset, CatalogError> {
        self.send_json(Method::POST, "api/1/datasets/", payload)
    }

    fn update_dataset(&self, id: &str, payload: &Value) -> Result<RemoteDataset, CatalogError> {
        self.send_json(Method::PUT, &format!("api/1/datasets/{id}/"), payload)
    }

    fn delete_dataset(&self, id: &str) -> Result<(), CatalogError> {
        self.delete(&format!("api/1/datasets/{id}/"))
    }

    fn create_resource(
        &self,
        dataset_id: &str,
        payload: &Value,
    ) -> Result<RemoteResource, CatalogError> {
        self.send_json(
            Method::POST,
            &format!("api/1/datasets/{dataset_id}/resources/"),
            payload,
        )
    }

    fn update_resource(
        &self,
        dataset_id: &str,
        resource_id: &str,
        payload: &Value,
    ) -> Result<RemoteResource, CatalogError> {
        self.send_json(
            Method::PUT,
            &format!("api/1/datasets/{dataset_id}/resources/{resource_id}/"),
            payload,
        )
    }

    fn delete_resource(&self, dataset_id: &str, resource_id: &str) -> Result<(), CatalogError> {
        self.delete(&format!(
            "api/1/datasets/{dataset_id}/resources/{resource_id}/"
        ))
    }

    fn licenses(&self) -> Result<Vec<RemoteLicense>, CatalogError> {
        self.get_json("api/1/datasets/licenses/", &[])
    }

    fn suggest_zones(&self, q: &str, size: usize) -> Result<Vec<SpatialZone>, CatalogError> {
        self.get_json(
            "api/1/spatial/zones/suggest/",
            &[("q", q.to_string()), ("size", size.to_string())],
        )
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<DownloadInfo, CatalogError> {
        let parsed = Url::parse(url)
            .map_err(|err| CatalogError::InvalidInput(format!("resource url {url}: {err}")))?;
        // Resource files are often hosted outside the catalog, never send the key there.
        let request = self.client.get(parsed.clone());
        let mut response = self.send(request, &parsed)?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        std::io::copy(&mut response, sink)
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        sink.flush()
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        Ok(DownloadInfo { content_type })
    }
}

fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

use crate::config::{CatalogConfig, SecretStore};
use crate::error::CatalogError;
use crate::udata::{CatalogClient, UdataHttpClient};

#[derive(Clone)]
pub struct Connector<C: CatalogClient> {
    pub(crate) config: CatalogConfig,
    pub(crate) api_key: Option<String>,
    pub(crate) client: C,
}

impl Connector<UdataHttpClient> {
    pub fn connect(
        config: CatalogConfig,
        secrets: &dyn SecretStore,
    ) -> Result<Self, CatalogError> {
        let api_key = secrets.api_key();
        let client = UdataHttpClient::new(&config, api_key.as_deref())?;
        Ok(Self::new(config, api_key, client))
    }
}

impl<C: CatalogClient> Connector<C> {
    pub fn new(config: CatalogConfig, api_key: Option<String>, client: C) -> Self {
        let api_key = api_key.filter(|key| !key.trim().is_empty());
        Self {
            config,
            api_key,
            client,
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub(crate) fn require_api_key(&self, purpose: &str) -> Result<(), CatalogError> {
        if self.has_api_key() {
            Ok(())
        } else {
            Err(CatalogError::MissingApiKey(purpose.to_string()))
        }
    }
}

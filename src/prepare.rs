use serde::Serialize;

use crate::app::Connector;
use crate::config::{API_KEY_MASK, API_KEY_SECRET, CatalogConfig, SecretStore};
use crate::domain::Capability;
use crate::error::CatalogError;
use crate::log::LogSink;
use crate::udata::{CatalogClient, RemoteUser};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareOutcome {
    pub config: CatalogConfig,
    pub capabilities: Vec<Capability>,
}

pub fn prepare(mut config: CatalogConfig, secrets: &mut dyn SecretStore) -> PrepareOutcome {
    match config.api_key.as_deref() {
        Some(key) if !key.is_empty() && key != API_KEY_MASK => {
            secrets.set(API_KEY_SECRET, key.to_string());
            config.api_key = Some(API_KEY_MASK.to_string());
        }
        Some("") if secrets.get(API_KEY_SECRET).is_some() => {
            secrets.remove(API_KEY_SECRET);
        }
        _ => {}
    }

    let has_key = secrets.api_key().is_some();
    let capabilities = Capability::ALL
        .into_iter()
        .filter(|capability| has_key || *capability != Capability::PublishDataset)
        .collect();

    PrepareOutcome {
        config,
        capabilities,
    }
}

impl<C: CatalogClient> Connector<C> {
    pub fn check_access(&self, log: &dyn LogSink) -> Result<RemoteUser, CatalogError> {
        self.require_api_key("validate the catalog configuration")?;
        log.step(&format!("Checking API key on {}", self.config.url));

        let user = self.client.current_user().map_err(|err| match &err {
            CatalogError::Status { status: 401, .. } => CatalogError::Unauthorized {
                url: self.config.url.clone(),
            },
            CatalogError::Status { status: 403, .. } => CatalogError::Forbidden {
                url: self.config.url.clone(),
                organization: self.config.organization_id().unwrap_or("-").to_string(),
            },
            _ => err,
        })?;
        log.info(&format!("API key belongs to user {}", user.id));

        if let Some(organization) = self.config.organization_id() {
            let member = user.organizations.iter().any(|org| org.id == organization);
            if !member {
                return Err(CatalogError::Forbidden {
                    url: self.config.url.clone(),
                    organization: organization.to_string(),
                });
            }
            log.info(&format!("User is a member of organization {organization}"));
        }

        Ok(user)
    }
}

//! One-shot process initialization: either a local container plus its client configuration,
//! or the fallback configuration for an externally managed node.

use crate::{
    bootstrap::{self, LocalElasticsearch, RuntimeFacts},
    client::{self, ClientConfig},
    config::LocalElasticsearchProperties,
    error::Result,
};

#[cfg(feature = "blocking")]
#[cfg_attr(docsrs, doc(cfg(feature = "blocking")))]
pub mod blocking;

/// Outcome of [`initialize`].
#[derive(Debug)]
pub enum Startup {
    /// A container was started; it lives as long as this value.
    Local(LocalElasticsearch, ClientConfig),
    /// The container is disabled; consumers use [`ClientConfig::fallback`].
    External(ClientConfig),
}

impl Startup {
    /// Client configuration to hand to the REST client.
    pub fn client_config(&self) -> &ClientConfig {
        match self {
            Startup::Local(_, config) | Startup::External(config) => config,
        }
    }

    /// Facts of the local container, if one was started.
    pub fn facts(&self) -> Option<&RuntimeFacts> {
        match self {
            Startup::Local(node, _) => Some(node.facts()),
            Startup::External(_) => None,
        }
    }
}

/// Starts the local container and derives its client configuration, unless
/// `properties.enabled` is `false`.
pub async fn initialize(properties: &LocalElasticsearchProperties) -> Result<Startup> {
    if !properties.enabled {
        log::info!(
            "local Elasticsearch container is disabled, clients connect to {}",
            client::FALLBACK_ADDRESS
        );
        return Ok(Startup::External(ClientConfig::fallback()));
    }

    let node = bootstrap::bootstrap(&properties.bootstrap_options()).await?;
    let ca = node.http_ca_certificate().await?;
    let config = client::configure(node.facts(), ca);
    Ok(Startup::Local(node, config))
}

//! Blocking flavour of process initialization.

use crate::{
    bootstrap::{blocking as bootstrap, RuntimeFacts},
    client::{self, ClientConfig},
    config::LocalElasticsearchProperties,
    error::Result,
};

/// Outcome of the blocking [`initialize`].
#[derive(Debug)]
pub enum Startup {
    /// A container was started; it lives as long as this value.
    Local(bootstrap::LocalElasticsearch, ClientConfig),
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

/// Blocking counterpart of [`initialize`](super::initialize).
pub fn initialize(properties: &LocalElasticsearchProperties) -> Result<Startup> {
    if !properties.enabled {
        log::info!(
            "local Elasticsearch container is disabled, clients connect to {}",
            client::FALLBACK_ADDRESS
        );
        return Ok(Startup::External(ClientConfig::fallback()));
    }

    let node = bootstrap::bootstrap(&properties.bootstrap_options())?;
    let ca = node.http_ca_certificate()?;
    let config = client::configure(node.facts(), ca);
    Ok(Startup::Local(node, config))
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::config::{CONTAINER_NAME_KEY, CONTAINER_PORT_KEY, ENABLED_KEY, PASSWORD_KEY};

    #[test]
    fn disabled_container_falls_back_to_localhost() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let properties = LocalElasticsearchProperties::from_properties([(ENABLED_KEY, "false")])?;
        let startup = initialize(&properties)?;

        assert!(startup.facts().is_none());
        assert_eq!(startup.client_config(), &ClientConfig::fallback());
        Ok(())
    }

    #[test]
    fn invalid_image_aborts_initialization() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let properties = LocalElasticsearchProperties {
            container_image: Some("elasticsearch:".to_owned()),
            ..Default::default()
        };
        assert!(matches!(
            initialize(&properties),
            Err(crate::Error::InvalidProperty { .. })
        ));
        Ok(())
    }

    #[serial]
    #[test]
    fn fixed_port_and_password_flow_into_client_config() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let _ = pretty_env_logger::try_init();
        let properties = LocalElasticsearchProperties::from_properties([
            (CONTAINER_PORT_KEY, "19200"),
            (CONTAINER_NAME_KEY, "local-elasticsearch-startup-test"),
            (PASSWORD_KEY, "secret1"),
        ])?;
        let startup = initialize(&properties)?;

        let facts = startup.facts().ok_or("container facts missing")?;
        assert_eq!(facts.host_port, 19200);
        assert_eq!(facts.username, "elastic");
        assert_eq!(facts.password, "secret1");

        let config = startup.client_config();
        assert_eq!(config.address(), facts.address);
        assert!(config.tls());

        let ca = config.ca_certificate().ok_or("CA missing")?;
        let client = reqwest::blocking::Client::builder()
            .add_root_certificate(reqwest::Certificate::from_pem(ca.pem())?)
            .build()?;
        let response = client
            .get(format!("{}/_cluster/health", config.base_url()))
            .basic_auth("elastic", Some("secret1"))
            .send()?;
        assert_eq!(response.status(), 200);
        Ok(())
    }
}

//! Blocking flavour of the bootstrapper, for synchronous process initialization.

use std::fmt;

use testcontainers::{runners::SyncRunner, Container, Image};

use super::{container_request, requested_container_name, BootstrapOptions, RuntimeFacts};
use crate::{
    client::CaCertificate,
    elasticsearch::{Elasticsearch, ELASTICSEARCH_API_PORT, HTTP_CA_CERT_PATH},
    error::Result,
};

/// A running Elasticsearch container started through the blocking runner.
///
/// Dropping it stops and removes the container.
pub struct LocalElasticsearch {
    container: Container<Elasticsearch>,
    facts: RuntimeFacts,
}

impl LocalElasticsearch {
    /// Connection facts of the running container.
    pub fn facts(&self) -> &RuntimeFacts {
        &self.facts
    }

    /// The underlying container handle.
    pub fn container(&self) -> &Container<Elasticsearch> {
        &self.container
    }

    /// Reads the self-signed CA that issued the HTTP layer certificate out of the container.
    pub fn http_ca_certificate(&self) -> Result<CaCertificate> {
        let mut pem = Vec::new();
        self.container.copy_file_from(HTTP_CA_CERT_PATH, &mut pem)?;
        CaCertificate::from_pem(pem)
    }
}

impl fmt::Debug for LocalElasticsearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalElasticsearch")
            .field("facts", &self.facts)
            .finish_non_exhaustive()
    }
}

/// Blocking counterpart of [`bootstrap`](super::bootstrap).
pub fn bootstrap(options: &BootstrapOptions) -> Result<LocalElasticsearch> {
    let request = container_request(options)?;
    log::debug!("starting {}:{}", request.image().name(), request.image().tag());
    let container = request.start()?;

    let host = container.get_host()?.to_string();
    let host_port = container.get_host_port_ipv4(ELASTICSEARCH_API_PORT)?;
    let facts = RuntimeFacts::harvest(
        container.image(),
        requested_container_name(options),
        container.id(),
        host,
        host_port,
    )?;
    log::info!("{}", facts.banner());

    Ok(LocalElasticsearch { container, facts })
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;
    use crate::elasticsearch::ELASTICSEARCH_DEFAULT_IMAGE;

    #[serial]
    #[test]
    fn bootstrap_with_fixed_port_and_password() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let _ = pretty_env_logger::try_init();
        let options = BootstrapOptions::default()
            .with_host_port(19200)
            .with_container_name("local-elasticsearch-blocking-test")
            .with_password("secret1")
            .with_follow_log(true);
        let node = bootstrap(&options)?;
        let facts = node.facts();

        assert_eq!(facts.image, ELASTICSEARCH_DEFAULT_IMAGE);
        assert_eq!(facts.host_port, 19200);
        assert_eq!(facts.internal_port, 9200);
        assert!(facts.address.ends_with(":19200"));
        assert_eq!(
            facts.container_name.as_deref(),
            Some("local-elasticsearch-blocking-test")
        );
        assert_eq!(facts.username, "elastic");
        assert_eq!(facts.password, "secret1");

        let ca = node.http_ca_certificate()?;
        assert!(ca.pem().starts_with(b"-----BEGIN CERTIFICATE-----"));
        Ok(())
    }
}

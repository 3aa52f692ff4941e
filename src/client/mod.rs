use std::fmt;

use crate::{
    bootstrap::RuntimeFacts,
    error::{Error, Result},
};

/// Address consumers connect to when no local container is started.
pub const FALLBACK_ADDRESS: &str = "localhost:9200";

const PEM_CERTIFICATE_HEADER: &str = "-----BEGIN CERTIFICATE-----";

/// PEM encoded CA certificate used as the trust anchor for the HTTP layer.
#[derive(Clone, PartialEq, Eq)]
pub struct CaCertificate {
    pem: Vec<u8>,
}

impl CaCertificate {
    /// Wraps PEM bytes, which must contain at least one certificate block.
    pub fn from_pem(pem: impl Into<Vec<u8>>) -> Result<Self> {
        let pem = pem.into();
        let text = std::str::from_utf8(&pem)
            .map_err(|e| Error::Certificate(format!("not valid UTF-8: {e}")))?;
        if !text.contains(PEM_CERTIFICATE_HEADER) {
            return Err(Error::Certificate("no PEM certificate block found".to_owned()));
        }
        Ok(Self { pem })
    }

    /// Raw PEM bytes.
    pub fn pem(&self) -> &[u8] {
        &self.pem
    }
}

impl fmt::Debug for CaCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaCertificate")
            .field("len", &self.pem.len())
            .finish()
    }
}

/// Basic authentication credentials, valid for any host and realm.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Everything a REST client needs to talk to the Elasticsearch node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    address: String,
    tls: bool,
    ca_certificate: Option<CaCertificate>,
    credentials: Option<Credentials>,
}

impl ClientConfig {
    /// Plain HTTP, unauthenticated configuration for [`FALLBACK_ADDRESS`].
    pub fn fallback() -> Self {
        Self {
            address: FALLBACK_ADDRESS.to_owned(),
            tls: false,
            ca_certificate: None,
            credentials: None,
        }
    }

    /// `host:port` of the node.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the node is reached over TLS.
    pub fn tls(&self) -> bool {
        self.tls
    }

    /// Trust anchor for the node certificate.
    pub fn ca_certificate(&self) -> Option<&CaCertificate> {
        self.ca_certificate.as_ref()
    }

    /// Basic authentication credentials.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Base URL of the node, scheme included.
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}", self.address)
    }

    /// A [`reqwest::ClientBuilder`] trusting the node CA and sending the credentials with
    /// every request.
    #[cfg(feature = "reqwest")]
    #[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
    pub fn reqwest_client_builder(&self) -> Result<reqwest::ClientBuilder> {
        use base64::Engine;
        use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

        let mut builder = reqwest::Client::builder();
        if self.tls {
            builder = builder.https_only(true);
            if let Some(ca) = &self.ca_certificate {
                builder = builder.add_root_certificate(reqwest::Certificate::from_pem(ca.pem())?);
            }
        }
        if let Some(credentials) = &self.credentials {
            let token = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", credentials.username, credentials.password));
            let mut value = HeaderValue::from_str(&format!("Basic {token}")).map_err(|e| {
                Error::InvalidProperty {
                    key: "credentials".to_owned(),
                    value: credentials.username.clone(),
                    reason: e.to_string(),
                }
            })?;
            value.set_sensitive(true);
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }
        Ok(builder)
    }
}

/// Derives the client configuration for a running container.
///
/// Pure function of its inputs: the same facts and CA always give an equal configuration.
pub fn configure(facts: &RuntimeFacts, ca_certificate: CaCertificate) -> ClientConfig {
    ClientConfig {
        address: facts.address.clone(),
        tls: true,
        ca_certificate: Some(ca_certificate),
        credentials: Some(Credentials {
            username: facts.username.clone(),
            password: facts.password.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEM: &str = "-----BEGIN CERTIFICATE-----\nMIIBdummy\n-----END CERTIFICATE-----\n";

    fn facts() -> RuntimeFacts {
        RuntimeFacts {
            image: "docker.elastic.co/elasticsearch/elasticsearch:8.7.1".to_owned(),
            container_name: None,
            container_id: "0123456789ab".to_owned(),
            host: "localhost".to_owned(),
            host_port: 19200,
            internal_port: 9200,
            address: "localhost:19200".to_owned(),
            username: "elastic".to_owned(),
            password: "secret1".to_owned(),
        }
    }

    #[test]
    fn configure_targets_container_over_tls() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let facts = facts();
        let config = configure(&facts, CaCertificate::from_pem(PEM)?);

        assert_eq!(config.address(), facts.address);
        assert!(config.tls());
        assert_eq!(config.base_url(), "https://localhost:19200");
        assert_eq!(config.ca_certificate().map(|ca| ca.pem()), Some(PEM.as_bytes()));
        let credentials = config.credentials().ok_or("credentials missing")?;
        assert_eq!(credentials.username, "elastic");
        assert_eq!(credentials.password, "secret1");
        Ok(())
    }

    #[test]
    fn configure_is_idempotent() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let facts = facts();
        let ca = CaCertificate::from_pem(PEM)?;
        assert_eq!(configure(&facts, ca.clone()), configure(&facts, ca));
        Ok(())
    }

    #[test]
    fn fallback_is_plain_localhost() {
        let config = ClientConfig::fallback();
        assert_eq!(config.address(), "localhost:9200");
        assert!(!config.tls());
        assert_eq!(config.base_url(), "http://localhost:9200");
        assert!(config.ca_certificate().is_none());
        assert!(config.credentials().is_none());
    }

    #[test]
    fn certificate_needs_pem_block() {
        assert!(matches!(
            CaCertificate::from_pem("not a certificate"),
            Err(Error::Certificate(_))
        ));
        assert!(matches!(
            CaCertificate::from_pem(vec![0xff, 0xfe]),
            Err(Error::Certificate(_))
        ));
    }

    #[test]
    fn debug_output_hides_password() {
        let credentials = Credentials {
            username: "elastic".to_owned(),
            password: "secret1".to_owned(),
        };
        let debug = format!("{credentials:?}");
        assert!(debug.contains("elastic"));
        assert!(!debug.contains("secret1"));
    }
}

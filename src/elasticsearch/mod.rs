use std::{borrow::Cow, collections::BTreeMap, fmt};

use testcontainers::{
    core::{ContainerPort, WaitFor},
    Image,
};

use crate::error::{Error, Result};

const NAME: &str = "docker.elastic.co/elasticsearch/elasticsearch";
const TAG: &str = "8.7.1";

/// Image reference started when no other image is configured.
pub const ELASTICSEARCH_DEFAULT_IMAGE: &str = "docker.elastic.co/elasticsearch/elasticsearch:8.7.1";
/// Port that the [`Elasticsearch`] container has internally
/// Used **for API calls over http**, including search, aggregation, monitoring, ...
/// Can be rebound externally via [`testcontainers::core::ImageExt::with_mapped_port`]
///
/// [`Elasticsearch`]: https://elastic.co/
pub const ELASTICSEARCH_API_PORT: ContainerPort = ContainerPort::Tcp(9200);
/// Port that the [`Elasticsearch`] container has internally.
/// Used **for nodes to communicate between each other**. Published on an ephemeral host port,
/// also when [`ELASTICSEARCH_API_PORT`] is bound to a fixed one.
///
/// [`Elasticsearch`]: https://elastic.co/
pub const ELASTICSEARCH_INTER_NODE_PORT: ContainerPort = ContainerPort::Tcp(9300);
/// Built-in superuser of the Elasticsearch security realm.
pub const ELASTICSEARCH_DEFAULT_USERNAME: &str = "elastic";
/// Password of [`ELASTICSEARCH_DEFAULT_USERNAME`] when none is configured.
pub const ELASTICSEARCH_DEFAULT_PASSWORD: &str = "changeme";
/// Environment variable the image reads the superuser password from.
pub const ELASTICSEARCH_PASSWORD_ENV_KEY: &str = "ELASTIC_PASSWORD";
/// Location of the auto-generated HTTP layer CA inside 8.x images.
pub const HTTP_CA_CERT_PATH: &str = "/usr/share/elasticsearch/config/certs/http_ca.crt";

/// A parsed `registry/repository:tag` docker image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    name: String,
    tag: String,
}

impl ImageReference {
    /// Splits `reference` into name and tag. The tag separator is the last `:` after the
    /// last `/`, so registry ports (`host:5000/repo`) stay part of the name.
    /// A missing tag means `latest`.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        let invalid = |reason: &str| Error::InvalidProperty {
            key: "image".to_string(),
            value: reference.to_string(),
            reason: reason.to_string(),
        };
        if reference.is_empty() {
            return Err(invalid("image reference is empty"));
        }

        let path_start = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (name, tag) = match reference[path_start..].rfind(':') {
            Some(i) => {
                let split = path_start + i;
                (&reference[..split], &reference[split + 1..])
            }
            None => (reference, "latest"),
        };
        if name.is_empty() {
            return Err(invalid("image name is empty"));
        }
        if tag.is_empty() {
            return Err(invalid("image tag is empty"));
        }

        Ok(Self {
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Repository part, including the registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag part.
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

/// Module to run [`Elasticsearch`] locally for development and tests.
///
/// Starts a single-node instance based on the official [`Elasticsearch docker image`]
/// with security enabled, so the HTTP API on [`ELASTICSEARCH_API_PORT`] is served over TLS
/// with a self-signed certificate and requires basic authentication as
/// [`ELASTICSEARCH_DEFAULT_USERNAME`].
///
/// The superuser password is kept in the container environment under
/// [`ELASTICSEARCH_PASSWORD_ENV_KEY`] and defaults to [`ELASTICSEARCH_DEFAULT_PASSWORD`].
///
/// # Example
/// ```no_run
/// use local_elasticsearch::{
///     elasticsearch::{Elasticsearch, ELASTICSEARCH_API_PORT},
///     testcontainers::runners::SyncRunner,
/// };
///
/// let node = Elasticsearch::default().with_password("s3cret").start().unwrap();
/// let host = node.get_host().unwrap();
/// let port = node.get_host_port_ipv4(ELASTICSEARCH_API_PORT).unwrap();
///
/// // Use the Elasticsearch API at https://{host}:{port}
/// ```
///
/// [`Elasticsearch`]: https://www.elastic.co/elasticsearch/
/// [`Elasticsearch docker image`]: https://www.docker.elastic.co/r/elasticsearch/elasticsearch
#[derive(Debug, Clone)]
pub struct Elasticsearch {
    name: String,
    tag: String,
    env_vars: BTreeMap<String, String>,
}

impl Default for Elasticsearch {
    fn default() -> Self {
        let mut env_vars = BTreeMap::new();
        env_vars.insert("discovery.type".to_owned(), "single-node".to_owned());
        env_vars.insert(
            "cluster.routing.allocation.disk.threshold_enabled".to_owned(),
            "false".to_owned(),
        );
        env_vars.insert(
            ELASTICSEARCH_PASSWORD_ENV_KEY.to_owned(),
            ELASTICSEARCH_DEFAULT_PASSWORD.to_owned(),
        );

        Self {
            name: NAME.to_owned(),
            tag: TAG.to_owned(),
            env_vars,
        }
    }
}

impl Elasticsearch {
    /// Runs `image` instead of [`ELASTICSEARCH_DEFAULT_IMAGE`].
    pub fn with_image(self, image: ImageReference) -> Self {
        Self {
            name: image.name,
            tag: image.tag,
            ..self
        }
    }

    /// Sets the password of the `elastic` superuser.
    pub fn with_password(mut self, password: &str) -> Self {
        self.env_vars
            .insert(ELASTICSEARCH_PASSWORD_ENV_KEY.to_owned(), password.to_owned());
        self
    }

    /// The `elastic` superuser password as it is passed to the container.
    pub fn password(&self) -> Option<&str> {
        self.env_var(ELASTICSEARCH_PASSWORD_ENV_KEY)
    }

    /// Looks up a variable of the container environment.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env_vars.get(key).map(String::as_str)
    }

    /// `name:tag` of the image this module runs.
    pub fn image_reference(&self) -> String {
        format!("{}:{}", self.name, self.tag)
    }

    fn major_version(&self) -> Option<u32> {
        self.tag.split('.').next()?.parse().ok()
    }
}

impl Image for Elasticsearch {
    fn name(&self) -> &str {
        &self.name
    }

    fn tag(&self) -> &str {
        &self.tag
    }

    fn ready_conditions(&self) -> Vec<WaitFor> {
        // 8.x switched to ECS json logging; unknown tags are assumed recent
        match self.major_version() {
            Some(major) if major < 8 => vec![WaitFor::message_on_stdout(r#""message": "started"#)],
            _ => vec![WaitFor::message_on_stdout(r#""message":"started"#)],
        }
    }

    fn env_vars(
        &self,
    ) -> impl IntoIterator<Item = (impl Into<Cow<'_, str>>, impl Into<Cow<'_, str>>)> {
        &self.env_vars
    }

    fn expose_ports(&self) -> &[ContainerPort] {
        &[ELASTICSEARCH_API_PORT, ELASTICSEARCH_INTER_NODE_PORT]
    }
}

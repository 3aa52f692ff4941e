use std::fmt;

use testcontainers::{
    core::logs::consumer::logging_consumer::LoggingConsumer,
    runners::AsyncRunner,
    ContainerAsync, ContainerRequest, Image, ImageExt,
};

use crate::{
    client::CaCertificate,
    elasticsearch::{
        Elasticsearch, ImageReference, ELASTICSEARCH_API_PORT, ELASTICSEARCH_DEFAULT_USERNAME,
        ELASTICSEARCH_INTER_NODE_PORT, ELASTICSEARCH_PASSWORD_ENV_KEY, HTTP_CA_CERT_PATH,
    },
    error::{Error, Result},
};

#[cfg(feature = "blocking")]
#[cfg_attr(docsrs, doc(cfg(feature = "blocking")))]
pub mod blocking;

/// Overrides applied on top of the default [`Elasticsearch`] container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapOptions {
    /// Image reference, [`ELASTICSEARCH_DEFAULT_IMAGE`](crate::elasticsearch::ELASTICSEARCH_DEFAULT_IMAGE) when absent.
    pub image: Option<String>,
    /// Container name. Only applied when `host_port` is set as well.
    pub container_name: Option<String>,
    /// Host port bound to the HTTP API. The runtime picks an ephemeral port when absent.
    pub host_port: Option<u16>,
    /// Forward the container output to the `log` facade.
    pub follow_log: bool,
    /// Password of the `elastic` superuser. The image default applies when absent.
    pub password: Option<String>,
}

impl BootstrapOptions {
    /// Runs `image` instead of the default image.
    pub fn with_image(self, image: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            ..self
        }
    }

    /// Names the container. Has no effect unless [`BootstrapOptions::with_host_port`] is used too.
    pub fn with_container_name(self, name: impl Into<String>) -> Self {
        Self {
            container_name: Some(name.into()),
            ..self
        }
    }

    /// Binds the HTTP API to a fixed host port.
    pub fn with_host_port(self, port: u16) -> Self {
        Self {
            host_port: Some(port),
            ..self
        }
    }

    /// Forwards container output to the process log.
    pub fn with_follow_log(self, follow: bool) -> Self {
        Self {
            follow_log: follow,
            ..self
        }
    }

    /// Sets the superuser password.
    pub fn with_password(self, password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..self
        }
    }
}

/// Connection facts only known once the container is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeFacts {
    /// Image reference the container runs.
    pub image: String,
    /// Name this crate asked the runtime to use, `None` when the runtime picked one.
    /// The runtime-picked name is not read back; `container_id` identifies the container then.
    pub container_name: Option<String>,
    /// Container id assigned by the runtime.
    pub container_id: String,
    /// Host the container is reachable on.
    pub host: String,
    /// Host port bound to the HTTP API.
    pub host_port: u16,
    /// HTTP API port inside the container, always 9200.
    pub internal_port: u16,
    /// `host:port` of the HTTP API.
    pub address: String,
    /// Superuser name, always `elastic`.
    pub username: String,
    /// Superuser password as read back from the container environment.
    pub password: String,
}

impl RuntimeFacts {
    pub(crate) fn harvest(
        image: &Elasticsearch,
        container_name: Option<String>,
        container_id: &str,
        host: String,
        host_port: u16,
    ) -> Result<Self> {
        let password = image
            .env_var(ELASTICSEARCH_PASSWORD_ENV_KEY)
            .ok_or(Error::MissingPassword(ELASTICSEARCH_PASSWORD_ENV_KEY))?;

        Ok(Self {
            image: image.image_reference(),
            container_name,
            container_id: container_id.to_owned(),
            address: format!("{host}:{host_port}"),
            host,
            host_port,
            internal_port: ELASTICSEARCH_API_PORT.as_u16(),
            username: ELASTICSEARCH_DEFAULT_USERNAME.to_owned(),
            password: password.to_owned(),
        })
    }

    /// Human readable summary, logged once the container is up.
    pub fn banner(&self) -> Banner<'_> {
        Banner(self)
    }
}

/// Startup banner of a running container, see [`RuntimeFacts::banner`].
pub struct Banner<'a>(&'a RuntimeFacts);

impl fmt::Display for Banner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const STARS: &str = "*************************************************************************************";
        const RULE: &str = "|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|+|";
        let facts = self.0;
        let container_name = match &facts.container_name {
            Some(name) => name.clone(),
            None => format!("<generated> (id {})", short_id(&facts.container_id)),
        };

        writeln!(f)?;
        writeln!(f)?;
        writeln!(f, "{STARS}")?;
        writeln!(f, "{RULE}")?;
        writeln!(f)?;
        writeln!(f, "    Running Elasticsearch container for development and testing.")?;
        writeln!(f)?;
        writeln!(f, "    Built with Docker Image: {}", facts.image)?;
        writeln!(f, "    Container Name: {container_name}")?;
        writeln!(f, "    Port Mapping: {} -> {}", facts.host_port, facts.internal_port)?;
        writeln!(f, "    Host Address URL: {}", facts.address)?;
        writeln!(f, "    Username: {}", facts.username)?;
        writeln!(f, "    Password: {}", facts.password)?;
        writeln!(f)?;
        writeln!(f, "    Note: The port referenced in the Host Address URL is a port to")?;
        writeln!(f, "    access the container. Inside the container Elasticsearch is on")?;
        writeln!(f, "    port {} as usual.", facts.internal_port)?;
        writeln!(f)?;
        writeln!(f, "{RULE}")?;
        write!(f, "{STARS}")
    }
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

/// Builds the container request for `options` without starting anything.
///
/// With a fixed host port the inter-node port is still published, on an ephemeral host
/// port. The container name is only applied together with a fixed host port. A name given
/// on its own is dropped with a warning.
pub fn container_request(options: &BootstrapOptions) -> Result<ContainerRequest<Elasticsearch>> {
    let mut image = Elasticsearch::default();
    if let Some(reference) = &options.image {
        image = image.with_image(ImageReference::parse(reference)?);
    }
    if let Some(password) = &options.password {
        image = image.with_password(password);
    }

    let mut request = ContainerRequest::from(image);
    match (options.host_port, &options.container_name) {
        (Some(port), name) => {
            // explicit bindings turn off publish-all, so 9300 needs its own
            request = request
                .with_mapped_port(port, ELASTICSEARCH_API_PORT)
                .with_mapped_port(0, ELASTICSEARCH_INTER_NODE_PORT);
            if let Some(name) = name {
                request = request.with_container_name(name);
            }
        }
        (None, Some(name)) => {
            log::warn!(
                "container name `{name}` is ignored because no host port is configured; \
                 set a host port to name the container"
            );
        }
        (None, None) => {}
    }

    if options.follow_log {
        request = request.with_log_consumer(
            LoggingConsumer::new()
                .with_stdout_level(log::Level::Info)
                .with_stderr_level(log::Level::Warn)
                .with_prefix("elasticsearch"),
        );
    }

    Ok(request)
}

/// Name the runtime was asked to use for the container.
pub(crate) fn requested_container_name(options: &BootstrapOptions) -> Option<String> {
    options
        .host_port
        .and(options.container_name.clone())
}

/// A running Elasticsearch container together with the facts harvested from it.
///
/// Dropping it stops and removes the container.
pub struct LocalElasticsearch {
    container: ContainerAsync<Elasticsearch>,
    facts: RuntimeFacts,
}

impl LocalElasticsearch {
    /// Connection facts of the running container.
    pub fn facts(&self) -> &RuntimeFacts {
        &self.facts
    }

    /// The underlying container handle.
    pub fn container(&self) -> &ContainerAsync<Elasticsearch> {
        &self.container
    }

    /// Reads the self-signed CA that issued the HTTP layer certificate out of the container.
    pub async fn http_ca_certificate(&self) -> Result<CaCertificate> {
        let mut pem = Vec::new();
        self.container
            .copy_file_from(HTTP_CA_CERT_PATH, &mut pem)
            .await?;
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

/// Starts the container described by `options`, waits until the node is ready and
/// harvests its [`RuntimeFacts`].
///
/// Any failure is returned as is: nothing is retried.
pub async fn bootstrap(options: &BootstrapOptions) -> Result<LocalElasticsearch> {
    let request = container_request(options)?;
    log::debug!("starting {}:{}", request.image().name(), request.image().tag());
    let container = request.start().await?;

    let host = container.get_host().await?.to_string();
    let host_port = container.get_host_port_ipv4(ELASTICSEARCH_API_PORT).await?;
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

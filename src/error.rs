use testcontainers::TestcontainersError;

/// Errors raised while configuring, starting or wiring the local Elasticsearch container.
///
/// None of them are recovered from inside this crate: a local search node that
/// cannot start leaves nothing to fall back to except disabling the container altogether.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration value could not be interpreted.
    #[error("invalid value `{value}` for `{key}`: {reason}")]
    InvalidProperty {
        /// Property key as it was supplied.
        key: String,
        /// Raw value.
        value: String,
        /// What is wrong with it.
        reason: String,
    },
    /// The container runtime failed to pull, create, start or inspect the container.
    #[error(transparent)]
    Container(#[from] TestcontainersError),
    /// The password key was not present in the container environment after start.
    #[error("environment variable `{0}` is not set on the Elasticsearch container")]
    MissingPassword(&'static str),
    /// The CA certificate read out of the container is not usable.
    #[error("invalid CA certificate: {0}")]
    Certificate(String),
    /// A REST client could not be assembled from the client configuration.
    #[cfg(feature = "reqwest")]
    #[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
    #[error(transparent)]
    Client(#[from] reqwest::Error),
}

/// Result alias used throughout this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

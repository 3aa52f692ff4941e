//! Process-level settings that decide whether and how the local Elasticsearch container starts.
//!
//! Settings come either from a key/value source using dotted keys
//! (`local.elasticsearch.container.port=19200`) or from environment variables, where
//! the same key is upper-cased with dots replaced by underscores
//! (`LOCAL_ELASTICSEARCH_CONTAINER_PORT=19200`). Both are layered with `figment` over
//! the defaults and extracted in one go.

use std::collections::BTreeMap;

use figment::{
    providers::{Env, Serialized},
    value::Value,
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::{
    bootstrap::BootstrapOptions,
    error::{Error, Result},
};

/// Turns the local container on (default) or off.
pub const ENABLED_KEY: &str = "local.elasticsearch.enabled";
/// Overrides [`ELASTICSEARCH_DEFAULT_IMAGE`](crate::elasticsearch::ELASTICSEARCH_DEFAULT_IMAGE).
pub const CONTAINER_IMAGE_KEY: &str = "local.elasticsearch.container.image";
/// Container name. Only applied together with [`CONTAINER_PORT_KEY`].
pub const CONTAINER_NAME_KEY: &str = "local.elasticsearch.container.name";
/// Host port bound to the HTTP API port of the container.
pub const CONTAINER_PORT_KEY: &str = "local.elasticsearch.container.port";
/// Forward container output to the `log` facade.
pub const CONTAINER_LOG_FOLLOW_KEY: &str = "local.elasticsearch.container.log.follow";
/// Password of the `elastic` superuser.
pub const PASSWORD_KEY: &str = "local.elasticsearch.password";

/// Prefix shared by every key.
pub const KEY_PREFIX: &str = "local.elasticsearch.";
/// Prefix shared by every environment variable.
pub const ENV_PREFIX: &str = "LOCAL_ELASTICSEARCH_";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawProperties {
    enabled: Option<bool>,
    container: RawContainer,
    password: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawContainer {
    image: Option<String>,
    name: Option<String>,
    port: Option<u16>,
    log: RawLog,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawLog {
    follow: Option<bool>,
}

/// Settings of the local Elasticsearch container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalElasticsearchProperties {
    /// Start the container. When `false` consumers connect to `localhost:9200` instead.
    pub enabled: bool,
    /// Image reference to run.
    pub container_image: Option<String>,
    /// Container name, only honoured together with `container_port`.
    pub container_name: Option<String>,
    /// Fixed host port for the HTTP API. An ephemeral port is used when absent.
    pub container_port: Option<u16>,
    /// Forward container stdout/stderr to the process log.
    pub follow_container_log: bool,
    /// Superuser password. The image default applies when absent.
    pub password: Option<String>,
}

impl Default for LocalElasticsearchProperties {
    fn default() -> Self {
        Self {
            enabled: true,
            container_image: None,
            container_name: None,
            container_port: None,
            follow_container_log: false,
            password: None,
        }
    }
}

impl LocalElasticsearchProperties {
    /// Reads settings from `key`/`value` pairs. Keys outside [`KEY_PREFIX`] are skipped and
    /// blank values count as absent.
    pub fn from_properties<K, V>(properties: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut supplied = BTreeMap::new();
        let mut figment = Figment::from(Serialized::defaults(RawProperties::default()));
        for (key, value) in properties {
            let (key, value) = (key.as_ref().trim(), value.as_ref().trim());
            let Some(path) = key.strip_prefix(KEY_PREFIX) else {
                log::trace!("ignoring unknown property `{key}`");
                continue;
            };
            if value.is_empty() {
                continue;
            }
            // parsed the way figment parses environment values: `true`, `19200`, ...
            let parsed = if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
                Value::from(value.eq_ignore_ascii_case("true"))
            } else {
                value
                    .parse::<Value>()
                    .unwrap_or_else(|_| Value::from(value.to_owned()))
            };
            figment = figment.merge(Serialized::default(path, parsed));
            supplied.insert(path.to_owned(), value.to_owned());
        }

        let raw: RawProperties = figment
            .extract()
            .map_err(|e| invalid_from_figment(e, &supplied))?;
        Self::validate(raw, &supplied)
    }

    /// Reads settings from `LOCAL_ELASTICSEARCH_*` environment variables, where `_`
    /// separates key segments (`LOCAL_ELASTICSEARCH_CONTAINER_LOG_FOLLOW`).
    pub fn from_env() -> Result<Self> {
        let env = Env::prefixed(ENV_PREFIX).split("_");
        Self::from_properties(
            env.iter()
                .map(|(key, value)| (format!("{KEY_PREFIX}{}", key.as_str().to_ascii_lowercase()), value)),
        )
    }

    fn validate(raw: RawProperties, supplied: &BTreeMap<String, String>) -> Result<Self> {
        if raw.container.port == Some(0) {
            let value = supplied.get("container.port").cloned().unwrap_or_default();
            return Err(invalid(CONTAINER_PORT_KEY, &value, "port must not be 0"));
        }
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        Ok(Self {
            enabled: raw.enabled.unwrap_or(true),
            container_image: present(raw.container.image),
            container_name: present(raw.container.name),
            container_port: raw.container.port,
            follow_container_log: raw.container.log.follow.unwrap_or(false),
            password: present(raw.password),
        })
    }

    /// Options for [`bootstrap`](crate::bootstrap::bootstrap) derived from these settings.
    pub fn bootstrap_options(&self) -> BootstrapOptions {
        BootstrapOptions {
            image: self.container_image.clone(),
            container_name: self.container_name.clone(),
            host_port: self.container_port,
            follow_log: self.follow_container_log,
            password: self.password.clone(),
        }
    }
}

fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Error {
    Error::InvalidProperty {
        key: key.to_owned(),
        value: value.to_owned(),
        reason: reason.into(),
    }
}

fn invalid_from_figment(error: figment::Error, supplied: &BTreeMap<String, String>) -> Error {
    let path = error.path.join(".");
    let value = supplied.get(&path).cloned().unwrap_or_default();
    invalid(&format!("{KEY_PREFIX}{path}"), &value, error.kind.to_string())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn defaults_enable_container_without_overrides() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let settings = LocalElasticsearchProperties::from_properties(Vec::<(&str, &str)>::new())?;
        assert_eq!(settings, LocalElasticsearchProperties::default());
        assert!(settings.enabled);
        assert!(!settings.follow_container_log);

        let options = settings.bootstrap_options();
        assert_eq!(options, BootstrapOptions::default());
        Ok(())
    }

    #[test]
    fn reads_every_known_key() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let settings = LocalElasticsearchProperties::from_properties([
            (ENABLED_KEY, "true"),
            (CONTAINER_IMAGE_KEY, "docker.elastic.co/elasticsearch/elasticsearch:8.8.0"),
            (CONTAINER_NAME_KEY, "local-es"),
            (CONTAINER_PORT_KEY, "19200"),
            (CONTAINER_LOG_FOLLOW_KEY, "true"),
            (PASSWORD_KEY, "secret1"),
            ("spring.profiles.active", "default"),
        ])?;

        let options = settings.bootstrap_options();
        assert_eq!(
            options.image.as_deref(),
            Some("docker.elastic.co/elasticsearch/elasticsearch:8.8.0")
        );
        assert_eq!(options.container_name.as_deref(), Some("local-es"));
        assert_eq!(options.host_port, Some(19200));
        assert!(options.follow_log);
        assert_eq!(options.password.as_deref(), Some("secret1"));
        Ok(())
    }

    #[test]
    fn disabled_flag_is_honoured() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let settings = LocalElasticsearchProperties::from_properties([(ENABLED_KEY, "false")])?;
        assert!(!settings.enabled);
        Ok(())
    }

    #[test]
    fn booleans_ignore_case() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let settings = LocalElasticsearchProperties::from_properties([
            (ENABLED_KEY, "FALSE"),
            (CONTAINER_LOG_FOLLOW_KEY, "True"),
        ])?;
        assert!(!settings.enabled);
        assert!(settings.follow_container_log);
        Ok(())
    }

    #[test]
    fn blank_values_are_absent() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let settings = LocalElasticsearchProperties::from_properties([
            (CONTAINER_PORT_KEY, " "),
            (PASSWORD_KEY, ""),
        ])?;
        assert_eq!(settings.container_port, None);
        assert_eq!(settings.password, None);
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (key, value) in [
            (CONTAINER_PORT_KEY, "nine-two-hundred"),
            (CONTAINER_PORT_KEY, "0"),
            (CONTAINER_PORT_KEY, "70000"),
            (ENABLED_KEY, "sometimes"),
            (CONTAINER_LOG_FOLLOW_KEY, "maybe"),
        ] {
            let err = LocalElasticsearchProperties::from_properties([(key, value)]).unwrap_err();
            match err {
                Error::InvalidProperty { key: k, value: v, .. } => {
                    assert_eq!(k, key);
                    assert_eq!(v, value);
                }
                other => panic!("unexpected error for {key}={value}: {other}"),
            }
        }
    }

    #[serial]
    #[test]
    fn environment_overrides_are_read() -> Result<(), Box<dyn std::error::Error + 'static>> {
        std::env::set_var("LOCAL_ELASTICSEARCH_CONTAINER_PORT", "19201");
        std::env::set_var("LOCAL_ELASTICSEARCH_CONTAINER_LOG_FOLLOW", "true");
        std::env::set_var("LOCAL_ELASTICSEARCH_PASSWORD", "from-env");
        let settings = LocalElasticsearchProperties::from_env();
        std::env::remove_var("LOCAL_ELASTICSEARCH_CONTAINER_PORT");
        std::env::remove_var("LOCAL_ELASTICSEARCH_CONTAINER_LOG_FOLLOW");
        std::env::remove_var("LOCAL_ELASTICSEARCH_PASSWORD");

        let settings = settings?;
        assert!(settings.enabled);
        assert_eq!(settings.container_port, Some(19201));
        assert!(settings.follow_container_log);
        assert_eq!(settings.password.as_deref(), Some("from-env"));
        Ok(())
    }
}

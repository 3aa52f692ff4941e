// let's document our code for other/future developers
#![deny(missing_docs)]
#![cfg_attr(docsrs, deny(rustdoc::broken_intra_doc_links))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]
//! Please have a look at the documentation of the separate modules for examples on how to use them.

/// **Bootstrapper**: starts the container and harvests its runtime facts
pub mod bootstrap;
/// **Configurator**: client configuration derived from a running container
pub mod client;
pub mod config;
/// **Elasticsearch** (distributed search engine) container image
pub mod elasticsearch;
mod error;
pub mod startup;

pub use error::{Error, Result};

/// Re-exported version of `testcontainers` to avoid version conflicts
pub use testcontainers;

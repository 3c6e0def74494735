//! Crate-wide error surface for operational tooling. The library's actual
//! request path returns `store_core::StoreError` directly (§7's taxonomy
//! lives there, next to the types it's about); this wrapper only exists so
//! `msgstorectl` can report configuration and store failures through one
//! `miette::Diagnostic` with readable, colorized output.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] store_core::StoreError),

    #[error("failed to load configuration")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

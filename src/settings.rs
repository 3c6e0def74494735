//! Configuration loading: layers an optional TOML file under
//! environment-variable overrides (`MSGSTORE_*`), the same merge style this
//! repository's donor CLI tooling uses for its own config, then validates
//! the result before any bucket is opened.

use std::path::Path;

use store_core::StoreConfig;

const ENV_PREFIX: &str = "MSGSTORE";

/// Loads a `StoreConfig` from `path` (if it exists) with environment
/// overrides layered on top, e.g. `MSGSTORE_BUCKET_COUNT=32`. Missing
/// fields fall back to `StoreConfig::default()`. Returns a `config::Error`
/// on malformed input; `StoreConfig::validate` is left to the caller so it
/// can be surfaced alongside backend-open errors in one place.
pub fn load(path: Option<&Path>) -> Result<StoreConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path.to_path_buf()).required(false));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("_")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load(Some(Path::new("/nonexistent/msgstore.toml"))).unwrap();
        assert_eq!(cfg.bucket_count, StoreConfig::default().bucket_count);
    }

    #[test]
    fn no_path_still_applies_env_overrides() {
        let cfg = load(None).unwrap();
        assert_eq!(cfg.store_dir, StoreConfig::default().store_dir);
    }
}

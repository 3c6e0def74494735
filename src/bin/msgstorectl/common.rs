use std::path::{Path, PathBuf};

use miette::{Context, IntoDiagnostic};
use tracing_subscriber::EnvFilter;
use vmq_offline_store::{RedbMessageStore, StoreConfig};

#[derive(Debug, clap::Args)]
pub struct StoreArgs {
    /// path to a TOML config file (defaults applied for anything it omits)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// overrides the configured store_dir
    #[arg(long)]
    pub store_dir: Option<PathBuf>,
}

pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub async fn open_store(args: &StoreArgs) -> miette::Result<RedbMessageStore> {
    let mut config: StoreConfig = vmq_offline_store::settings::load(args.config.as_deref())
        .into_diagnostic()
        .context("loading msgstorectl configuration")?;

    if let Some(store_dir) = &args.store_dir {
        config.store_dir = store_dir.clone();
    }

    config
        .validate()
        .into_diagnostic()
        .context("validating store configuration")?;

    RedbMessageStore::open(config)
        .await
        .into_diagnostic()
        .context("opening message store")
}

pub fn parse_msg_ref(hex_str: &str) -> miette::Result<vmq_offline_store::MsgRef> {
    let bytes = hex::decode(hex_str)
        .into_diagnostic()
        .with_context(|| format!("msg_ref '{hex_str}' is not valid hex"))?;
    Ok(vmq_offline_store::MsgRef::from(bytes))
}

#[allow(dead_code)]
pub fn default_config_path() -> &'static Path {
    Path::new("msgstore.toml")
}

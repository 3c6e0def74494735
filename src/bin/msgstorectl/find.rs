use comfy_table::Table;
use miette::{IntoDiagnostic, Result};
use vmq_offline_store::{FindMode, SubscriberId};

use crate::common::{self, StoreArgs};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[command(flatten)]
    store: StoreArgs,

    /// tenant namespace of the subscriber to query
    #[arg(long)]
    mountpoint: String,

    /// MQTT client id of the subscriber to query
    #[arg(long)]
    client_id: String,

    /// use the fast recovery-preloaded path instead of a full fan-out scan
    #[arg(long)]
    queue_init: bool,
}

pub async fn run(args: &Args) -> Result<()> {
    common::setup_tracing();
    let store = common::open_store(&args.store).await?;

    let subscriber = SubscriberId::new(args.mountpoint.clone(), args.client_id.clone());
    let mode = if args.queue_init { FindMode::QueueInit } else { FindMode::Other };

    let refs = store.find(subscriber, mode).await.into_diagnostic()?;

    let mut table = Table::new();
    table.set_header(vec!["#", "msg_ref"]);
    for (i, msg_ref) in refs.iter().enumerate() {
        table.add_row(vec![(i + 1).to_string(), msg_ref.to_string()]);
    }

    println!("{table}");
    Ok(())
}

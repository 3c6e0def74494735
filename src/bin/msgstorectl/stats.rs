use comfy_table::Table;
use miette::Result;

use crate::common::{self, StoreArgs};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[command(flatten)]
    store: StoreArgs,
}

pub async fn run(args: &Args) -> Result<()> {
    common::setup_tracing();
    let store = common::open_store(&args.store).await?;

    let mut table = Table::new();
    table.set_header(vec!["bucket", "state", "refcount rows"]);

    for stats in store.bucket_stats().await {
        let state = match store.bucket_state(stats.instance_id) {
            vmq_offline_store::BucketState::Initialized => "initialized",
            vmq_offline_store::BucketState::Initializing => "initializing",
        };
        table.add_row(vec![
            stats.instance_id.to_string(),
            state.to_string(),
            stats.refcount_rows.to_string(),
        ]);
    }

    println!("{table}");
    Ok(())
}

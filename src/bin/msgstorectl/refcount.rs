use miette::{IntoDiagnostic, Result};

use crate::common::{self, StoreArgs};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[command(flatten)]
    store: StoreArgs,

    /// hex-encoded msg_ref to inspect
    #[arg(long)]
    msg_ref: String,
}

pub async fn run(args: &Args) -> Result<()> {
    common::setup_tracing();
    let store = common::open_store(&args.store).await?;

    let msg_ref = common::parse_msg_ref(&args.msg_ref)?;
    let count = store.refcount(&msg_ref).await.into_diagnostic()?;

    println!("{msg_ref}: {count}");
    Ok(())
}

use clap::Parser;
use miette::Result;

mod common;
mod find;
mod refcount;
mod stats;

/// Operator CLI for inspecting a running (or offline, between broker
/// restarts) message store directory: per-bucket counts, a one-off
/// subscriber `find`, and a single message's refcount. This is diagnostic
/// tooling around the library, not a substitute for the programmatic
/// `MessageStore` surface, which remains the primary interface.
#[derive(Parser)]
#[clap(name = "msgstorectl")]
#[clap(bin_name = "msgstorectl")]
#[clap(author, version, about, long_about = None)]
enum MsgStoreCtl {
    /// Report per-bucket state and refcount-table size
    Stats(stats::Args),
    /// Run a one-off find for a subscriber
    Find(find::Args),
    /// Inspect a single message's refcount
    Refcount(refcount::Args),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = MsgStoreCtl::parse();

    match args {
        MsgStoreCtl::Stats(x) => stats::run(&x).await?,
        MsgStoreCtl::Find(x) => find::run(&x).await?,
        MsgStoreCtl::Refcount(x) => refcount::run(&x).await?,
    }

    Ok(())
}

//! The find coordinator: a transient, per-call protocol run on behalf of a
//! subscriber reconnecting or draining its queue. See §4.4 of the design
//! notes carried in `SPEC_FULL.md` for the two-path protocol this
//! implements.

use store_core::{FindMode, MsgRef, ScanId, StagingTable, StoreError, SubscriberId};

use crate::registry::BucketRegistry;

/// Runs one `find` call for `subscriber`.
///
/// In `QueueInit` mode, first harvests the subscriber's entries under the
/// reserved `Init` scan-id (populated by every bucket's recovery scan at
/// startup); if that staging slot has anything, it is returned directly
/// with no disk scan. Otherwise (including a second `QueueInit` call, whose
/// `Init` slot the first call already drained) a fresh scan-id is minted
/// and every registered bucket is asked to scan its on-disk index for this
/// subscriber; a bucket that has shut down is skipped silently, but a
/// bucket that hits a genuine storage error fails the whole call.
pub async fn find(
    registry: &BucketRegistry,
    staging: &StagingTable,
    subscriber: &SubscriberId,
    mode: FindMode,
) -> Result<Vec<MsgRef>, StoreError> {
    if mode == FindMode::QueueInit {
        let entries = staging.take(&ScanId::Init, subscriber);
        if !entries.is_empty() {
            return Ok(entries.into_iter().map(|entry| entry.msg_ref).collect());
        }
    }

    let scan_id = ScanId::fresh();
    for bucket in registry.get_buckets() {
        match bucket.find_for_subscriber(scan_id.clone(), subscriber.clone()).await {
            Ok(()) => {}
            Err(StoreError::BucketGone) => continue,
            Err(err) => return Err(err),
        }
    }

    let entries = staging.take(&scan_id, subscriber);
    Ok(entries.into_iter().map(|entry| entry.msg_ref).collect())
}

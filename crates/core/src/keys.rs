//! Order-preserving key byte encoding shared by every backend.
//!
//! All multi-byte lengths are big-endian so that lexicographic byte order on
//! the raw key bytes matches the grouping this store needs: `msg`-tagged
//! keys sort strictly before `idx`-tagged keys (the tag byte is compared
//! first), and within `idx`, keys sort by `(mountpoint, client_id,
//! msg_ref)`, i.e. by `(subscriber_id, msg_ref)` as required. Variable-length
//! fields are length-prefixed (u16, big-endian) rather than raw-concatenated
//! so that one subscriber's client id can never be mistaken for a prefix of
//! another's.

use crate::ids::{MsgRef, SubscriberId};

const TAG_MSG: u8 = 0x01;
const TAG_IDX: u8 = 0x02;

fn push_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    let len = u16::try_from(bytes.len()).expect("key component exceeds 64KiB");
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
}

/// Key for the payload record: `tag=msg, msg_ref, mountpoint`.
pub fn encode_msg_key(mountpoint: &str, msg_ref: &MsgRef) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 2 + msg_ref.as_bytes().len() + 2 + mountpoint.len());
    out.push(TAG_MSG);
    push_len_prefixed(&mut out, msg_ref.as_bytes());
    push_len_prefixed(&mut out, mountpoint.as_bytes());
    out
}

/// Key for a subscriber index entry: `tag=idx, (mountpoint, client_id),
/// msg_ref`.
pub fn encode_idx_key(subscriber: &SubscriberId, msg_ref: &MsgRef) -> Vec<u8> {
    let mut out = encode_idx_prefix(subscriber);
    push_len_prefixed(&mut out, msg_ref.as_bytes());
    out
}

/// Prefix shared by every index key for one subscriber; a forward range
/// scan starting here and bounded by `idx_prefix_upper_bound` visits exactly
/// that subscriber's entries.
pub fn encode_idx_prefix(subscriber: &SubscriberId) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        1 + 2 + subscriber.mountpoint.len() + 2 + subscriber.client_id.len(),
    );
    out.push(TAG_IDX);
    push_len_prefixed(&mut out, subscriber.mountpoint.as_bytes());
    push_len_prefixed(&mut out, subscriber.client_id.as_bytes());
    out
}

/// Exclusive upper bound for a range scan over `encode_idx_prefix`: the
/// smallest key that is *not* an extension of the prefix.
pub fn idx_prefix_upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut out = prefix.to_vec();
    for i in (0..out.len()).rev() {
        if out[i] != 0xff {
            out[i] += 1;
            out.truncate(i + 1);
            return out;
        }
    }
    // prefix is all 0xff bytes (never happens here: it starts with TAG_IDX);
    // fall back to a key guaranteed to be greater than anything we write.
    out.push(0xff);
    out
}

/// The first possible key for the whole `idx` tag range, used by recovery's
/// full-range scan.
pub fn idx_range_start() -> Vec<u8> {
    vec![TAG_IDX]
}

/// Exclusive upper bound for the whole `idx` tag range.
pub fn idx_range_end() -> Vec<u8> {
    vec![TAG_IDX + 1]
}

/// Decodes an index key back into its constituent parts, returning `None`
/// if `bytes` is not a well-formed `idx` key.
pub fn decode_idx_key(bytes: &[u8]) -> Option<(SubscriberId, MsgRef)> {
    if bytes.first() != Some(&TAG_IDX) {
        return None;
    }
    let mut cursor = 1usize;
    let mountpoint = read_len_prefixed(bytes, &mut cursor)?;
    let client_id = read_len_prefixed(bytes, &mut cursor)?;
    let msg_ref = read_len_prefixed(bytes, &mut cursor)?;
    if cursor != bytes.len() {
        return None;
    }
    Some((
        SubscriberId {
            mountpoint: String::from_utf8(mountpoint).ok()?,
            client_id: String::from_utf8(client_id).ok()?,
        },
        MsgRef::from(msg_ref),
    ))
}

fn read_len_prefixed(bytes: &[u8], cursor: &mut usize) -> Option<Vec<u8>> {
    let len_bytes: [u8; 2] = bytes.get(*cursor..*cursor + 2)?.try_into().ok()?;
    let len = u16::from_be_bytes(len_bytes) as usize;
    *cursor += 2;
    let data = bytes.get(*cursor..*cursor + len)?.to_vec();
    *cursor += len;
    Some(data)
}

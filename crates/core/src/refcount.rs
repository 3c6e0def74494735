use std::collections::HashMap;

use crate::ids::MsgRef;

/// Outcome of a `decr` call, mirroring the original's three-way result:
/// the counter row is simply absent (an observable caller bug), it
/// transitioned to zero (the row is removed), or it is still positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrOutcome {
    NotFound,
    Zero,
    Positive(u64),
}

/// In-memory mapping `msg_ref -> positive_integer`, private to one bucket.
///
/// Not internally synchronized: callers (the bucket actor) must guarantee
/// that only one task mutates a given table at a time. This is free under
/// the single-actor-per-bucket discipline; see the bucket module.
#[derive(Debug, Default)]
pub struct RefcountTable {
    counts: HashMap<MsgRef, u64>,
}

impl RefcountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the refcount for `msg_ref`, inserting it at 1 if absent.
    /// Returns the new total.
    pub fn incr(&mut self, msg_ref: &MsgRef) -> u64 {
        let entry = self.counts.entry(msg_ref.clone()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Decrements the refcount for `msg_ref`. Removes the row if it reaches
    /// zero.
    pub fn decr(&mut self, msg_ref: &MsgRef) -> DecrOutcome {
        let Some(count) = self.counts.get_mut(msg_ref) else {
            return DecrOutcome::NotFound;
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.counts.remove(msg_ref);
            DecrOutcome::Zero
        } else {
            DecrOutcome::Positive(*count)
        }
    }

    /// Current refcount, or 0 if the row is absent.
    pub fn get(&self, msg_ref: &MsgRef) -> u64 {
        self.counts.get(msg_ref).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mref(b: u8) -> MsgRef {
        MsgRef::from(vec![b])
    }

    #[test]
    fn first_incr_returns_one() {
        let mut t = RefcountTable::new();
        assert_eq!(t.incr(&mref(1)), 1);
        assert_eq!(t.incr(&mref(1)), 2);
    }

    #[test]
    fn decr_on_absent_key_reports_not_found() {
        let mut t = RefcountTable::new();
        assert_eq!(t.decr(&mref(9)), DecrOutcome::NotFound);
    }

    #[test]
    fn decr_to_zero_removes_row() {
        let mut t = RefcountTable::new();
        t.incr(&mref(1));
        assert_eq!(t.decr(&mref(1)), DecrOutcome::Zero);
        assert_eq!(t.get(&mref(1)), 0);
        assert!(t.is_empty());
    }

    #[test]
    fn decr_above_zero_stays_positive() {
        let mut t = RefcountTable::new();
        t.incr(&mref(1));
        t.incr(&mref(1));
        assert_eq!(t.decr(&mref(1)), DecrOutcome::Positive(1));
        assert_eq!(t.get(&mref(1)), 1);
    }
}

use std::collections::HashMap;
use std::sync::RwLock;

use velora_core::{AggregateId, ShopId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    shop_id: ShopId,
    aggregate_id: AggregateId,
}

/// Outcome of a cursor check for an incoming envelope.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum CursorCheck {
    /// New event; apply it and advance the cursor afterwards.
    Apply,
    /// Duplicate or replay (at-least-once delivery); safe to ignore.
    Duplicate,
}

/// Per (shop, aggregate) stream cursors shared by all projections.
///
/// Enforces strictly monotonic sequence numbers per stream, while allowing
/// the first observed event of a stream to carry any positive sequence.
#[derive(Debug, Default)]
pub(crate) struct SequenceCursors {
    inner: RwLock<HashMap<CursorKey, u64>>,
}

impl SequenceCursors {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Check `seq` against the stream cursor. Returns the last seen sequence
    /// number in the error case.
    pub(crate) fn check(
        &self,
        shop_id: ShopId,
        aggregate_id: AggregateId,
        seq: u64,
    ) -> Result<CursorCheck, u64> {
        let key = CursorKey {
            shop_id,
            aggregate_id,
        };
        let last = match self.inner.read() {
            Ok(map) => *map.get(&key).unwrap_or(&0),
            Err(_) => 0,
        };

        if seq == 0 {
            return Err(last);
        }
        if seq <= last {
            return Ok(CursorCheck::Duplicate);
        }
        if seq != last + 1 && last != 0 {
            return Err(last);
        }
        Ok(CursorCheck::Apply)
    }

    pub(crate) fn advance(&self, shop_id: ShopId, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(
                CursorKey {
                    shop_id,
                    aggregate_id,
                },
                seq,
            );
        }
    }

    pub(crate) fn clear_shop(&self, shop_id: ShopId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|k, _| k.shop_id != shop_id);
        }
    }
}

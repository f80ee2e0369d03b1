// Copyright 2018 Parity Technologies (UK) Ltd.
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
// OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! PRUNE backoff tracking (spec.md section 4.2).
//!
//! Expired entries are semantically equivalent to absence, so the table is a
//! bounded LRU rather than a map that needs an explicit sweep: eviction under
//! pressure only ever discards entries that `is_backoff`/`is_flood` would
//! already treat as stale or nearly so.

use lru::LruCache;

use crate::peer::PeerId;
use crate::topic::TopicHash;

/// Capacity named in spec.md section 4.2.
const BACKOFF_TABLE_CAPACITY: usize = 10_240;

/// Tracks PRUNE backoff expiry per `(peer, topic)`.
pub struct BackoffTable {
    expiry_ms: LruCache<(PeerId, TopicHash), u64>,
}

impl BackoffTable {
    pub fn new() -> Self {
        BackoffTable {
            expiry_ms: LruCache::new(BACKOFF_TABLE_CAPACITY),
        }
    }

    /// Records a backoff of `delay_ms` starting at `now_ms`.
    pub fn set(&mut self, peer: PeerId, topic: TopicHash, now_ms: u64, delay_ms: u64) {
        self.expiry_ms.put((peer, topic), now_ms + delay_ms);
    }

    /// `true` while the peer is still within its backoff window for `topic`.
    ///
    /// Uses `peek` rather than `get`: a mere liveness check should not bump
    /// the entry's LRU recency.
    pub fn is_backoff(&self, peer: &PeerId, topic: &TopicHash, now_ms: u64) -> bool {
        match self.expiry_ms.peek(&(*peer, topic.clone())) {
            Some(&expiry) => now_ms < expiry,
            None => false,
        }
    }

    /// `true` if the peer re-GRAFTed within `graft_flood_threshold` of the
    /// PRUNE that set this backoff: `now < prune_time + graft_flood_threshold`,
    /// where `prune_time = expiry - prune_backoff` (spec.md section 8,
    /// scenario 1: PRUNE at t=0 then GRAFT at t=100ms floods).
    pub fn is_flood(
        &self,
        peer: &PeerId,
        topic: &TopicHash,
        now_ms: u64,
        prune_backoff_ms: u64,
        graft_flood_threshold_ms: u64,
    ) -> bool {
        match self.expiry_ms.peek(&(*peer, topic.clone())) {
            Some(&expiry) => {
                let prune_time = expiry.saturating_sub(prune_backoff_ms);
                now_ms < prune_time + graft_flood_threshold_ms
            }
            None => false,
        }
    }
}

impl Default for BackoffTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_backoff_is_active_until_expiry() {
        let mut table = BackoffTable::new();
        let peer = PeerId::random();
        let topic: TopicHash = "t".into();
        table.set(peer, topic.clone(), 1_000, 60_000);

        assert!(table.is_backoff(&peer, &topic, 1_000));
        assert!(table.is_backoff(&peer, &topic, 60_999));
        assert!(!table.is_backoff(&peer, &topic, 61_000));
    }

    #[test]
    fn unknown_pair_is_not_backoff() {
        let mut table = BackoffTable::new();
        let peer = PeerId::random();
        assert!(!table.is_backoff(&peer, &"t".into(), 0));
    }

    #[test]
    fn flood_detected_shortly_after_prune() {
        // spec.md section 8, scenario 1: PRUNE at t=0, GRAFT at t=100ms floods.
        let mut table = BackoffTable::new();
        let peer = PeerId::random();
        let topic: TopicHash = "t".into();
        table.set(peer, topic.clone(), 0, 60_000);
        assert!(table.is_flood(&peer, &topic, 100, 60_000, 10_000));
    }

    #[test]
    fn flood_not_detected_once_threshold_elapses() {
        let mut table = BackoffTable::new();
        let peer = PeerId::random();
        let topic: TopicHash = "t".into();
        table.set(peer, topic.clone(), 0, 60_000);
        assert!(!table.is_flood(&peer, &topic, 10_000, 60_000, 10_000));
    }

    #[test]
    fn flood_window_anchored_to_prune_time_not_expiry() {
        // A longer backoff delay shifts expiry but not the flood window,
        // which is anchored to the original PRUNE time.
        let mut table = BackoffTable::new();
        let peer = PeerId::random();
        let topic: TopicHash = "t".into();
        table.set(peer, topic.clone(), 0, 120_000);
        assert!(table.is_flood(&peer, &topic, 9_999, 120_000, 10_000));
        assert!(!table.is_flood(&peer, &topic, 10_001, 120_000, 10_000));
    }
}

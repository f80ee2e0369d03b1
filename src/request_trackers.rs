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

//! Per-heartbeat-window bookkeeping for IHAVE/IWANT rate limiting
//! (spec.md section 3, "RequestTrackers").

use lru::LruCache;

use crate::message::MessageId;
use crate::peer::PeerId;

const COUNTER_CAPACITY: usize = 256;
const IWANT_REQUESTS_CAPACITY: usize = 10_240;

/// `iAsked`: ids asked of a peer during the current heartbeat window.
#[derive(Default)]
pub struct AskedCounter(Option<LruCache<PeerId, usize>>);

impl AskedCounter {
    pub fn new() -> Self {
        AskedCounter(Some(LruCache::new(COUNTER_CAPACITY)))
    }

    pub fn get(&mut self, peer: &PeerId) -> usize {
        self.cache().get(peer).copied().unwrap_or(0)
    }

    pub fn add(&mut self, peer: PeerId, delta: usize) {
        let current = self.get(&peer);
        self.cache().put(peer, current + delta);
    }

    /// Clears all counters; called at the start of each heartbeat (§4.7 step 1).
    pub fn reset(&mut self) {
        self.0 = Some(LruCache::new(COUNTER_CAPACITY));
    }

    fn cache(&mut self) -> &mut LruCache<PeerId, usize> {
        self.0.get_or_insert_with(|| LruCache::new(COUNTER_CAPACITY))
    }
}

/// `peerIHave`: IHAVE messages received from a peer during the current window.
#[derive(Default)]
pub struct IHaveCounter(Option<LruCache<PeerId, usize>>);

impl IHaveCounter {
    pub fn new() -> Self {
        IHaveCounter(Some(LruCache::new(COUNTER_CAPACITY)))
    }

    /// Increments the peer's counter and returns the new value.
    pub fn increment(&mut self, peer: PeerId) -> usize {
        let next = self.cache().get(&peer).copied().unwrap_or(0) + 1;
        self.cache().put(peer, next);
        next
    }

    pub fn reset(&mut self) {
        self.0 = Some(LruCache::new(COUNTER_CAPACITY));
    }

    fn cache(&mut self) -> &mut LruCache<PeerId, usize> {
        self.0.get_or_insert_with(|| LruCache::new(COUNTER_CAPACITY))
    }
}

/// `iWantRequests`: outstanding IWANT asks awaiting fulfilment.
pub struct IWantRequests {
    requested_at_ms: LruCache<(PeerId, MessageId), u64>,
}

impl IWantRequests {
    pub fn new() -> Self {
        IWantRequests {
            requested_at_ms: LruCache::new(IWANT_REQUESTS_CAPACITY),
        }
    }

    /// Records a single outstanding ask (spec.md section 4.5, "IWANT emission").
    pub fn record(&mut self, peer: PeerId, id: MessageId, now_ms: u64) {
        self.requested_at_ms.put((peer, id), now_ms);
    }

    /// Clears the tracked ask on first-seen delivery of `id` from `peer`.
    pub fn clear(&mut self, peer: &PeerId, id: &MessageId) {
        self.requested_at_ms.pop(&(*peer, id.clone()));
    }

    /// Removes entries older than `iwant_followup_time_ms`, returning the
    /// peers whose ask went unfulfilled (one misbehaviour penalty each, per
    /// spec.md section 4.7 step 2).
    pub fn sweep_stale(&mut self, now_ms: u64, iwant_followup_time_ms: u64) -> Vec<PeerId> {
        let stale: Vec<(PeerId, MessageId)> = self
            .requested_at_ms
            .iter()
            .filter(|(_, &requested_at)| now_ms.saturating_sub(requested_at) > iwant_followup_time_ms)
            .map(|(key, _)| key.clone())
            .collect();

        let mut offenders = Vec::with_capacity(stale.len());
        for key in stale {
            offenders.push(key.0);
            self.requested_at_ms.pop(&key);
        }
        offenders
    }
}

impl Default for IWantRequests {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asked_counter_accumulates_within_a_window() {
        let mut c = AskedCounter::new();
        let peer = PeerId::random();
        c.add(peer, 2);
        c.add(peer, 3);
        assert_eq!(c.get(&peer), 5);
    }

    #[test]
    fn asked_counter_resets_to_zero() {
        let mut c = AskedCounter::new();
        let peer = PeerId::random();
        c.add(peer, 4);
        c.reset();
        assert_eq!(c.get(&peer), 0);
    }

    #[test]
    fn ihave_counter_increments_and_resets() {
        let mut c = IHaveCounter::new();
        let peer = PeerId::random();
        assert_eq!(c.increment(peer), 1);
        assert_eq!(c.increment(peer), 2);
        c.reset();
        assert_eq!(c.increment(peer), 1);
    }

    #[test]
    fn iwant_requests_clears_on_delivery() {
        let mut r = IWantRequests::new();
        let peer = PeerId::random();
        let id = MessageId(vec![1]);
        r.record(peer, id.clone(), 1_000);
        r.clear(&peer, &id);
        let offenders = r.sweep_stale(100_000, 3_000);
        assert!(offenders.is_empty());
    }

    #[test]
    fn iwant_requests_sweep_reports_stale_peer() {
        let mut r = IWantRequests::new();
        let peer = PeerId::random();
        let id = MessageId(vec![1]);
        r.record(peer, id, 0);
        let offenders = r.sweep_stale(5_000, 3_000);
        assert_eq!(offenders, vec![peer]);
        // Cleared once swept, so a second sweep finds nothing.
        assert!(r.sweep_stale(10_000, 3_000).is_empty());
    }
}

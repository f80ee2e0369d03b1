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

//! Bounded sliding-window store of recently seen messages (spec.md section 4.1).
//!
//! The cache is a ring of `gossip_history_length` slots; the newest slot
//! receives every `put`. Only the newest `gossip_size` slots feed IHAVE
//! announcements, but a message is retrievable by id for as long as it
//! remains in any retained slot. Per-peer retransmit counters bound how many
//! times a single message is re-sent to a single IWANT-asking peer.

use std::collections::{HashMap, VecDeque};

use fnv::FnvHashMap;

use crate::message::{Message, MessageId};
use crate::peer::PeerId;
use crate::topic::TopicHash;

struct CacheEntry {
    message: Message,
    /// Per-peer count of how many times this message has already been
    /// handed to `get_for_peer` for that peer.
    sent_to: FnvHashMap<PeerId, u32>,
}

/// Sliding-window message cache (spec.md section 3, "MessageCache").
pub struct MessageCache {
    gossip_size: usize,
    history_length: usize,
    /// Newest-first ring of slots; each slot holds ids inserted during that
    /// heartbeat window, in insertion order.
    slots: VecDeque<Vec<MessageId>>,
    by_id: HashMap<MessageId, CacheEntry>,
}

impl MessageCache {
    pub fn new(gossip_size: usize, history_length: usize) -> Self {
        assert!(gossip_size <= history_length, "gossip_size must not exceed history_length");
        let mut slots = VecDeque::with_capacity(history_length.max(1));
        slots.push_front(Vec::new());
        MessageCache {
            gossip_size,
            history_length: history_length.max(1),
            slots,
            by_id: HashMap::new(),
        }
    }

    /// Stores `message` under `id` in the newest slot. Idempotent if `id` is
    /// already retained (in any slot).
    pub fn put(&mut self, id: MessageId, message: Message) {
        if self.by_id.contains_key(&id) {
            return;
        }
        self.slots
            .front_mut()
            .expect("a MessageCache always has at least one slot")
            .push(id.clone());
        self.by_id.insert(
            id,
            CacheEntry {
                message,
                sent_to: FnvHashMap::default(),
            },
        );
    }

    /// Looks up `id` for retransmission to `peer_id`, returning the message
    /// plus how many times it was already sent to that peer *before* this
    /// call, then incrementing that counter. `None` if the id has aged out.
    pub fn get_for_peer(&mut self, peer_id: &PeerId, id: &MessageId) -> Option<(Message, u32)> {
        let entry = self.by_id.get_mut(id)?;
        let count = entry.sent_to.entry(*peer_id).or_insert(0);
        let prior = *count;
        *count += 1;
        Some((entry.message.clone(), prior))
    }

    /// Returns up to `gossip_size` windows' worth of ids published to
    /// `topic`, freshest slot first, in each slot's insertion order.
    pub fn ids_for_topic(&self, topic: &TopicHash) -> Vec<MessageId> {
        let mut out = Vec::new();
        for slot in self.slots.iter().take(self.gossip_size) {
            for id in slot {
                if let Some(entry) = self.by_id.get(id) {
                    if entry.message.in_topic(topic) {
                        out.push(id.clone());
                    }
                }
            }
        }
        out
    }

    /// Advances the ring: prepends an empty slot, and drops the oldest slot
    /// (and its messages) once the ring exceeds `gossip_history_length`.
    pub fn shift(&mut self) {
        self.slots.push_front(Vec::new());
        while self.slots.len() > self.history_length {
            if let Some(oldest) = self.slots.pop_back() {
                for id in oldest {
                    self.by_id.remove(&id);
                }
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(topic: &str, data: u8) -> Message {
        Message {
            from: PeerId::random(),
            seqno: vec![data],
            topics: vec![topic.into()],
            data: vec![data],
            signature: vec![],
        }
    }

    #[test]
    fn get_for_peer_counts_up_from_zero() {
        let mut cache = MessageCache::new(3, 5);
        let id = MessageId(vec![1]);
        cache.put(id.clone(), msg("t", 1));
        let peer = PeerId::random();

        let (_, c0) = cache.get_for_peer(&peer, &id).unwrap();
        let (_, c1) = cache.get_for_peer(&peer, &id).unwrap();
        let (_, c2) = cache.get_for_peer(&peer, &id).unwrap();
        assert_eq!((c0, c1, c2), (0, 1, 2));
    }

    #[test]
    fn put_is_idempotent_on_id_collision() {
        let mut cache = MessageCache::new(3, 5);
        let id = MessageId(vec![1]);
        cache.put(id.clone(), msg("t", 1));
        cache.put(id.clone(), msg("t", 99));
        let peer = PeerId::random();
        let (got, _) = cache.get_for_peer(&peer, &id).unwrap();
        assert_eq!(got.data, vec![1]);
    }

    #[test]
    fn shift_evicts_oldest_slot_past_history_length() {
        let mut cache = MessageCache::new(1, 2);
        let id = MessageId(vec![1]);
        cache.put(id.clone(), msg("t", 1));
        cache.shift();
        assert_eq!(cache.len(), 1);
        cache.shift();
        assert_eq!(cache.len(), 0, "message should have aged out of a 2-deep ring");
    }

    #[test]
    fn ids_for_topic_only_covers_gossip_size_windows() {
        let mut cache = MessageCache::new(1, 3);
        cache.put(MessageId(vec![1]), msg("t", 1));
        cache.shift();
        cache.put(MessageId(vec![2]), msg("t", 2));

        // gossip_size=1: only the newest window is advertised.
        let ids = cache.ids_for_topic(&"t".into());
        assert_eq!(ids, vec![MessageId(vec![2])]);
    }

    #[test]
    fn get_for_peer_returns_none_after_eviction() {
        let mut cache = MessageCache::new(1, 1);
        let id = MessageId(vec![1]);
        cache.put(id.clone(), msg("t", 1));
        cache.shift();
        assert!(cache.get_for_peer(&PeerId::random(), &id).is_none());
    }
}

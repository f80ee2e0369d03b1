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

//! Mesh/fanout state and the subscribe/unsubscribe and heartbeat
//! mesh-balancing logic (spec.md sections 3, 4.6, 4.7 steps 3-5).

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::behaviour::Gossipsub;
use crate::peer::PeerId;
use crate::rpc::RpcOut;
use crate::topic::TopicHash;

/// Insertion-ordered peer set: a `Vec` for stable iteration plus a `HashSet`
/// for O(1) membership tests (spec.md section 3, "MeshState... ordered set
/// of Peer").
#[derive(Debug, Default, Clone)]
pub struct PeerSet {
    order: Vec<PeerId>,
    members: HashSet<PeerId>,
}

impl PeerSet {
    pub fn new() -> Self {
        PeerSet::default()
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.members.contains(peer)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `true` if `peer` was newly inserted.
    pub fn insert(&mut self, peer: PeerId) -> bool {
        if self.members.insert(peer) {
            self.order.push(peer);
            true
        } else {
            false
        }
    }

    /// `true` if `peer` was present and removed.
    pub fn remove(&mut self, peer: &PeerId) -> bool {
        if self.members.remove(peer) {
            self.order.retain(|p| p != peer);
            true
        } else {
            false
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerId> {
        self.order.iter()
    }

    pub fn to_vec(&self) -> Vec<PeerId> {
        self.order.clone()
    }
}

impl Gossipsub {
    /// spec.md section 4.6, `subscribe(topic)`.
    pub fn subscribe(&mut self, topic: TopicHash) -> crate::error::Result<()> {
        if topic.as_str().is_empty() {
            return Err(crate::error::GossipsubError::EmptyTopic);
        }

        self.subscriptions.insert(topic.clone());

        let mesh_len = self.mesh.entry(topic.clone()).or_insert_with(PeerSet::new).len();
        let deficit = self.config.d.saturating_sub(mesh_len);

        if deficit > 0 {
            let fanout_candidates: Vec<PeerId> = self
                .fanout
                .get(&topic)
                .map(|set| self.filter_eligible(set.iter().copied(), &topic, false))
                .unwrap_or_default();
            let other_candidates: Vec<PeerId> = {
                let in_topic = self.topic_membership.peers_in_topic(&topic);
                let mesh = self.mesh.get(&topic);
                let fanout = self.fanout.get(&topic);
                self.filter_eligible(
                    in_topic.into_iter().filter(|p| {
                        mesh.map_or(true, |m| !m.contains(p)) && fanout.map_or(true, |f| !f.contains(p))
                    }),
                    &topic,
                    false,
                )
            };

            let mut from_fanout = fanout_candidates;
            from_fanout.shuffle(&mut thread_rng());
            from_fanout.truncate(deficit);
            let remaining = deficit - from_fanout.len();

            let mut from_others = other_candidates;
            from_others.shuffle(&mut thread_rng());
            from_others.truncate(remaining);

            for peer in from_fanout.into_iter().chain(from_others) {
                self.graft(&topic, peer);
            }
        }

        self.fanout.remove(&topic);
        self.last_published.remove(&topic);
        Ok(())
    }

    /// spec.md section 4.6, `unsubscribe(topic)`.
    pub fn unsubscribe(&mut self, topic: TopicHash) -> crate::error::Result<()> {
        if topic.as_str().is_empty() {
            return Err(crate::error::GossipsubError::EmptyTopic);
        }

        self.subscriptions.remove(&topic);
        if let Some(peers) = self.mesh.remove(&topic) {
            for peer in peers.iter() {
                self.prune(&topic, *peer);
            }
        }
        Ok(())
    }

    /// Candidates eligible for grafting: connected, non-negative score,
    /// not direct, and (unless `ignore_backoff`) not currently backed off.
    pub(crate) fn filter_eligible(
        &self,
        candidates: impl Iterator<Item = PeerId>,
        topic: &TopicHash,
        ignore_backoff: bool,
    ) -> Vec<PeerId> {
        candidates
            .filter(|p| self.connected.contains_key(p))
            .filter(|p| !self.peer_score.is_direct(p))
            .filter(|p| self.peer_score.score(p) >= 0.0)
            .filter(|p| ignore_backoff || !self.backoff_is_active(p, topic))
            .collect()
    }

    fn backoff_is_active(&self, peer: &PeerId, topic: &TopicHash) -> bool {
        let now = self.clock.now_ms();
        self.backoff.is_backoff(peer, topic, now)
    }

    /// Grafts `peer` into `mesh[topic]`: adds it, notifies the scorer, and
    /// enqueues an outbound GRAFT.
    pub(crate) fn graft(&mut self, topic: &TopicHash, peer: PeerId) {
        let inserted = self.mesh.entry(topic.clone()).or_insert_with(PeerSet::new).insert(peer);
        if inserted {
            self.peer_score.notify_meshed(&peer, topic.as_str());
            self.outbound.add_pending_rpc_part(&peer, RpcOut::Graft { topic: topic.clone() });
        }
    }

    /// Prunes `peer` from `mesh[topic]`: removes it, notifies the scorer,
    /// sets backoff, and enqueues an outbound PRUNE, with PX attached when
    /// the peer runs v1.1 (spec.md section 6, "Protocol negotiation").
    pub(crate) fn prune(&mut self, topic: &TopicHash, peer: PeerId) {
        if let Some(mesh) = self.mesh.get_mut(topic) {
            if mesh.remove(&peer) {
                self.peer_score.notify_pruned(&peer, topic.as_str());
            }
        }

        let now = self.clock.now_ms();
        let delay_ms = self.config.prune_backoff.as_millis() as u64;
        self.backoff.set(peer, topic.clone(), now, delay_ms);

        let (backoff, px_peers) = if self.peer_is_v1_1(&peer) {
            let px = self.select_px_peers(topic, &peer);
            (Some(self.config.prune_backoff.as_secs()), px)
        } else {
            (None, Vec::new())
        };

        self.outbound.add_pending_rpc_part(
            &peer,
            RpcOut::Prune { topic: topic.clone(), backoff, px_peers },
        );
    }

    fn peer_is_v1_1(&self, peer: &PeerId) -> bool {
        matches!(
            self.connected.get(peer).map(|c| c.protocol_version),
            Some(crate::peer::GossipVersion::V1_1)
        )
    }

    /// Up to `max_prune_peers` other topic peers with non-negative score,
    /// excluding `exclude` (spec.md section 6, "Protocol negotiation").
    fn select_px_peers(&self, topic: &TopicHash, exclude: &PeerId) -> Vec<crate::rpc::PeerInfo> {
        let mut candidates: Vec<PeerId> = self
            .topic_membership
            .peers_in_topic(topic)
            .into_iter()
            .filter(|p| p != exclude)
            .filter(|p| self.peer_score.score(p) >= 0.0)
            .collect();
        candidates.shuffle(&mut thread_rng());
        candidates.truncate(self.config.max_prune_peers);
        candidates
            .into_iter()
            .map(|peer_id| crate::rpc::PeerInfo { peer_id, signed_record: None })
            .collect()
    }

    /// spec.md section 4.7 steps 3a-3e: per-topic mesh balancing.
    pub(crate) fn heartbeat_balance_mesh(&mut self, topic: TopicHash) {
        // 3a: prune negative-score mesh peers.
        let negative: Vec<PeerId> = self
            .mesh
            .get(&topic)
            .map(|m| m.iter().filter(|p| self.peer_score.score(p) < 0.0).copied().collect())
            .unwrap_or_default();
        for peer in negative {
            self.prune(&topic, peer);
        }

        let mesh_len = self.mesh.get(&topic).map_or(0, |m| m.len());

        // 3b: graft towards D when below DLow.
        if mesh_len < self.config.d_low {
            let existing = self.mesh.get(&topic);
            let candidates = self.filter_eligible(
                self.topic_membership
                    .peers_in_topic(&topic)
                    .into_iter()
                    .filter(|p| existing.map_or(true, |m| !m.contains(p))),
                &topic,
                false,
            );
            let mut candidates = candidates;
            candidates.shuffle(&mut thread_rng());
            candidates.truncate(self.config.d.saturating_sub(mesh_len));
            for peer in candidates {
                self.graft(&topic, peer);
            }
        } else if mesh_len > self.config.d_high {
            self.heartbeat_prune_overfull(&topic);
        }

        // 3d: outbound top-up.
        self.heartbeat_outbound_topup(&topic);

        // 3e: opportunistic grafting.
        if self.heartbeats_count % self.config.opportunistic_graft_ticks == 0 {
            self.heartbeat_opportunistic_graft(&topic);
        }

        // 3f: emit gossip, excluding current mesh peers (they already got the
        // message via the mesh itself).
        let exclude: HashSet<PeerId> =
            self.mesh.get(&topic).map(|m| m.iter().copied().collect()).unwrap_or_default();
        self.emit_gossip(&topic, &exclude);
    }

    /// spec.md section 4.7 step 3c: the over-full prune.
    fn heartbeat_prune_overfull(&mut self, topic: &TopicHash) {
        let mut ranked: Vec<PeerId> = self.mesh.get(topic).map(|m| m.to_vec()).unwrap_or_default();
        ranked.sort_by(|a, b| {
            self.peer_score
                .score(b)
                .partial_cmp(&self.peer_score.score(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let keep_pool: Vec<PeerId> = ranked.iter().take(self.config.d_score).copied().collect();
        let mut rest: Vec<PeerId> = ranked.iter().skip(self.config.d_score).copied().collect();
        rest.shuffle(&mut thread_rng());

        let prospective: Vec<PeerId> =
            keep_pool.iter().chain(rest.iter()).take(self.config.d).copied().collect();
        let outbound_count = prospective.iter().filter(|p| self.is_outbound(p)).count();
        let deficit = self.config.d_out.saturating_sub(outbound_count);

        let mut out_picks = Vec::new();
        rest.retain(|p| {
            if out_picks.len() < deficit && self.is_outbound(p) {
                out_picks.push(*p);
                false
            } else {
                true
            }
        });

        let mut retained: Vec<PeerId> = out_picks;
        retained.extend(keep_pool);
        retained.extend(rest);
        retained.truncate(self.config.d);
        retained.dedup();

        let retained_set: HashSet<PeerId> = retained.into_iter().collect();
        let pruned: Vec<PeerId> = ranked.into_iter().filter(|p| !retained_set.contains(p)).collect();
        for peer in pruned {
            self.prune(topic, peer);
        }
    }

    fn is_outbound(&self, peer: &PeerId) -> bool {
        self.connected.get(peer).map_or(false, |c| c.is_outbound)
    }

    fn heartbeat_outbound_topup(&mut self, topic: &TopicHash) {
        let outbound_count = self
            .mesh
            .get(topic)
            .map(|m| m.iter().filter(|p| self.is_outbound(p)).count())
            .unwrap_or(0);
        let deficit = self.config.d_out.saturating_sub(outbound_count);
        if deficit == 0 {
            return;
        }

        let existing = self.mesh.get(topic);
        let mut candidates = self.filter_eligible(
            self.topic_membership
                .peers_in_topic(topic)
                .into_iter()
                .filter(|p| self.is_outbound(p))
                .filter(|p| existing.map_or(true, |m| !m.contains(p))),
            topic,
            false,
        );
        candidates.shuffle(&mut thread_rng());
        candidates.truncate(deficit);
        for peer in candidates {
            self.graft(topic, peer);
        }
    }

    fn heartbeat_opportunistic_graft(&mut self, topic: &TopicHash) {
        let mesh = match self.mesh.get(topic) {
            Some(m) if m.len() > 1 => m,
            _ => return,
        };

        let mut scores: Vec<f64> = mesh.iter().map(|p| self.peer_score.score(p)).collect();
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = scores[(scores.len() - 1) / 2];

        if median >= self.peer_score.thresholds().opportunistic_graft_threshold {
            return;
        }

        let existing = self.mesh.get(topic);
        let mut candidates = self.filter_eligible(
            self.topic_membership
                .peers_in_topic(topic)
                .into_iter()
                .filter(|p| self.peer_score.score(p) > median)
                .filter(|p| existing.map_or(true, |m| !m.contains(p))),
            topic,
            false,
        );
        candidates.shuffle(&mut thread_rng());
        candidates.truncate(self.config.opportunistic_graft_peers);
        for peer in candidates {
            self.graft(topic, peer);
        }
    }

    /// spec.md section 4.7 step 4: fanout maintenance for a single topic.
    pub(crate) fn heartbeat_balance_fanout(&mut self, topic: TopicHash) {
        let publish_threshold = self.peer_score.thresholds().publish_threshold;
        let in_topic: HashSet<PeerId> = self.topic_membership.peers_in_topic(&topic).into_iter().collect();

        let stale: Vec<PeerId> = self
            .fanout
            .get(&topic)
            .map(|fanout| {
                fanout
                    .iter()
                    .filter(|p| !in_topic.contains(p) || self.peer_score.score(p) < publish_threshold)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        if let Some(fanout) = self.fanout.get_mut(&topic) {
            for peer in &stale {
                fanout.remove(peer);
            }
        }

        let fanout_len = self.fanout.get(&topic).map_or(0, |f| f.len());
        let deficit = self.config.d.saturating_sub(fanout_len);
        if deficit > 0 {
            let existing = self.fanout.get(&topic);
            let mut candidates: Vec<PeerId> = in_topic
                .into_iter()
                .filter(|p| !self.peer_score.is_direct(p))
                .filter(|p| self.peer_score.score(p) >= publish_threshold)
                .filter(|p| existing.map_or(true, |f| !f.contains(p)))
                .collect();
            candidates.shuffle(&mut thread_rng());
            candidates.truncate(deficit);
            let entry = self.fanout.entry(topic.clone()).or_insert_with(PeerSet::new);
            for peer in candidates {
                entry.insert(peer);
            }
        }

        let exclude: HashSet<PeerId> =
            self.fanout.get(&topic).map(|f| f.iter().copied().collect()).unwrap_or_default();
        self.emit_gossip(&topic, &exclude);
    }

    /// spec.md section 4.7 step 5: fanout TTL eviction.
    pub(crate) fn heartbeat_expire_fanout(&mut self) {
        let ttl_ms = self.config.fanout_ttl.as_millis() as u64;
        let now = self.clock.now_ms();
        let expired: Vec<TopicHash> = self
            .last_published
            .iter()
            .filter(|(_, &last)| now.saturating_sub(last) > ttl_ms)
            .map(|(t, _)| t.clone())
            .collect();
        for topic in expired {
            self.fanout.remove(&topic);
            self.last_published.remove(&topic);
        }
    }
}

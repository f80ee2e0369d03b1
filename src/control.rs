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

//! Inbound control-message handling: GRAFT/PRUNE/IHAVE/IWANT dispatch and
//! peer exchange (spec.md sections 4.3, 4.4).

use std::collections::HashSet;

use log::debug;
use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::behaviour::Gossipsub;
use crate::message::MessageId;
use crate::peer::{GossipVersion, PeerId};
use crate::rpc::{ControlAction, PeerInfo, Rpc, RpcOut};
use crate::topic::TopicHash;

impl Gossipsub {
    /// spec.md section 6, `on_inbound_rpc`.
    pub fn on_inbound_rpc(&mut self, peer: PeerId, rpc: Rpc) {
        if !rpc.messages.is_empty() {
            self.broadcast_inbound(rpc.messages, &peer);
        }

        for action in rpc.control {
            match action {
                ControlAction::Graft { topic } => self.handle_graft(&peer, topic),
                ControlAction::Prune { topic, backoff, px_peers } => {
                    self.handle_prune(&peer, topic, backoff, px_peers)
                }
                ControlAction::IHave { topic, message_ids } => self.handle_ihave(&peer, topic, message_ids),
                ControlAction::IWant { message_ids } => self.handle_iwant(&peer, message_ids),
            }
        }
    }

    /// spec.md section 4.3, "GRAFT(topic) from peer".
    pub(crate) fn handle_graft(&mut self, peer: &PeerId, topic: TopicHash) {
        if !self.subscriptions.contains(&topic) {
            return;
        }

        if self.peer_score.is_direct(peer) {
            self.prune(&topic, *peer);
            return;
        }

        let now = self.clock.now_ms();
        if self.backoff.is_backoff(peer, &topic, now) {
            self.prune(&topic, *peer);
            self.peer_score.notify_router_misbehavior(peer, 1);
            let prune_backoff_ms = self.config.prune_backoff.as_millis() as u64;
            let flood_threshold_ms = self.config.graft_flood_threshold.as_millis() as u64;
            if self.backoff.is_flood(peer, &topic, now, prune_backoff_ms, flood_threshold_ms) {
                self.peer_score.notify_router_misbehavior(peer, 1);
            }
            return;
        }

        if self.peer_score.score(peer) < 0.0 {
            self.prune(&topic, *peer);
            return;
        }

        let mesh_len = self.mesh.get(&topic).map_or(0, |m| m.len());
        if mesh_len >= self.config.d_high && !self.is_outbound_peer(peer) {
            self.prune(&topic, *peer);
            return;
        }

        let already_meshed = self.mesh.get(&topic).map_or(false, |m| m.contains(peer));
        if !already_meshed {
            self.graft(&topic, *peer);
        }
    }

    fn is_outbound_peer(&self, peer: &PeerId) -> bool {
        self.connected.get(peer).map_or(false, |c| c.is_outbound)
    }

    /// spec.md section 4.3, "PRUNE(topic, [backoff?], [px_peers?]) from peer".
    pub(crate) fn handle_prune(
        &mut self,
        peer: &PeerId,
        topic: TopicHash,
        backoff: Option<u64>,
        px_peers: Vec<PeerInfo>,
    ) {
        if let Some(mesh) = self.mesh.get_mut(&topic) {
            if mesh.remove(peer) {
                self.peer_score.notify_pruned(peer, topic.as_str());
            }
        }

        let is_v1_1 = matches!(
            self.connected.get(peer).map(|c| c.protocol_version),
            Some(GossipVersion::V1_1)
        );

        if is_v1_1 {
            let now = self.clock.now_ms();
            let delay_ms = backoff
                .map(|secs| secs * 1_000)
                .unwrap_or_else(|| self.config.prune_backoff.as_millis() as u64);
            self.backoff.set(*peer, topic, now, delay_ms);

            if self.peer_score.score(peer) >= self.peer_score.thresholds().accept_px_threshold {
                self.apply_px(px_peers);
            }
        } else if backoff.is_some() || !px_peers.is_empty() {
            self.peer_score.notify_router_misbehavior(peer, 1);
        }
    }

    /// spec.md section 4.3, "IHAVE([ids]) from peer".
    pub(crate) fn handle_ihave(&mut self, peer: &PeerId, topic: TopicHash, message_ids: Vec<MessageId>) {
        if self.peer_score.score(peer) < self.peer_score.thresholds().gossip_threshold {
            return;
        }

        if self.ihave_counts.increment(*peer) > self.config.max_ihave_messages {
            debug!("dropping IHAVE from {:?}: exceeds max_ihave_messages", peer);
            return;
        }

        let already_asked = self.asked.get(peer);
        if already_asked >= self.config.max_ihave_length {
            return;
        }

        let wanted: Vec<MessageId> = message_ids
            .into_iter()
            .filter(|id| !self.seen_messages.contains(id))
            .collect();

        let budget = self.config.max_ihave_length - already_asked;
        let mut sample = wanted;
        sample.shuffle(&mut thread_rng());
        sample.truncate(budget);

        if sample.is_empty() {
            return;
        }

        self.asked.add(*peer, sample.len());

        let recorded = sample.choose(&mut thread_rng()).cloned();
        if let Some(id) = recorded {
            let now = self.clock.now_ms();
            self.iwant_requests.record(*peer, id, now);
        }

        self.outbound.add_pending_rpc_part(peer, RpcOut::IWant { message_ids: sample });
    }

    /// spec.md section 4.3, "IWANT([ids]) from peer".
    pub(crate) fn handle_iwant(&mut self, peer: &PeerId, message_ids: Vec<MessageId>) {
        if self.peer_score.score(peer) < self.peer_score.thresholds().gossip_threshold {
            return;
        }

        for id in message_ids {
            if let Some((message, sent_count)) = self.mcache.get_for_peer(peer, &id) {
                if sent_count < self.config.gossip_retransmission {
                    self.outbound.add_pending_rpc_part(peer, RpcOut::Publish(message));
                }
            }
        }
    }

    /// spec.md section 4.4, "Peer Exchange (PX) on PRUNE".
    pub(crate) fn apply_px(&mut self, px_peers: Vec<PeerInfo>) {
        let mut shuffled = px_peers;
        shuffled.shuffle(&mut thread_rng());
        shuffled.truncate(self.config.max_prune_peers);

        let already_connected: HashSet<PeerId> = self.connected.keys().copied().collect();
        for info in shuffled {
            if already_connected.contains(&info.peer_id) {
                continue;
            }
            self.peer_exchange.connect_callback(info.peer_id, info.signed_record);
        }
    }
}

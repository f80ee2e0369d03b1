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

//! The `Gossipsub` routing engine: public entry points, publish paths, and
//! heartbeat orchestration (spec.md sections 4.5, 4.7, 4.8, 4.9, 6).
//!
//! This struct is the single cohesive owner of all mesh-maintenance state;
//! its methods are split across this file, [`crate::mesh`] and
//! [`crate::control`] along the same component lines spec.md section 2 lays
//! out (MeshManager, ControlHandler, Publisher/Forwarder, Heartbeat), rather
//! than as separate stateful objects, so that they can share the collaborator
//! trait objects without fighting the borrow checker over who owns what.

use std::collections::{HashMap, HashSet};

use futures::future::{self, BoxFuture, FutureExt};
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::backoff::BackoffTable;
use crate::clock::Clock;
use crate::collaborators::{OutboundSink, PeerExchange, SeenMessages, TopicMembership};
use crate::config::GossipsubConfig;
use crate::mcache::MessageCache;
use crate::mesh::PeerSet;
use crate::message::{Message, MessageId, MessageIdFn};
use crate::peer::{ConnectedPeer, PeerId};
use crate::peer_score::PeerScore;
use crate::request_trackers::{AskedCounter, IHaveCounter, IWantRequests};
use crate::rpc::RpcOut;
use crate::topic::TopicHash;

/// The core gossip mesh-routing engine (spec.md section 2).
///
/// Holds every piece of state the spec assigns to the core (mesh, fanout,
/// message cache, backoff table, request trackers) plus the injected
/// collaborators it consults but does not own (topic membership, seen-set,
/// outbound sink, peer score, peer exchange, clock). Every public entry
/// point runs to completion with no suspension points (spec.md section 5);
/// the caller is responsible for invoking [`Gossipsub::heartbeat`] on its own
/// executor at `config.heartbeat_interval`.
pub struct Gossipsub {
    pub(crate) config: GossipsubConfig,

    pub(crate) connected: HashMap<PeerId, ConnectedPeer>,
    pub(crate) subscriptions: HashSet<TopicHash>,
    pub(crate) mesh: HashMap<TopicHash, PeerSet>,
    pub(crate) fanout: HashMap<TopicHash, PeerSet>,
    pub(crate) last_published: HashMap<TopicHash, u64>,

    pub(crate) mcache: MessageCache,
    pub(crate) backoff: BackoffTable,
    pub(crate) asked: AskedCounter,
    pub(crate) ihave_counts: IHaveCounter,
    pub(crate) iwant_requests: IWantRequests,

    pub(crate) heartbeats_count: u64,

    pub(crate) message_id_fn: MessageIdFn,
    pub(crate) topic_membership: Box<dyn TopicMembership>,
    pub(crate) seen_messages: Box<dyn SeenMessages>,
    pub(crate) outbound: Box<dyn OutboundSink>,
    pub(crate) peer_score: Box<dyn PeerScore>,
    pub(crate) peer_exchange: Box<dyn PeerExchange>,
    pub(crate) clock: Box<dyn Clock>,
}

/// Constructor arguments for [`Gossipsub::new`], grouping the injected
/// collaborators spec.md section 6 lists under "Outbound collaborators".
pub struct GossipsubCollaborators {
    pub message_id_fn: MessageIdFn,
    pub topic_membership: Box<dyn TopicMembership>,
    pub seen_messages: Box<dyn SeenMessages>,
    pub outbound: Box<dyn OutboundSink>,
    pub peer_score: Box<dyn PeerScore>,
    pub peer_exchange: Box<dyn PeerExchange>,
    pub clock: Box<dyn Clock>,
}

/// Combines per-recipient delivery futures with any-complete semantics
/// (spec.md section 7): resolves `Ok(())` as soon as any one completes
/// successfully, or the last error if every one fails. A publish with no
/// recipients trivially succeeds.
fn any_complete(deliveries: Vec<BoxFuture<'static, Result<(), ()>>>) -> BoxFuture<'static, Result<(), ()>> {
    if deliveries.is_empty() {
        return future::ready(Ok(())).boxed();
    }
    future::select_ok(deliveries).map(|result| result.map(|(ok, _remaining)| ok)).boxed()
}

impl Gossipsub {
    pub fn new(config: GossipsubConfig, collaborators: GossipsubCollaborators) -> Self {
        config.validate();
        let mcache = MessageCache::new(config.gossip_size, config.gossip_history_length);
        Gossipsub {
            config,
            connected: HashMap::new(),
            subscriptions: HashSet::new(),
            mesh: HashMap::new(),
            fanout: HashMap::new(),
            last_published: HashMap::new(),
            mcache,
            backoff: BackoffTable::new(),
            asked: AskedCounter::new(),
            ihave_counts: IHaveCounter::new(),
            iwant_requests: IWantRequests::new(),
            heartbeats_count: 0,
            message_id_fn: collaborators.message_id_fn,
            topic_membership: collaborators.topic_membership,
            seen_messages: collaborators.seen_messages,
            outbound: collaborators.outbound,
            peer_score: collaborators.peer_score,
            peer_exchange: collaborators.peer_exchange,
            clock: collaborators.clock,
        }
    }

    /// spec.md section 4.9, "On peer active".
    pub fn on_peer_active(&mut self, peer: PeerId, info: ConnectedPeer) {
        self.connected.insert(peer, info);
        self.peer_score.notify_connected(&peer);
    }

    /// spec.md section 4.9, "On peer disconnected".
    pub fn on_peer_disconnected(&mut self, peer: PeerId) {
        self.connected.remove(&peer);
        self.peer_score.notify_disconnected(&peer);
        for mesh in self.mesh.values_mut() {
            mesh.remove(&peer);
        }
        for fanout in self.fanout.values_mut() {
            fanout.remove(&peer);
        }
        // Queued outbound parts for this peer are dropped, not delivered
        // (spec.md section 5, "Cancellation"): the sink drops them itself
        // once it observes the peer gone, so there is nothing further to do
        // here beyond erasing the handle from every table.
    }

    /// spec.md section 4.9, `accept_requests_from`.
    pub fn accept_requests_from(&self, peer: &PeerId) -> bool {
        self.peer_score.is_direct(peer) || self.peer_score.score(peer) >= self.peer_score.thresholds().graylist_threshold
    }

    /// spec.md section 4.5, "Inbound relay" (`broadcast_inbound`).
    pub fn broadcast_inbound(&mut self, messages: Vec<Message>, from: &PeerId) {
        for message in messages {
            let id = (self.message_id_fn)(&message);

            let mut recipients: HashSet<PeerId> = HashSet::new();
            for topic in &message.topics {
                if let Some(mesh) = self.mesh.get(topic) {
                    recipients.extend(mesh.iter().copied());
                }
            }
            for (peer, _) in self.connected.iter() {
                if self.peer_score.is_direct(peer) {
                    recipients.insert(*peer);
                }
            }
            recipients.remove(from);

            for peer in recipients {
                self.outbound.add_pending_rpc_part(&peer, RpcOut::Publish(message.clone()));
            }

            self.iwant_requests.clear(from, &id);
            self.mcache.put(id, message);
        }
    }

    /// spec.md section 6, `publish(message)`: validates, then dispatches to
    /// [`Gossipsub::broadcast_outbound`]. The returned future resolves once
    /// any recipient's delivery future completes successfully (section 7,
    /// "broadcasts report success if any recipient future completes"); it
    /// does not block this call, which still runs to completion synchronously
    /// (section 5).
    pub fn publish(&mut self, message: Message) -> crate::error::Result<BoxFuture<'static, Result<(), ()>>> {
        if message.topics.is_empty() {
            return Err(crate::error::GossipsubError::NoTopics);
        }
        Ok(self.broadcast_outbound(message))
    }

    /// spec.md section 4.5, "Local publish" (`broadcast_outbound`). Delivery
    /// to each recipient goes through `submit_publish`, whose per-recipient
    /// futures are combined with any-complete semantics (section 7).
    pub fn broadcast_outbound(&mut self, message: Message) -> BoxFuture<'static, Result<(), ()>> {
        let now = self.clock.now_ms();
        for topic in &message.topics {
            self.last_published.insert(topic.clone(), now);
        }

        let mut recipients: HashSet<PeerId> = HashSet::new();

        if self.config.flood_publish {
            let publish_threshold = self.peer_score.thresholds().publish_threshold;
            for topic in &message.topics {
                for peer in self.topic_membership.peers_in_topic(topic) {
                    if self.peer_score.score(&peer) >= publish_threshold {
                        recipients.insert(peer);
                    }
                }
            }
            for (peer, _) in self.connected.iter() {
                if self.peer_score.is_direct(peer) {
                    recipients.insert(*peer);
                }
            }
        } else {
            for topic in message.topics.clone() {
                if let Some(mesh) = self.mesh.get(&topic) {
                    if !mesh.is_empty() {
                        recipients.extend(mesh.iter().copied());
                        continue;
                    }
                }
                if let Some(fanout) = self.fanout.get(&topic) {
                    if !fanout.is_empty() {
                        recipients.extend(fanout.iter().copied());
                        continue;
                    }
                }
                let mut candidates = self.topic_membership.peers_in_topic(&topic);
                candidates.shuffle(&mut thread_rng());
                candidates.truncate(self.config.d);
                let mut set = PeerSet::new();
                for peer in &candidates {
                    set.insert(*peer);
                }
                recipients.extend(candidates);
                self.fanout.insert(topic, set);
            }
        }

        let deliveries: Vec<BoxFuture<'static, Result<(), ()>>> = recipients
            .iter()
            .map(|peer| self.outbound.submit_publish(peer, message.clone()))
            .collect();

        let id = (self.message_id_fn)(&message);
        self.mcache.put(id, message);
        self.outbound.flush_all_pending();

        any_complete(deliveries)
    }

    /// spec.md section 4.8, "Gossip emission".
    pub(crate) fn emit_gossip(&mut self, topic: &TopicHash, exclude: &HashSet<PeerId>) {
        let mut ids = self.mcache.ids_for_topic(topic);
        if ids.is_empty() {
            return;
        }
        ids.shuffle(&mut thread_rng());
        ids.truncate(self.config.max_ihave_length);

        let gossip_threshold = self.peer_score.thresholds().gossip_threshold;
        let mut candidates: Vec<PeerId> = self
            .topic_membership
            .peers_in_topic(topic)
            .into_iter()
            .filter(|p| !exclude.contains(p))
            .filter(|p| !self.peer_score.is_direct(p))
            .filter(|p| self.peer_score.score(p) >= gossip_threshold)
            .collect();
        candidates.shuffle(&mut thread_rng());

        let take = ((self.config.gossip_factor * candidates.len() as f64) as usize).max(self.config.d_lazy);
        candidates.truncate(take);

        for peer in candidates {
            self.outbound.add_pending_rpc_part(
                &peer,
                RpcOut::IHave { topic: topic.clone(), message_ids: ids.clone() },
            );
        }
    }

    /// spec.md section 4.7: the full heartbeat sequence.
    pub fn heartbeat(&mut self) {
        self.heartbeats_count += 1;
        self.asked.reset();
        self.ihave_counts.reset();

        let now = self.clock.now_ms();
        let followup_ms = self.config.iwant_followup_time.as_millis() as u64;
        for peer in self.iwant_requests.sweep_stale(now, followup_ms) {
            warn!("peer {:?} missed an IWANT follow-up", peer);
            self.peer_score.notify_router_misbehavior(&peer, 1);
        }

        let topics: Vec<TopicHash> = self.mesh.keys().cloned().collect();
        for topic in topics {
            self.run_heartbeat_step(|this| this.heartbeat_balance_mesh(topic.clone()));
        }

        let fanout_topics: Vec<TopicHash> = self.fanout.keys().cloned().collect();
        for topic in fanout_topics {
            self.run_heartbeat_step(|this| this.heartbeat_balance_fanout(topic.clone()));
        }

        self.run_heartbeat_step(Gossipsub::heartbeat_expire_fanout);
        self.mcache.shift();
        self.outbound.flush_all_pending();
        debug!("heartbeat {} complete", self.heartbeats_count);
    }

    /// Runs one heartbeat step, catching and logging any panic rather than
    /// letting it tear down the scheduling loop (spec.md section 4.7, "Any
    /// exception in the loop is caught and logged").
    fn run_heartbeat_step(&mut self, step: impl FnOnce(&mut Self) + std::panic::UnwindSafe) {
        let this = std::panic::AssertUnwindSafe(self);
        if let Err(panic) = std::panic::catch_unwind(move || step(this.0)) {
            let message = panic
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("unknown panic");
            log::error!("heartbeat step failed, continuing: {}", message);
        }
    }
}

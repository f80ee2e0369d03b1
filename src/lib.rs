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

//! Core mesh-routing engine for the GossipSub v1.0/v1.1 pubsub protocol
//! family.
//!
//! This crate implements mesh/fanout maintenance, the GRAFT/PRUNE/IHAVE/IWANT
//! control-message lifecycle, peer exchange on PRUNE, and the periodic
//! heartbeat that drives all of the above. Wire framing, message validation,
//! application-level deduplication and the peer-scoring numeric model are
//! all owned by collaborators the caller injects through
//! [`behaviour::GossipsubCollaborators`]; this crate only consumes them.
//!
//! The entry point is [`behaviour::Gossipsub`].

mod backoff;
mod behaviour;
mod clock;
mod collaborators;
mod config;
mod control;
mod error;
mod mcache;
mod mesh;
mod message;
mod peer;
mod peer_score;
mod request_trackers;
mod rpc;
mod topic;

pub use behaviour::{Gossipsub, GossipsubCollaborators};
pub use clock::{Clock, SystemClock};
pub use collaborators::{OutboundSink, PeerExchange, SeenMessages, TopicMembership};
pub use config::{GossipsubConfig, GossipsubConfigBuilder};
pub use error::{GossipsubError, Result};
pub use message::{default_message_id, Message, MessageId, MessageIdFn};
pub use peer::{ConnectedPeer, GossipVersion, PeerId};
pub use peer_score::{NullPeerScore, PeerScore, ScoreThresholds};
pub use rpc::{ControlAction, PeerInfo, Rpc, RpcOut};
pub use topic::TopicHash;

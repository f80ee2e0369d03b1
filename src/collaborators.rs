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

//! External collaborators the engine is built against (spec.md section 6)
//! other than [`crate::peer_score::PeerScore`] and [`crate::clock::Clock`],
//! which get their own modules. All of these are owned by the outer router;
//! the engine never constructs a default implementation of any of them
//! outside of tests.

use futures::future::BoxFuture;

use crate::message::{Message, MessageId};
use crate::peer::PeerId;
use crate::rpc::RpcOut;
use crate::topic::TopicHash;

/// Subscription bookkeeping the core consults but does not own (spec.md
/// section 1, "Subscription bookkeeping... exposed as `peers_in_topic`").
pub trait TopicMembership: Send {
    fn peers_in_topic(&self, topic: &TopicHash) -> Vec<PeerId>;
}

/// The externally-owned deduplication set (spec.md section 1,
/// "The deduplication of seen application messages").
pub trait SeenMessages: Send {
    fn contains(&self, id: &MessageId) -> bool;
}

/// Outbound delivery: per-peer RPC batching and the publish future
/// (spec.md section 6, `submit_publish`/`add_pending_rpc_part`/`flush_all_pending`).
pub trait OutboundSink: Send {
    fn submit_publish(&mut self, peer: &PeerId, message: Message) -> BoxFuture<'static, Result<(), ()>>;
    fn add_pending_rpc_part(&mut self, peer: &PeerId, part: RpcOut);
    fn flush_all_pending(&mut self);
}

/// PX dial-out (spec.md section 4.4): the core hands over decoded,
/// unvalidated peer records; dialing and record validation are the outer
/// router's concern.
pub trait PeerExchange: Send {
    fn connect_callback(&mut self, peer_id: PeerId, signed_record: Option<Vec<u8>>);
}

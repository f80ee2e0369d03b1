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

//! Decoded RPC shapes the core reads and writes.
//!
//! Wire framing is out of scope (spec.md section 1): these types are the
//! already-decoded values an outer transport hands in, and the already-built
//! values the core hands back for that transport to encode and send.

use crate::message::{Message, MessageId};
use crate::peer::PeerId;
use crate::topic::TopicHash;

/// A single inbound or outbound PX record: an opaque peer id plus an opaque
/// signed record the core never validates (spec.md section 4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub peer_id: PeerId,
    pub signed_record: Option<Vec<u8>>,
}

/// One inbound control item, already demultiplexed by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    Graft {
        topic: TopicHash,
    },
    Prune {
        topic: TopicHash,
        /// Present only on a v1.1 PRUNE; seconds.
        backoff: Option<u64>,
        px_peers: Vec<PeerInfo>,
    },
    IHave {
        topic: TopicHash,
        message_ids: Vec<MessageId>,
    },
    IWant {
        message_ids: Vec<MessageId>,
    },
}

/// A fully decoded inbound RPC: zero or more application messages plus zero
/// or more control actions, as the wire protocol allows both in one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rpc {
    pub messages: Vec<Message>,
    pub control: Vec<ControlAction>,
}

/// One outbound unit enqueued for a specific peer (spec.md section 6,
/// `add_pending_rpc_part`). The core batches these per peer and hands the
/// batch to the transport on flush; how that batching is framed on the wire
/// is not this core's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcOut {
    Publish(Message),
    Graft { topic: TopicHash },
    Prune { topic: TopicHash, backoff: Option<u64>, px_peers: Vec<PeerInfo> },
    IHave { topic: TopicHash, message_ids: Vec<MessageId> },
    IWant { message_ids: Vec<MessageId> },
}

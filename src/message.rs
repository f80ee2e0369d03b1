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

use crate::topic::TopicHash;
use crate::peer::PeerId;
use std::fmt;

use hex_fmt::HexFmt;

/// Opaque message identifier, derived by the injected [`MessageIdFn`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub Vec<u8>);

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", HexFmt(&self.0))
    }
}

/// A pubsub message. Content (`data`) is opaque to the core; only `topics`
/// and the externally-derived id are consulted for routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub from: PeerId,
    pub seqno: Vec<u8>,
    pub topics: Vec<TopicHash>,
    pub data: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Message {
    pub fn in_topic(&self, topic: &TopicHash) -> bool {
        self.topics.iter().any(|t| t == topic)
    }
}

/// `get_message_id` (spec.md section 6): a pure function from message to id,
/// injected by the outer router rather than computed here.
pub type MessageIdFn = fn(&Message) -> MessageId;

/// A reference implementation of [`MessageIdFn`], not mandated by the spec:
/// `source peer id (base58) ++ sequence number`, the same scheme the
/// `default_message_id` closure in the peer-scoring fork of this project
/// uses.
pub fn default_message_id(message: &Message) -> MessageId {
    let mut buf = message.from.to_string().into_bytes();
    buf.extend_from_slice(&message.seqno);
    MessageId(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> PeerId {
        PeerId::random()
    }

    #[test]
    fn default_message_id_is_stable() {
        let msg = Message {
            from: peer(),
            seqno: vec![0, 0, 0, 1],
            topics: vec!["t".into()],
            data: vec![1, 2, 3],
            signature: vec![],
        };
        assert_eq!(default_message_id(&msg), default_message_id(&msg));
    }

    #[test]
    fn default_message_id_distinguishes_seqno() {
        let from = peer();
        let a = Message {
            from,
            seqno: vec![1],
            topics: vec!["t".into()],
            data: vec![],
            signature: vec![],
        };
        let b = Message {
            seqno: vec![2],
            ..a.clone()
        };
        assert_ne!(default_message_id(&a), default_message_id(&b));
    }
}

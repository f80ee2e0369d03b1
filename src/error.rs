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

//! Errors for the handful of locally-fatal operations.
//!
//! Everything reachable from an inbound peer (bad GRAFT, stale IWANT, a full
//! LRU) is *not* an error here: it is a misbehaviour penalty or a silent drop,
//! handled in [`crate::control`]. This type only covers misuse of the local
//! API (e.g. publishing a message with no topics).

use thiserror::Error;

/// Errors produced by the local-facing entry points of [`crate::Gossipsub`].
#[derive(Debug, Error)]
pub enum GossipsubError {
    /// [`crate::Gossipsub::publish`] was called with a message that names no topics.
    #[error("a published message must belong to at least one topic")]
    NoTopics,

    /// [`crate::Gossipsub::subscribe`] / `unsubscribe` was called with an empty topic string.
    #[error("topic identifiers must not be empty")]
    EmptyTopic,
}

pub type Result<T> = std::result::Result<T, GossipsubError>;

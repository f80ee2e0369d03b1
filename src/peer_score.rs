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

//! The `PeerScore` collaborator (spec.md section 6): the core only ever
//! queries a score and reports events, it never computes the numeric model
//! itself (spec.md section 1, Non-goals).

use crate::peer::PeerId;

/// Score-derived cutoffs the core compares against; owned by the scorer, not
/// computed here (spec.md section 6, `params.*Threshold`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreThresholds {
    pub gossip_threshold: f64,
    pub publish_threshold: f64,
    pub graylist_threshold: f64,
    pub accept_px_threshold: f64,
    pub opportunistic_graft_threshold: f64,
}

/// Query and event-notification surface for the external peer-scoring engine.
///
/// Every `notify_*` method is a one-way signal; the core never reads back a
/// result from them, matching the fire-and-forget shape of the scorer calls
/// in the peer-scoring fork this trait is grounded on.
pub trait PeerScore: Send {
    fn score(&self, peer: &PeerId) -> f64;

    fn thresholds(&self) -> ScoreThresholds;

    /// `true` for statically-configured direct peers, meshed by
    /// configuration rather than by the heartbeat (spec.md section 6).
    fn is_direct(&self, peer: &PeerId) -> bool;

    fn notify_connected(&mut self, peer: &PeerId);
    fn notify_disconnected(&mut self, peer: &PeerId);
    fn notify_meshed(&mut self, peer: &PeerId, topic: &str);
    fn notify_pruned(&mut self, peer: &PeerId, topic: &str);
    fn notify_seen(&mut self, peer: &PeerId);
    fn notify_unseen_valid(&mut self, peer: &PeerId);
    fn notify_unseen_invalid(&mut self, peer: &PeerId);
    fn notify_router_misbehavior(&mut self, peer: &PeerId, penalty: u32);
}

/// A trivial [`PeerScore`] that accepts every peer and never penalizes: no
/// direct peers, every threshold at zero. Useful for exercising the routing
/// engine in isolation from the scoring subsystem (tests, examples).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPeerScore;

impl PeerScore for NullPeerScore {
    fn score(&self, _peer: &PeerId) -> f64 {
        0.0
    }

    fn thresholds(&self) -> ScoreThresholds {
        ScoreThresholds {
            gossip_threshold: 0.0,
            publish_threshold: 0.0,
            graylist_threshold: 0.0,
            accept_px_threshold: 0.0,
            opportunistic_graft_threshold: 0.0,
        }
    }

    fn is_direct(&self, _peer: &PeerId) -> bool {
        false
    }

    fn notify_connected(&mut self, _peer: &PeerId) {}
    fn notify_disconnected(&mut self, _peer: &PeerId) {}
    fn notify_meshed(&mut self, _peer: &PeerId, _topic: &str) {}
    fn notify_pruned(&mut self, _peer: &PeerId, _topic: &str) {}
    fn notify_seen(&mut self, _peer: &PeerId) {}
    fn notify_unseen_valid(&mut self, _peer: &PeerId) {}
    fn notify_unseen_invalid(&mut self, _peer: &PeerId) {}
    fn notify_router_misbehavior(&mut self, _peer: &PeerId, _penalty: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_peer_score_accepts_everyone() {
        let scorer = NullPeerScore;
        let peer = PeerId::random();
        assert_eq!(scorer.score(&peer), 0.0);
        assert!(!scorer.is_direct(&peer));
        assert!(scorer.score(&peer) >= scorer.thresholds().gossip_threshold);
    }
}

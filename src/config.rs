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

//! Tuning parameters for the routing engine (spec.md section 6,
//! "Configuration").
//!
//! [`GossipsubConfig`] implements `Default` with the values the GossipSub
//! v1.0/v1.1 family conventionally ships, and [`GossipsubConfigBuilder`]
//! offers a fluent way to override a handful of them, the same shape as the
//! teacher's own `GossipsubConfig`/`GossipsubConfigBuilder` pair described in
//! the crate's top-level doc comment.

use std::time::Duration;

/// Mesh-maintenance and rate-limiting parameters for the gossip router.
#[derive(Debug, Clone)]
pub struct GossipsubConfig {
    /// Target mesh degree.
    pub d: usize,
    /// Graft towards `d` when a mesh drops below this.
    pub d_low: usize,
    /// Prune towards `d` when a mesh grows above this.
    pub d_high: usize,
    /// Size of the score-sorted "keep" pool during over-full pruning.
    pub d_score: usize,
    /// Minimum number of outbound connections to retain per mesh.
    pub d_out: usize,
    /// Number of non-mesh peers that receive IHAVE gossip per heartbeat.
    pub d_lazy: usize,

    /// Period between heartbeats.
    pub heartbeat_interval: Duration,
    /// How long an unused fanout entry is retained.
    pub fanout_ttl: Duration,

    /// Number of the newest message-cache windows advertised via IHAVE.
    pub gossip_size: usize,
    /// Total number of message-cache windows retained.
    pub gossip_history_length: usize,
    /// Fraction of eligible topic peers that receive gossip each heartbeat,
    /// in addition to the `d_lazy` floor.
    pub gossip_factor: f64,
    /// Maximum times a single message is retransmitted to a single peer.
    pub gossip_retransmission: u32,

    /// Cap on ids accepted/requested from one peer's IHAVE per heartbeat window.
    pub max_ihave_length: usize,
    /// Cap on IHAVE messages accepted from one peer per heartbeat window.
    pub max_ihave_messages: usize,

    /// Default PRUNE backoff duration.
    pub prune_backoff: Duration,
    /// How much earlier than backoff expiry a re-GRAFT counts as "flooding".
    pub graft_flood_threshold: Duration,

    /// Heartbeat cadence of opportunistic grafting.
    pub opportunistic_graft_ticks: u64,
    /// Peers opportunistically grafted per eligible heartbeat.
    pub opportunistic_graft_peers: usize,

    /// Time to wait for a message after asking for it via IWANT before
    /// penalizing the peer.
    pub iwant_followup_time: Duration,

    /// If set, locally published messages are flooded to every eligible
    /// topic peer rather than only mesh/fanout peers.
    pub flood_publish: bool,

    /// Maximum peer-exchange records accepted from a single PRUNE.
    pub max_prune_peers: usize,
}

impl Default for GossipsubConfig {
    fn default() -> Self {
        GossipsubConfig {
            d: 6,
            d_low: 4,
            d_high: 12,
            d_score: 4,
            d_out: 2,
            d_lazy: 6,
            heartbeat_interval: Duration::from_secs(1),
            fanout_ttl: Duration::from_secs(60),
            gossip_size: 3,
            gossip_history_length: 5,
            gossip_factor: 0.25,
            gossip_retransmission: 3,
            max_ihave_length: 5000,
            max_ihave_messages: 10,
            prune_backoff: Duration::from_secs(60),
            graft_flood_threshold: Duration::from_secs(10),
            opportunistic_graft_ticks: 60,
            opportunistic_graft_peers: 2,
            iwant_followup_time: Duration::from_secs(3),
            flood_publish: true,
            max_prune_peers: 16,
        }
    }
}

impl GossipsubConfig {
    /// Sanity-checks the relationships the heartbeat algorithm assumes.
    ///
    /// Per spec.md section 9's open question: if `d_score > d` the keep-pool
    /// computed in the over-full prune step can itself exceed `d`, which
    /// starves the outbound top-up. We only assert it in debug builds since
    /// spec.md leaves the choice to the implementer rather than mandating a
    /// hard error.
    pub fn validate(&self) {
        debug_assert!(self.d_low <= self.d, "d_low must not exceed d");
        debug_assert!(self.d <= self.d_high, "d must not exceed d_high");
        debug_assert!(self.d_score <= self.d, "d_score must not exceed d (spec.md section 9)");
        debug_assert!(self.d_out <= self.d_low, "d_out must not exceed d_low");
    }
}

/// Fluent builder for [`GossipsubConfig`], starting from [`GossipsubConfig::default`].
#[derive(Debug, Default, Clone)]
pub struct GossipsubConfigBuilder(GossipsubConfig);

impl GossipsubConfigBuilder {
    pub fn new() -> Self {
        GossipsubConfigBuilder(GossipsubConfig::default())
    }

    pub fn mesh_degree(mut self, d: usize, d_low: usize, d_high: usize) -> Self {
        self.0.d = d;
        self.0.d_low = d_low;
        self.0.d_high = d_high;
        self
    }

    pub fn d_score(mut self, d_score: usize) -> Self {
        self.0.d_score = d_score;
        self
    }

    pub fn d_out(mut self, d_out: usize) -> Self {
        self.0.d_out = d_out;
        self
    }

    pub fn d_lazy(mut self, d_lazy: usize) -> Self {
        self.0.d_lazy = d_lazy;
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.0.heartbeat_interval = interval;
        self
    }

    pub fn fanout_ttl(mut self, ttl: Duration) -> Self {
        self.0.fanout_ttl = ttl;
        self
    }

    pub fn flood_publish(mut self, enabled: bool) -> Self {
        self.0.flood_publish = enabled;
        self
    }

    pub fn prune_backoff(mut self, backoff: Duration) -> Self {
        self.0.prune_backoff = backoff;
        self
    }

    pub fn build(self) -> GossipsubConfig {
        self.0.validate();
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_satisfies_its_own_invariants() {
        GossipsubConfig::default().validate();
    }

    #[test]
    fn builder_overrides_take_effect() {
        let cfg = GossipsubConfigBuilder::new()
            .mesh_degree(6, 4, 12)
            .flood_publish(false)
            .build();
        assert_eq!(cfg.d, 6);
        assert!(!cfg.flood_publish);
    }
}

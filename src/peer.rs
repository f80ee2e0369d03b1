//! Peer identity and per-connection metadata (spec.md section 3, "Peer").

pub use libp2p_identity::PeerId;

/// Which revision of the gossip wire protocol a peer speaks.
///
/// v1.1 peers additionally understand PRUNE `backoff`/`peers` fields; see
/// spec.md section 6, "Protocol negotiation".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GossipVersion {
    V1_0,
    V1_1,
}

/// The two observable attributes of a connected peer the core relies on.
///
/// Everything else about the connection (multiplexing, the secure channel,
/// the actual substream) is owned by the transport layer and out of scope
/// here; this is the thin slice the routing engine needs.
#[derive(Debug, Clone, Copy)]
pub struct ConnectedPeer {
    /// `true` if this side dialed the connection.
    pub is_outbound: bool,
    pub protocol_version: GossipVersion,
}

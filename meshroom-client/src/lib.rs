//! Full-mesh room client.
//!
//! A [`RoomSession`] keeps one [`PeerLink`] per remote participant and drives
//! each link through offer/answer negotiation and trickled candidates, using
//! whatever [`SignalingOutput`] and [`TransportFactory`] it is given.

mod error;
mod link;
mod media;
mod session;
mod signaling;
mod transport;

pub use error::MeshError;
pub use link::*;
pub use media::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;

pub use meshroom_core::{IceCandidate, IceServerConfig, ParticipantId, RoomId, SdpType, SessionDescription};

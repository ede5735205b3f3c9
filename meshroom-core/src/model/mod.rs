mod description;
mod participant;
mod room;
mod signaling;

pub use description::{IceCandidate, SdpType, SessionDescription};
pub use participant::ParticipantId;
pub use room::RoomId;
pub use signaling::{IceServerConfig, SignalMessage};

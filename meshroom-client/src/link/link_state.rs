use crate::transport::ConnectionState;
use std::fmt;

/// Which side of the offer/answer exchange a link plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    /// Created on `negotiation-start`; sends the offer.
    Offerer,
    /// Created on `new-participant`; waits for the offer.
    Answerer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    HasLocalDescription,
    HasRemoteDescription,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Inputs that move a link between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkInput {
    LocalOffer,
    RemoteOffer,
    RemoteAnswer,
    TransportConnected,
    TransportDisconnected,
    TransportFailed,
    TransportClosed,
}

impl LinkInput {
    /// Input matching a transport state report, if it is one a link reacts to.
    pub fn from_connection(state: ConnectionState) -> Option<Self> {
        match state {
            ConnectionState::Connected => Some(LinkInput::TransportConnected),
            ConnectionState::Disconnected => Some(LinkInput::TransportDisconnected),
            ConnectionState::Failed => Some(LinkInput::TransportFailed),
            ConnectionState::Closed => Some(LinkInput::TransportClosed),
            ConnectionState::New | ConnectionState::Connecting => None,
        }
    }
}

impl LinkState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LinkState::Disconnected | LinkState::Failed | LinkState::Closed
        )
    }

    /// Transition table. `None` means the input is not accepted in this state.
    pub fn next(self, input: LinkInput) -> Option<LinkState> {
        use LinkInput::*;
        use LinkState::*;

        if self.is_terminal() {
            return None;
        }

        match (self, input) {
            (_, TransportDisconnected) => Some(Disconnected),
            (_, TransportFailed) => Some(Failed),
            (_, TransportClosed) => Some(Closed),
            (New, LocalOffer) => Some(HasLocalDescription),
            (New, RemoteOffer) => Some(HasRemoteDescription),
            (HasLocalDescription, RemoteAnswer) => Some(HasRemoteDescription),
            (HasRemoteDescription, TransportConnected) => Some(Connected),
            _ => None,
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::New => "new",
            LinkState::HasLocalDescription => "has-local-description",
            LinkState::HasRemoteDescription => "has-remote-description",
            LinkState::Connected => "connected",
            LinkState::Disconnected => "disconnected",
            LinkState::Failed => "failed",
            LinkState::Closed => "closed",
        };
        f.write_str(name)
    }
}

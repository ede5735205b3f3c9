use meshroom_core::ParticipantId;
use std::fmt;

/// Instance token of one peer link.
///
/// Unique within a session; a link replacing another one for the same
/// participant always gets a fresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkToken(u64);

impl LinkToken {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for LinkToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Names one link instance: who it talks to and which incarnation it is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkRef {
    pub remote_id: ParticipantId,
    pub token: LinkToken,
}

impl LinkRef {
    pub fn new(remote_id: ParticipantId, token: LinkToken) -> Self {
        Self { remote_id, token }
    }
}

impl fmt::Display for LinkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.remote_id, self.token)
    }
}

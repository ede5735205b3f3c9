mod candidate_queue;
mod link_ref;
mod link_state;
mod peer_link;

pub use candidate_queue::*;
pub use link_ref::*;
pub use link_state::*;
pub use peer_link::*;

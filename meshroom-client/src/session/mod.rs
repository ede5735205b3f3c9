mod room_session;
mod session_command;
mod session_config;
mod session_handle;
mod stream_registry;

pub use room_session::*;
pub use session_command::*;
pub use session_config::*;
pub use session_handle::*;
pub use stream_registry::*;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capacity of the channel transports report events on.
    pub transport_event_buffer: usize,
    /// Capacity of the command channel behind [`SessionHandle`](crate::SessionHandle).
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport_event_buffer: 256,
            command_buffer: 16,
        }
    }
}

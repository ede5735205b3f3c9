use tokio::sync::oneshot;

/// Commands a [`SessionHandle`](crate::SessionHandle) sends to a running session.
#[derive(Debug)]
pub enum SessionCommand {
    /// Leave the room; `done` fires once cleanup finished.
    Leave { done: oneshot::Sender<()> },
}

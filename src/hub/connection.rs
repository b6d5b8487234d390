use crate::protocol::Frame;
use crate::types::{ConnectionId, UserId};
use tokio::sync::mpsc;

pub use mpsc::error::TrySendError;

/// Receiving end of a connection's outbound queue, drained by the writer task
pub type FrameReceiver = mpsc::Receiver<Frame>;

/// One live socket session belonging to a single user.
///
/// Holds the only sender of the connection's bounded outbound queue, so dropping
/// the `Connection` closes the queue and stops its writer.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    user_id: UserId,
    sender: mpsc::Sender<Frame>,
}

impl Connection {
    /// Create a connection with an outbound queue of `capacity` frames
    pub fn new(user_id: UserId, capacity: usize) -> (Self, FrameReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let connection = Self {
            id: ulid::Ulid::new(),
            user_id,
            sender,
        };
        (connection, receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Queue a frame without waiting. Fails when the queue is full or the writer is gone.
    pub fn try_push(&self, frame: Frame) -> Result<(), TrySendError<Frame>> {
        self.sender.try_send(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_is_bounded() {
        let (conn, mut rx) = Connection::new(uuid::Uuid::new_v4(), 2);

        assert!(conn.try_push(Frame::from("a")).is_ok());
        assert!(conn.try_push(Frame::from("b")).is_ok());
        assert!(matches!(
            conn.try_push(Frame::from("c")),
            Err(TrySendError::Full(_))
        ));

        assert_eq!(rx.try_recv().unwrap().as_ref(), "a");
        assert!(conn.try_push(Frame::from("c")).is_ok());
    }

    #[test]
    fn test_dropping_connection_closes_queue() {
        let (conn, mut rx) = Connection::new(uuid::Uuid::new_v4(), 4);
        conn.try_push(Frame::from("last")).unwrap();
        drop(conn);

        assert_eq!(rx.try_recv().unwrap().as_ref(), "last");
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_push_after_writer_gone_fails() {
        let (conn, rx) = Connection::new(uuid::Uuid::new_v4(), 4);
        drop(rx);
        assert!(matches!(
            conn.try_push(Frame::from("x")),
            Err(TrySendError::Closed(_))
        ));
    }

    #[test]
    fn test_ids_are_unique() {
        let user = uuid::Uuid::new_v4();
        let (a, _rx_a) = Connection::new(user, 1);
        let (b, _rx_b) = Connection::new(user, 1);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.user_id(), b.user_id());
    }
}

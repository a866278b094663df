//! The queue between the receive loop and the game loop.

use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};

use blastlink_protocol::Envelope;

/// One received message, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub envelope: Envelope,
    pub from: Option<SocketAddr>,
}

/// FIFO of received messages.
///
/// The receive loop pushes, the game loop drains once per frame. A plain
/// mutex is enough: both sides hold it for a push or a swap, never across
/// an `.await`.
#[derive(Debug, Default)]
pub struct Inbox {
    queue: Mutex<Vec<Inbound>>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, inbound: Inbound) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(inbound);
    }

    /// Takes everything queued so far, in arrival order.
    pub fn drain(&self) -> Vec<Inbound> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blastlink_protocol::{Message, ObjectDestroyed};

    fn destroyed(x: i32) -> Inbound {
        Inbound {
            envelope: Envelope::new(Message::ObjectDestroyed(ObjectDestroyed { x, y: 0 })),
            from: None,
        }
    }

    #[test]
    fn test_drain_returns_in_arrival_order() {
        let inbox = Inbox::new();
        inbox.push(destroyed(1));
        inbox.push(destroyed(2));
        inbox.push(destroyed(3));

        let drained = inbox.drain();
        let xs: Vec<i32> = drained
            .iter()
            .map(|inbound| match &inbound.envelope.message {
                Message::ObjectDestroyed(d) => d.x,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(xs, vec![1, 2, 3]);
    }

    #[test]
    fn test_drain_delivers_exactly_once() {
        let inbox = Inbox::new();
        inbox.push(destroyed(1));

        assert_eq!(inbox.drain().len(), 1);
        assert!(inbox.drain().is_empty());
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_push_from_other_threads() {
        let inbox = std::sync::Arc::new(Inbox::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let inbox = inbox.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        inbox.push(destroyed(i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(inbox.len(), 100);
    }
}

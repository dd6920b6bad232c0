use chrono::NaiveDate;
use tokio::sync::broadcast;

use crate::catalog::Facility;
use crate::presenter::View;

const CHANNEL_CAPACITY: usize = 64;

/// Presenter state after a change, tagged with the cycle that produced the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Token of the committed cycle, 0 before the first commit.
    pub token: u64,
    /// Facility and day the shown grid belongs to.
    pub facility: Option<Facility>,
    pub date: Option<NaiveDate>,
    pub view: View,
}

/// Broadcast hub for presenter frames.
pub struct FrameHub {
    sender: broadcast::Sender<Frame>,
}

impl FrameHub {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.sender.subscribe()
    }

    /// Send a frame. No-op if nobody is listening.
    pub fn publish(&self, frame: Frame) {
        let _ = self.sender.send(frame);
    }
}

impl Default for FrameHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = FrameHub::new();
        let mut rx = hub.subscribe();

        let frame = Frame {
            token: 3,
            facility: Some(Facility::Ebib),
            date: NaiveDate::from_ymd_opt(2024, 5, 14),
            view: View::Loading { last_error: None },
        };
        hub.publish(frame.clone());

        assert_eq!(rx.recv().await.unwrap(), frame);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_noop() {
        let hub = FrameHub::new();
        hub.publish(Frame {
            token: 0,
            facility: None,
            date: None,
            view: View::Loading { last_error: None },
        });
    }
}

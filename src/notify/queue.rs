use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Time a dismissed notification stays in the queue before it is removed.
pub const DEFAULT_DISMISS_DELAY: Duration = Duration::from_millis(500);

/// Ordered queue of operator-facing error messages.
///
/// Exactly one message is shown at a time, in enqueue order. Dismissing hides
/// the shown message and removes it only after `dismiss_delay`; further
/// dismissals during that window are ignored, so no message is ever skipped.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    messages: VecDeque<String>,
    removal_due: Option<Instant>,
    dismiss_delay: Duration,
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new(DEFAULT_DISMISS_DELAY)
    }
}

impl NotificationQueue {
    pub fn new(dismiss_delay: Duration) -> Self {
        Self {
            messages: VecDeque::new(),
            removal_due: None,
            dismiss_delay,
        }
    }

    /// Append a message; blank messages are ignored.
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        if message.trim().is_empty() {
            return;
        }
        self.messages.push_back(message);
    }

    /// Remove the dismissed message once its delay has elapsed.
    fn settle(&mut self, now: Instant) {
        if let Some(due) = self.removal_due {
            if now >= due {
                self.messages.pop_front();
                self.removal_due = None;
            }
        }
    }

    /// The message shown at `now`, if any.
    pub fn current(&mut self, now: Instant) -> Option<&str> {
        self.settle(now);
        if self.removal_due.is_some() {
            return None;
        }
        self.messages.front().map(String::as_str)
    }

    /// Dismiss the shown message. Returns `false` when nothing is shown.
    pub fn dismiss(&mut self, now: Instant) -> bool {
        self.settle(now);
        if self.removal_due.is_some() || self.messages.is_empty() {
            return false;
        }
        self.removal_due = Some(now + self.dismiss_delay);
        true
    }

    /// Take every queued message, in order, including one mid-dismissal.
    pub fn drain(&mut self) -> Vec<String> {
        self.removal_due = None;
        self.messages.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(500);

    #[test]
    fn shows_messages_in_enqueue_order() {
        let mut queue = NotificationQueue::new(DELAY);
        let now = Instant::now();
        queue.push("first");
        queue.push("second");

        assert_eq!(queue.current(now), Some("first"));
    }

    #[test]
    fn blank_messages_are_ignored() {
        let mut queue = NotificationQueue::new(DELAY);
        queue.push("");
        queue.push("  ");
        assert!(queue.is_empty());
    }

    #[test]
    fn dismissed_message_leaves_after_the_delay() {
        let mut queue = NotificationQueue::new(DELAY);
        let start = Instant::now();
        queue.push("first");
        queue.push("second");

        assert!(queue.dismiss(start));
        assert_eq!(queue.current(start), None);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.current(start + Duration::from_millis(499)), None);
        assert_eq!(queue.current(start + DELAY), Some("second"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn rapid_double_dismiss_cannot_skip_a_message() {
        let mut queue = NotificationQueue::new(DELAY);
        let start = Instant::now();
        queue.push("first");
        queue.push("second");

        assert!(queue.dismiss(start));
        assert!(!queue.dismiss(start + Duration::from_millis(10)));

        assert_eq!(queue.current(start + DELAY), Some("second"));
    }

    #[test]
    fn dismiss_on_empty_queue_is_a_noop() {
        let mut queue = NotificationQueue::new(DELAY);
        assert!(!queue.dismiss(Instant::now()));
    }

    #[test]
    fn drain_returns_everything_in_order() {
        let mut queue = NotificationQueue::new(DELAY);
        let now = Instant::now();
        queue.push("a");
        queue.push("b");
        queue.dismiss(now);

        assert_eq!(queue.drain(), vec!["a".to_string(), "b".to_string()]);
        assert!(queue.is_empty());
    }
}

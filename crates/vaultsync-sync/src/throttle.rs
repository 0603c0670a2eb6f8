//! Trailing-edge throttle
//!
//! At most one delivery per window, with a guaranteed trailing delivery of
//! the latest value when intermediate publishes were suppressed. This gives
//! eventual delivery of the final state rather than at-most-once-per-event.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

type Deliver<T> = Arc<dyn Fn(T) + Send + Sync>;

struct ThrottleState<T> {
    deliver: Deliver<T>,
    /// When the last delivery happened, if any
    last_emit: Option<Instant>,
    /// The suppressed value awaiting the trailing delivery
    pending: Option<T>,
    /// Bumped by `cancel()` to invalidate in-flight trailing timers
    generation: u64,
}

/// Throttles a stream of values to one delivery per window
///
/// The first publish in a quiet period is delivered immediately. Publishes
/// arriving inside the window replace each other; when the window elapses,
/// the latest suppressed value is delivered by a timer task. Must be used
/// inside a tokio runtime.
pub struct TrailingThrottle<T> {
    window: Duration,
    state: Arc<Mutex<ThrottleState<T>>>,
}

impl<T: Clone + Send + 'static> TrailingThrottle<T> {
    /// Creates a throttle delivering through the given callback
    pub fn new(window: Duration, deliver: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            window,
            state: Arc::new(Mutex::new(ThrottleState {
                deliver: Arc::new(deliver),
                last_emit: None,
                pending: None,
                generation: 0,
            })),
        }
    }

    /// Publishes a value, delivering now or at the end of the window
    pub fn publish(&self, value: T) {
        let now = Instant::now();
        let deliver;
        {
            let mut state = self.state.lock().expect("throttle lock poisoned");
            let in_window = state
                .last_emit
                .is_some_and(|prev| now.duration_since(prev) < self.window);

            if in_window {
                let first_suppressed = state.pending.is_none();
                state.pending = Some(value);
                if first_suppressed {
                    // Only one timer per window; later publishes just
                    // replace the value it will deliver.
                    let due = state.last_emit.expect("in_window implies last_emit") + self.window;
                    self.spawn_trailing(due, state.generation);
                }
                return;
            }

            state.last_emit = Some(now);
            state.pending = None;
            deliver = state.deliver.clone();
        }
        deliver(value);
    }

    /// Drops any pending delivery and forgets the window position
    ///
    /// The next publish after a cancel delivers immediately.
    pub fn cancel(&self) {
        let mut state = self.state.lock().expect("throttle lock poisoned");
        state.generation += 1;
        state.pending = None;
        state.last_emit = None;
        debug!("Throttle cancelled");
    }

    fn spawn_trailing(&self, due: Instant, generation: u64) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep_until(due).await;
            let (deliver, value) = {
                let mut state = state.lock().expect("throttle lock poisoned");
                if state.generation != generation {
                    return;
                }
                let Some(value) = state.pending.take() else {
                    return;
                };
                state.last_emit = Some(Instant::now());
                (state.deliver.clone(), value)
            };
            deliver(value);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (TrailingThrottle<u32>, Arc<Mutex<Vec<u32>>>) {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = delivered.clone();
        let throttle = TrailingThrottle::new(Duration::from_millis(100), move |v| {
            sink.lock().unwrap().push(v);
        });
        (throttle, delivered)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_publish_delivers_immediately() {
        let (throttle, delivered) = counting();
        throttle.publish(1);
        tokio::task::yield_now().await;
        assert_eq!(*delivered.lock().unwrap(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_leading_and_trailing() {
        let (throttle, delivered) = counting();

        // 10 publishes inside 50 ms: one leading delivery, one trailing
        // delivery carrying the final value.
        for i in 0..10 {
            throttle.publish(i);
            tokio::time::advance(Duration::from_millis(5)).await;
        }
        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;

        let seen = delivered.lock().unwrap().clone();
        assert!(seen.len() <= 2, "got {seen:?}");
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_in_separate_windows_all_deliver() {
        let (throttle, delivered) = counting();
        throttle.publish(1);
        tokio::time::advance(Duration::from_millis(150)).await;
        throttle.publish(2);
        tokio::task::yield_now().await;
        assert_eq!(*delivered.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_delivery() {
        let (throttle, delivered) = counting();
        throttle.publish(1);
        throttle.publish(2);
        throttle.cancel();
        tokio::time::advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert_eq!(*delivered.lock().unwrap(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_after_cancel_is_immediate() {
        let (throttle, delivered) = counting();
        throttle.publish(1);
        throttle.publish(2);
        throttle.cancel();
        throttle.publish(3);
        tokio::task::yield_now().await;
        assert_eq!(*delivered.lock().unwrap(), vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_delivers_latest_value_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let throttle = TrailingThrottle::new(Duration::from_millis(100), move |_: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        throttle.publish(1);
        throttle.publish(2);
        throttle.publish(3);
        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

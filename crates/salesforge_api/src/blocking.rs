//! Blocking store calls tied to a cancellation guard.
//!
//! # Invariants
//! - If the waiting future is dropped, the guard fires before the task output
//!   (and the pooled connection inside it) is released.
//! - Once the output has been handed back, the guard is disarmed.

use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use salesforge_core::CancelGuard;
use tokio::task::{JoinError, JoinHandle};

/// Guard that can be released without firing.
pub(crate) trait Disarm {
    fn disarm(self);
}

impl Disarm for CancelGuard {
    fn disarm(self) {
        CancelGuard::disarm(self);
    }
}

/// Awaits a `spawn_blocking` task while holding its cancellation guard.
pub(crate) struct GuardedTask<T, G: Disarm> {
    // Fields drop in declaration order: the guard must go before the task.
    guard: Option<G>,
    task: JoinHandle<T>,
}

impl<T, G: Disarm> GuardedTask<T, G> {
    pub(crate) fn new(guard: G, task: JoinHandle<T>) -> Self {
        Self {
            guard: Some(guard),
            task,
        }
    }
}

impl<T, G: Disarm + Unpin> Future for GuardedTask<T, G> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let output = ready!(Pin::new(&mut self.task).poll(cx));
        if let Some(guard) = self.guard.take() {
            guard.disarm();
        }
        Poll::Ready(output)
    }
}

#[cfg(test)]
mod tests {
    use super::{Disarm, GuardedTask};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Events = Arc<Mutex<Vec<&'static str>>>;

    struct RecordingGuard {
        events: Events,
        armed: bool,
    }

    impl Disarm for RecordingGuard {
        fn disarm(mut self) {
            self.armed = false;
        }
    }

    impl Drop for RecordingGuard {
        fn drop(&mut self) {
            if self.armed {
                self.events.lock().unwrap().push("interrupt");
            }
        }
    }

    struct Released(Events);

    impl Drop for Released {
        fn drop(&mut self) {
            self.0.lock().unwrap().push("release");
        }
    }

    fn guard(events: &Events) -> RecordingGuard {
        RecordingGuard {
            events: Arc::clone(events),
            armed: true,
        }
    }

    #[tokio::test]
    async fn abandoned_finished_task_interrupts_before_releasing_output() {
        let events: Events = Arc::default();
        let output_events = Arc::clone(&events);
        let task = tokio::task::spawn_blocking(move || Released(output_events));
        while !task.is_finished() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        drop(GuardedTask::new(guard(&events), task));

        assert_eq!(*events.lock().unwrap(), vec!["interrupt", "release"]);
    }

    #[tokio::test]
    async fn completed_task_disarms_the_guard() {
        let events: Events = Arc::default();
        let output_events = Arc::clone(&events);
        let task = tokio::task::spawn_blocking(move || Released(output_events));

        let output = GuardedTask::new(guard(&events), task).await.unwrap();
        assert!(events.lock().unwrap().is_empty());

        drop(output);
        assert_eq!(*events.lock().unwrap(), vec!["release"]);
    }
}

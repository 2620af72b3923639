use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::commands::AppEvent;

/// How many toolkit output lines may wait for the GTK thread.
pub(crate) const DEFAULT_EVENT_QUEUE_SIZE: usize = 512;

/// Events waiting for the GTK thread. Only log lines count against the
/// limit: past it the oldest line goes. Task and project events always stay.
pub(crate) struct UiEventQueue {
    pending: Mutex<Pending>,
    wake: mpsc::Sender<()>,
    log_limit: usize,
}

#[derive(Default)]
struct Pending {
    events: VecDeque<AppEvent>,
    logs: usize,
    dropped_logs: u64,
}

#[derive(Clone)]
pub(crate) struct UiEventSender {
    queue: Arc<UiEventQueue>,
}

impl UiEventQueue {
    pub(crate) fn new(log_limit: usize) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (wake, wake_rx) = mpsc::channel(1);
        let queue = Self {
            pending: Mutex::new(Pending::default()),
            wake,
            log_limit: log_limit.max(1),
        };
        (Arc::new(queue), wake_rx)
    }

    pub(crate) fn sender(self: &Arc<Self>) -> UiEventSender {
        UiEventSender {
            queue: Arc::clone(self),
        }
    }

    pub(crate) fn drain(&self) -> Vec<AppEvent> {
        let mut pending = self.pending.lock().unwrap();
        if pending.dropped_logs > 0 {
            tracing::debug!(dropped = pending.dropped_logs, "log lines dropped before display");
            pending.dropped_logs = 0;
        }
        pending.logs = 0;
        pending.events.drain(..).collect()
    }

    fn push(&self, event: AppEvent) {
        let mut pending = self.pending.lock().unwrap();
        let wake = pending.events.is_empty();

        if is_log(&event) {
            let oldest = if pending.logs >= self.log_limit {
                pending.events.iter().position(is_log)
            } else {
                None
            };
            if let Some(oldest) = oldest {
                pending.events.remove(oldest);
                pending.logs -= 1;
                pending.dropped_logs += 1;
            }
            pending.logs += 1;
        }
        pending.events.push_back(event);

        if wake {
            let _ = self.wake.try_send(());
        }
    }
}

impl UiEventSender {
    pub(crate) fn send(&self, event: AppEvent) {
        self.queue.push(event);
    }
}

fn is_log(event: &AppEvent) -> bool {
    matches!(event, AppEvent::Log { .. })
}

#[cfg(test)]
mod tests {
    use dlcgui_core::{PageId, TaskKind, TaskResult};

    use super::*;

    fn log(line: &str) -> AppEvent {
        AppEvent::Log {
            page: PageId::TrainNetwork,
            line: line.to_string(),
        }
    }

    fn finished() -> AppEvent {
        AppEvent::TaskFinished {
            page: PageId::TrainNetwork,
            result: TaskResult::succeeded(TaskKind::TrainNetwork, None, vec![TaskKind::TrainNetwork]),
        }
    }

    fn log_lines(events: &[AppEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|ev| match ev {
                AppEvent::Log { line, .. } => Some(line.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn logs_past_the_limit_drop_the_oldest() {
        let (queue, _rx) = UiEventQueue::new(2);
        let tx = queue.sender();
        for line in ["a", "b", "c"] {
            tx.send(log(line));
        }
        assert_eq!(log_lines(&queue.drain()), vec!["b", "c"]);
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn outcomes_are_kept_past_the_limit() {
        let (queue, _rx) = UiEventQueue::new(1);
        let tx = queue.sender();
        tx.send(AppEvent::TaskStarted {
            page: PageId::TrainNetwork,
        });
        tx.send(log("a"));
        tx.send(log("b"));
        tx.send(finished());
        tx.send(finished());

        let events = queue.drain();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], AppEvent::TaskStarted { .. }));
        assert_eq!(log_lines(&events), vec!["b"]);
        assert!(matches!(events[2], AppEvent::TaskFinished { .. }));
        assert!(matches!(events[3], AppEvent::TaskFinished { .. }));
    }

    #[test]
    fn drained_queue_accepts_a_full_batch_again() {
        let (queue, _rx) = UiEventQueue::new(2);
        let tx = queue.sender();
        tx.send(log("a"));
        tx.send(log("b"));
        queue.drain();
        tx.send(log("c"));
        tx.send(log("d"));
        assert_eq!(log_lines(&queue.drain()), vec!["c", "d"]);
    }

    #[test]
    fn first_event_wakes_receiver() {
        let (queue, mut rx) = UiEventQueue::new(4);
        let tx = queue.sender();
        tx.send(log("a"));
        tx.send(log("b"));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}

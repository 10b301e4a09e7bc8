//! Serial playback for fire-and-forget utterances.
//!
//! Each backend owns one queue. The first utterance spawns a worker task on
//! the current runtime; the worker plays utterances strictly in arrival order,
//! starting the next only after the previous one has finished.

use futures::future::BoxFuture;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tracing::debug;

/// Plays one utterance to completion.
pub type SayFn = Box<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Default)]
pub struct UtteranceQueue {
    sender: OnceLock<mpsc::UnboundedSender<String>>,
}

impl UtteranceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `text` without waiting. `worker` builds the playback function
    /// and is only called when the worker task is first started.
    pub fn push(&self, text: &str, worker: impl FnOnce() -> SayFn) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No async runtime; utterance dropped");
            return;
        };
        let sender = self.sender.get_or_init(|| {
            let (tx, mut rx) = mpsc::unbounded_channel::<String>();
            let say = worker();
            handle.spawn(async move {
                while let Some(text) = rx.recv().await {
                    say(text).await;
                }
            });
            tx
        });
        if sender.send(text.to_string()).is_err() {
            debug!("Speech worker has stopped; utterance dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn recording_worker(log: Arc<Mutex<Vec<String>>>) -> SayFn {
        Box::new(move |text: String| -> BoxFuture<'static, ()> {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push(format!("start {text}"));
                tokio::time::sleep(Duration::from_millis(40)).await;
                log.lock().unwrap().push(format!("end {text}"));
            })
        })
    }

    async fn wait_for(log: &Arc<Mutex<Vec<String>>>, len: usize) {
        for _ in 0..100 {
            if log.lock().unwrap().len() >= len {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_next_utterance_waits_for_previous() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let queue = UtteranceQueue::new();

        for text in ["A", "B", "C"] {
            queue.push(text, || recording_worker(Arc::clone(&log)));
        }
        wait_for(&log, 6).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["start A", "end A", "start B", "end B", "start C", "end C"]
        );
    }

    #[tokio::test]
    async fn test_worker_is_built_once() {
        let built = Arc::new(Mutex::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        let queue = UtteranceQueue::new();

        for text in ["A", "B"] {
            queue.push(text, || {
                *built.lock().unwrap() += 1;
                recording_worker(Arc::clone(&log))
            });
        }
        wait_for(&log, 4).await;

        assert_eq!(*built.lock().unwrap(), 1);
    }

    #[test]
    fn test_push_without_runtime_is_dropped() {
        let queue = UtteranceQueue::new();
        queue.push("A", || panic!("worker must not start without a runtime"));
        assert!(queue.sender.get().is_none());
    }
}

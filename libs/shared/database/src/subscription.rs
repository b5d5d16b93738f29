use futures::stream::{self, Stream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Cancellable live view over a single value.
///
/// The current value is yielded first, then every subsequent change. After
/// `cancel()` (or drop) the stream ends and any background poller is stopped.
pub struct Subscription<T> {
    receiver: watch::Receiver<T>,
    task: Option<JoinHandle<()>>,
    delivered_initial: bool,
    cancelled: bool,
}

impl<T: Clone + Send + Sync + 'static> Subscription<T> {
    pub fn new(receiver: watch::Receiver<T>) -> Self {
        Self {
            receiver,
            task: None,
            delivered_initial: false,
            cancelled: false,
        }
    }

    /// Tie a background task (e.g. a poller feeding the channel) to this subscription.
    pub fn with_task(receiver: watch::Receiver<T>, task: JoinHandle<()>) -> Self {
        let mut subscription = Self::new(receiver);
        subscription.task = Some(task);
        subscription
    }

    pub async fn next(&mut self) -> Option<T> {
        if self.cancelled {
            return None;
        }

        if !self.delivered_initial {
            self.delivered_initial = true;
            return Some(self.receiver.borrow_and_update().clone());
        }

        match self.receiver.changed().await {
            Ok(()) if !self.cancelled => Some(self.receiver.borrow_and_update().clone()),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn into_stream(self) -> impl Stream<Item = T> + Send {
        stream::unfold(self, |mut subscription| async move {
            let value = subscription.next().await?;
            Some((value, subscription))
        })
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

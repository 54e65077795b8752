use std::fmt::Debug;
use tokio::sync::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};

// Notifier lets the connection tasks know that we're shutting down.
#[derive(Debug)]
pub struct Notifier {
    shutdown_tx: RwLock<Option<broadcast::Sender<()>>>,
    shutdown_complete_tx: RwLock<Option<mpsc::Sender<()>>>,
    shutdown_complete_rx: Mutex<mpsc::Receiver<()>>,
}

impl Notifier {
    pub fn new() -> Notifier {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (shutdown_complete_tx, shutdown_complete_rx) = mpsc::channel(1);
        Notifier {
            shutdown_tx: RwLock::new(Some(shutdown_tx)),
            shutdown_complete_tx: RwLock::new(Some(shutdown_complete_tx)),
            shutdown_complete_rx: Mutex::new(shutdown_complete_rx),
        }
    }

    // Tells every subscribed connection to finish its current request and close. Connections
    // signal that they are done by dropping their Listener.
    pub async fn notify(&self) {
        drop(self.shutdown_tx.write().await.take());
        // Drop our own completion sender so that linger() only waits for the connections.
        drop(self.shutdown_complete_tx.write().await.take())
    }

    // Waits until every Listener handed out by subscribe() is gone.
    pub async fn linger(&self) {
        let _ = self.shutdown_complete_rx.lock().await.recv().await;
    }

    pub async fn subscribe(&self) -> Listener {
        let sender_opt = self.shutdown_tx.read().await;
        let complete_sender_opt = self.shutdown_complete_tx.read().await;
        Listener {
            shutdown: sender_opt.is_none(),
            shutdown_rx: sender_opt.as_ref().map(|tx| tx.subscribe()),
            _shutdown_complete_tx: complete_sender_opt.clone(),
        }
    }
}

// Listener is held by a connection task for as long as it runs.
#[derive(Debug)]
pub struct Listener {
    shutdown: bool,
    shutdown_rx: Option<broadcast::Receiver<()>>,
    _shutdown_complete_tx: Option<mpsc::Sender<()>>,
}

impl Listener {
    // Resolves once shutdown was announced.
    pub async fn listen(&mut self) {
        if self.shutdown {
            return;
        }
        if let Some(rx) = self.shutdown_rx.as_mut() {
            // Only ever closed, never sent to, so there is no lag to handle.
            let _ = rx.recv().await;
        }
        self.shutdown = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn linger_waits_for_listeners() {
        let notifier = Notifier::new();
        let mut listener = notifier.subscribe().await;

        let task = tokio::spawn(async move {
            listener.listen().await;
        });
        notifier.notify().await;
        tokio::time::timeout(Duration::from_secs(5), notifier.linger()).await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn late_subscribers_are_shut_down_right_away() {
        let notifier = Notifier::new();
        notifier.notify().await;

        let mut listener = notifier.subscribe().await;
        tokio::time::timeout(Duration::from_secs(1), listener.listen()).await.unwrap();
    }
}

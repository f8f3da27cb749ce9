//! Event loop between the transport and the dispatcher.

use std::sync::Arc;

use anyhow::anyhow;
use log::{error, info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{commands::Dispatcher, matrix::Transport};

/// Number of events buffered between the transport and the dispatcher.
const EVENT_BUFFER: usize = 64;

/// Drives the transport sync and hands events to the [`Dispatcher`] one at a time.
///
/// The loop stops when the shutdown token is cancelled, or when the transport
/// sync returns. The latter is fatal: there is no reconnection, the token is
/// cancelled so the whole daemon stops, and the error is returned.
pub struct SyncLoop {
    transport: Arc<dyn Transport>,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
}

impl SyncLoop {
    pub fn new(
        transport: Arc<dyn Transport>,
        dispatcher: Arc<Dispatcher>,
        shutdown: CancellationToken,
    ) -> Self {
        SyncLoop {
            transport,
            dispatcher,
            shutdown,
        }
    }

    /// Runs until shutdown (`Ok`) or until the transport gives up (`Err`).
    pub async fn run(&self) -> anyhow::Result<()> {
        let (sender, mut receiver) = mpsc::channel(EVENT_BUFFER);
        let sync = self.transport.sync(sender);
        tokio::pin!(sync);

        info!("sync loop started");
        let sync_result = loop {
            tokio::select! {
                // queued events are dispatched before a sync failure is acted on
                biased;
                _ = self.shutdown.cancelled() => break None,
                Some(event) = receiver.recv() => {
                    self.dispatcher.handle(&event).await;
                }
                result = &mut sync => break Some(result),
            }
        };

        let Some(result) = sync_result else {
            info!("sync loop stopped");
            return Ok(());
        };

        while let Ok(event) = receiver.try_recv() {
            self.dispatcher.handle(&event).await;
        }

        self.shutdown.cancel();
        let error = match result {
            Ok(()) => anyhow!("sync ended unexpectedly"),
            Err(e) => e,
        };
        error!("matrix sync failed, stopping daemon: {:?}", error);
        Err(error)
    }
}

// src/watch/mux.rs

//! Fan-in of per-directory change pulses.
//!
//! Every watched directory feeds pulses into its own bounded channel. The
//! [`ChangeMultiplexer`] merges those channels into a single stream the
//! embedding runner can await, and new directories may join the merge at any
//! time, including while a receive on the merged stream is outstanding.

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Queue size of the merged pulse stream. Pulses carry no payload, so one
/// pending pulse is enough to wake the consumer; further pulses apply
/// backpressure to the per-directory forwarders instead of piling up.
const MERGED_PULSE_CAPACITY: usize = 1;

/// Registration endpoint for the merge task.
///
/// Cloning hands out another registration handle for the same merged
/// stream. The merge shuts down when every handle is dropped and all
/// registered sources have closed.
#[derive(Clone, Debug)]
pub struct ChangeMultiplexer {
    control_tx: mpsc::UnboundedSender<mpsc::Receiver<()>>,
}

impl ChangeMultiplexer {
    /// Start the merge task on `runtime` and return the merged pulse stream.
    pub fn start(runtime: &Handle) -> (Self, mpsc::Receiver<()>) {
        let (control_tx, mut control_rx) = mpsc::unbounded_channel::<mpsc::Receiver<()>>();
        let (merged_tx, merged_rx) = mpsc::channel(MERGED_PULSE_CAPACITY);

        runtime.spawn(async move {
            while let Some(mut source) = control_rx.recv().await {
                debug!("pulse source joined the multiplexer");
                let merged_tx = merged_tx.clone();
                tokio::spawn(async move {
                    while source.recv().await.is_some() {
                        if merged_tx.send(()).await.is_err() {
                            // Merged stream dropped; nothing left to forward to.
                            return;
                        }
                    }
                });
            }
            debug!("change multiplexer control channel closed");
        });

        (Self { control_tx }, merged_rx)
    }

    /// Add another pulse source to the merge.
    ///
    /// Never blocks. Pulses sent on `source` before this call are buffered
    /// in the channel, not lost.
    pub fn register(&self, source: mpsc::Receiver<()>) {
        if self.control_tx.send(source).is_err() {
            warn!("change multiplexer is gone; pulse source dropped");
        }
    }
}

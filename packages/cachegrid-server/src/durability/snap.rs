//! The point-in-time snapshot writer.
//!
//! Consumes full-map snapshots on a channel; for each one, writes every
//! live entry as a `Set` line to a scratch file, then atomically swaps it
//! over the main snapshot file. Replies on a done channel so the
//! durability coordinator's pause/snap/resume protocol can wait for the
//! write to actually land before resuming the AOF.

use std::collections::HashMap;

use cachegrid_core::{CacheItem, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::error;

use super::file_log::FileLog;

/// One snapshot request: the data to persist, plus a channel to
/// acknowledge completion on.
pub struct SnapRequest {
    pub data: HashMap<String, CacheItem>,
    pub ack: oneshot::Sender<bool>,
}

/// A handle for submitting snapshot requests to a running SNAP writer task.
#[derive(Clone)]
pub struct SnapHandle {
    tx: mpsc::Sender<SnapRequest>,
}

impl SnapHandle {
    /// Submits a snapshot and waits for it to be durably written (or to
    /// fail). Returns `false` if the writer task is gone.
    pub async fn write_snapshot(&self, data: HashMap<String, CacheItem>) -> bool {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .tx
            .send(SnapRequest { data, ack: ack_tx })
            .await
            .is_err()
        {
            return false;
        }
        ack_rx.await.unwrap_or(false)
    }
}

/// Spawns the SNAP writer task.
pub fn spawn(
    main_path: impl Into<std::path::PathBuf>,
    temp_path: impl Into<std::path::PathBuf>,
) -> (SnapHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(4);
    let main = FileLog::new(main_path);
    let temp = FileLog::new(temp_path);
    let join = tokio::spawn(run(main, temp, rx));
    (SnapHandle { tx }, join)
}

async fn run(mut main: FileLog, mut temp: FileLog, mut rx: mpsc::Receiver<SnapRequest>) {
    while let Some(request) = rx.recv().await {
        let ok = write_one(&mut main, &mut temp, &request.data);
        let _ = request.ack.send(ok);
    }
    main.close();
    temp.close();
}

fn write_one(main: &mut FileLog, temp: &mut FileLog, data: &HashMap<String, CacheItem>) -> bool {
    if data.is_empty() {
        return main.truncate().is_ok();
    }

    if let Err(e) = temp.truncate() {
        error!(error = %e, "failed to truncate snapshot scratch file");
        return false;
    }
    for (key, item) in data {
        let cmd = Command::Set {
            key: key.clone(),
            item: item.clone(),
        };
        let line = match cmd.encode() {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "failed to encode snapshot entry");
                return false;
            }
        };
        if let Err(e) = temp.append(&line) {
            error!(error = %e, "failed to write snapshot entry");
            return false;
        }
    }
    if let Err(e) = temp.swap_into(main) {
        error!(error = %e, "failed to swap snapshot scratch file into place");
        return false;
    }
    true
}

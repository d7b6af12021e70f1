//! Connectivity gate — forwards the external "should keep the connection"
//! signal to the session driver.
//!
//! Transitions are deduplicated here and applied on the driver's execution
//! context, so pause/resume is serialized against request submission and
//! teardown. The gate holds only a command sender — it never owns the
//! transport, so session teardown is never blocked by a pending
//! notification; once the driver is gone the first failed send ends the
//! gate task.

use tokio::sync::{mpsc, watch};

use crate::driver::Command;

pub(crate) async fn gate(
    mut signal: watch::Receiver<bool>,
    cmd_tx: mpsc::UnboundedSender<Command>,
) {
    let mut last: Option<bool> = None;
    loop {
        let keep_alive = *signal.borrow_and_update();
        if last != Some(keep_alive) {
            last = Some(keep_alive);
            if cmd_tx.send(Command::Connectivity { keep_alive }).is_err() {
                return;
            }
        }
        if signal.changed().await.is_err() {
            return;
        }
    }
}

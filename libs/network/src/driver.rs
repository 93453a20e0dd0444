//! Per-endpoint I/O thread
//!
//! Every endpoint owns one current-thread tokio runtime driven by one
//! dedicated OS thread, so every completion for every connection that
//! endpoint owns runs serially on that thread. Shutdown fires a oneshot,
//! joins the thread and drops the runtime, which aborts any task still in
//! flight - the only cancellation mechanism there is.

use std::io;
use std::thread;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tracing::debug;

pub(crate) struct IoDriver {
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl IoDriver {
    /// Hand the runtime to a named thread and keep it parked on the shutdown
    /// signal; spawned tasks make progress while it waits
    pub(crate) fn start(runtime: Runtime, name: &str) -> io::Result<Self> {
        let (shutdown, rx) = oneshot::channel::<()>();
        let thread = thread::Builder::new().name(name.to_string()).spawn(move || {
            runtime.block_on(async {
                let _ = rx.await;
            });
            debug!("i/o driver stopped");
            // Runtime drops here, aborting remaining tasks and their sockets
        })?;
        Ok(Self {
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }

    /// Signal the thread and join it; idempotent
    pub(crate) fn shutdown(mut self) {
        self.signal_and_join();
    }

    fn signal_and_join(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for IoDriver {
    fn drop(&mut self) {
        self.signal_and_join();
    }
}

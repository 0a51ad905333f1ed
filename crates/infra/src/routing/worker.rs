//! The routing worker thread
//!
//! All reconsideration cycles execute on this single thread; every other
//! thread only enqueues requests. A synchronous caller passes a completion
//! channel the worker signals once the cycle finished.

use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::{debug, warn};

use super::manager::ManagerShared;

/// A request enqueued to the routing worker
pub(crate) enum Request {
    Reconsider {
        force_resync: bool,
        /// Signalled after the cycle completes, for synchronous callers
        done: Option<Sender<()>>,
    },
    Stop,
}

pub(crate) struct RoutingWorker {
    sender: Sender<Request>,
    handle: JoinHandle<()>,
}

impl RoutingWorker {
    pub(crate) fn spawn(shared: Arc<ManagerShared>) -> std::io::Result<Self> {
        let (sender, receiver) = unbounded();
        let handle = thread::Builder::new()
            .name("signalpath-routing".to_string())
            .spawn(move || run(shared, receiver))?;
        Ok(Self { sender, handle })
    }

    pub(crate) fn sender(&self) -> Sender<Request> {
        self.sender.clone()
    }

    pub(crate) fn thread_id(&self) -> ThreadId {
        self.handle.thread().id()
    }

    /// Ask the worker to finish its queue and join it
    pub(crate) fn stop(self) {
        if self.sender.send(Request::Stop).is_err() {
            warn!("routing worker already gone");
        }
        if self.handle.join().is_err() {
            warn!("routing worker panicked");
        }
    }
}

fn run(shared: Arc<ManagerShared>, receiver: Receiver<Request>) {
    debug!("routing worker started");
    while let Ok(request) = receiver.recv() {
        match request {
            Request::Stop => break,
            Request::Reconsider { force_resync, done } => {
                {
                    let mut state = shared.graph.write().unwrap();
                    super::manager::do_reconsider_routing(
                        &mut state,
                        shared.sink.as_ref(),
                        force_resync,
                    );
                }
                // lock released before notifying the waiter
                if let Some(done) = done {
                    let _ = done.send(());
                }
            }
        }
    }
    debug!("routing worker stopped");
}

//! Background fetching.
//!
//! The [`FetchWorker`] owns the [`TrendSource`] on a dedicated thread.  The
//! UI thread hands it fetch requests over an [`mpsc`] channel and drains
//! results from a second channel on every frame.
//!
//! ## For contributors
//!
//! The worker never decides *when* to fetch; that is the scheduler's job.
//! It runs whatever it is asked to, one request at a time.  Since the
//! scheduler only hands out one ticket at a time, the request queue never
//! holds more than one entry.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::scheduler::FetchTicket;
use crate::source::{FetchError, FetchResult, TrendSource};

/// Messages sent from the worker thread to the UI thread.
#[derive(Debug)]
pub struct PollMsg {
    /// Sequence number of the ticket this answers.
    pub seq: u64,
    pub outcome: Result<FetchResult, FetchError>,
}

pub struct FetchWorker {
    requests: mpsc::Sender<u64>,
    results: mpsc::Receiver<PollMsg>,
    source_name: String,
}

impl FetchWorker {
    /// Spawn the worker thread.
    ///
    /// The thread exits when the `FetchWorker` is dropped (its request
    /// channel closes) or when nobody is left to receive results.
    pub fn spawn<S>(source: S) -> Self
    where
        S: TrendSource + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<u64>();
        let (res_tx, res_rx) = mpsc::channel();
        let source_name = source.name().to_string();

        thread::spawn(move || {
            for seq in req_rx {
                tracing::debug!(seq, source = source.name(), "fetching");
                let outcome = source.fetch();
                if let Err(err) = &outcome {
                    tracing::debug!(seq, error = %err, "fetch returned error");
                }
                // If the receiver is gone the UI has exited; stop quietly.
                if res_tx.send(PollMsg { seq, outcome }).is_err() {
                    return;
                }
            }
        });

        Self {
            requests: req_tx,
            results: res_rx,
            source_name,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Queue the fetch a ticket authorises.
    ///
    /// Fails only if the worker thread has died, in which case the caller
    /// should settle the ticket itself.
    pub fn dispatch(&self, ticket: FetchTicket) -> Result<(), FetchError> {
        tracing::debug!(seq = ticket.seq, reason = ?ticket.reason, "dispatching fetch");
        self.requests
            .send(ticket.seq)
            .map_err(|_| FetchError::transient("fetch worker has stopped"))
    }

    /// Non-blocking poll for a finished fetch.
    pub fn try_recv(&self) -> Option<PollMsg> {
        self.results.try_recv().ok()
    }

    /// Blocking poll with an upper bound.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<PollMsg> {
        self.results.recv_timeout(timeout).ok()
    }
}

//! Stand-in for the process-group messaging substrate.
//!
//! The real system runs client, coordinator, and worker as separate OS
//! processes exchanging messages over a reliable, FIFO-ordered point-to-point
//! channel per pair of ranks (an MPI-style process group). That substrate is
//! an external collaborator, not part of this crate's scope; what the
//! coordinator and worker logic actually depend on is just two properties of
//! it: messages sent from rank A to rank B arrive in send order, and a
//! receive blocks (here: `.await`s) until a message is available.
//!
//! This module provides exactly that over `tokio::sync::mpsc`, with one
//! bounded channel per directed rank pair, so the rest of the workspace can
//! be built and tested in a single OS process. `core-transport` specifies
//! only the `RankSender`/`RankReceiver` interface the rest of the workspace
//! is written against, plus `InProcessGroup` as the one concrete
//! implementation of it; a real inter-process substrate would be a second
//! implementation slotted in without touching the coordinator, worker, or
//! client.

use std::error::Error;
use std::fmt;

use core_protocol::{ClientRequest, ClientResponse, CoordinatorMessage, WorkerReadResult};
use tokio::sync::mpsc;

/// Channel depth for every rank-to-rank link. Generous enough that the
/// coordinator's fan-out sends during a read or write never need to wait on
/// a worker before issuing the next one.
pub const CHANNEL_CAPACITY: usize = 256;

/// Ordered point-to-point send into one rank's inbox.
pub trait RankSender<T> {
    async fn send_msg(&self, msg: T) -> Result<(), LinkClosed>;
}

/// Ordered point-to-point receive from one rank. Waits (here: `.await`s)
/// until a message is available, or `None` once the sending side has gone
/// away.
pub trait RankReceiver<T> {
    async fn recv_msg(&mut self) -> Option<T>;
}

/// The peer side of a link is gone. The only failure mode this transport
/// has: a bounded in-process channel never reorders or drops a message it
/// accepted.
#[derive(Debug)]
pub struct LinkClosed;

impl fmt::Display for LinkClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rank link closed")
    }
}

impl Error for LinkClosed {}

impl<T: Send> RankSender<T> for mpsc::Sender<T> {
    async fn send_msg(&self, msg: T) -> Result<(), LinkClosed> {
        self.send(msg).await.map_err(|_| LinkClosed)
    }
}

impl<T: Send> RankReceiver<T> for mpsc::Receiver<T> {
    async fn recv_msg(&mut self) -> Option<T> {
        self.recv().await
    }
}

/// The client's view of its link to the coordinator: send requests, receive
/// responses.
pub struct ClientLink {
    pub requests_tx: mpsc::Sender<ClientRequest>,
    pub responses_rx: mpsc::Receiver<ClientResponse>,
}

/// The coordinator's view of its link to one worker: send directives,
/// receive read replies.
pub struct WorkerLink {
    pub rank: usize,
    pub directives_tx: mpsc::Sender<CoordinatorMessage>,
    pub replies_rx: mpsc::Receiver<WorkerReadResult>,
}

/// The coordinator's view of the whole group: its client-facing endpoint
/// plus one link per worker, ordered by ascending rank.
pub struct CoordinatorLinks {
    pub requests_rx: mpsc::Receiver<ClientRequest>,
    pub responses_tx: mpsc::Sender<ClientResponse>,
    pub workers: Vec<WorkerLink>,
}

/// A worker's view of its link to the coordinator: receive directives, send
/// read replies.
pub struct WorkerEndpoint {
    pub rank: usize,
    pub directives_rx: mpsc::Receiver<CoordinatorMessage>,
    pub replies_tx: mpsc::Sender<WorkerReadResult>,
}

/// Build the full set of in-process links for a cluster of `worker_count`
/// workers (ranks `2..2+worker_count`), returning the client's link, the
/// coordinator's links, and each worker's endpoint in ascending rank order.
pub fn build_cluster(worker_count: usize) -> (ClientLink, CoordinatorLinks, Vec<WorkerEndpoint>) {
    let (requests_tx, requests_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (responses_tx, responses_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let mut coordinator_workers = Vec::with_capacity(worker_count);
    let mut worker_endpoints = Vec::with_capacity(worker_count);
    for ordinal in 0..worker_count {
        let rank = ordinal + 2;
        let (directives_tx, directives_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (replies_tx, replies_rx) = mpsc::channel(CHANNEL_CAPACITY);
        coordinator_workers.push(WorkerLink {
            rank,
            directives_tx,
            replies_rx,
        });
        worker_endpoints.push(WorkerEndpoint {
            rank,
            directives_rx,
            replies_tx,
        });
    }

    let client_link = ClientLink {
        requests_tx,
        responses_rx,
    };
    let coordinator_links = CoordinatorLinks {
        requests_rx,
        responses_tx,
        workers: coordinator_workers,
    };
    (client_link, coordinator_links, worker_endpoints)
}

/// A concrete wiring of a process group: builds the full set of
/// rank-to-rank links for a cluster of a given size. The external
/// messaging substrate this stands in for would implement this trait once
/// over real sockets or an MPI binding; nothing above this crate depends on
/// which implementation is in use.
pub trait ProcessGroup {
    fn build(worker_count: usize) -> (ClientLink, CoordinatorLinks, Vec<WorkerEndpoint>);
}

/// The in-process stand-in: ranks are `tokio` tasks, links are bounded
/// `mpsc` channels.
pub struct InProcessGroup;

impl ProcessGroup for InProcessGroup {
    fn build(worker_count: usize) -> (ClientLink, CoordinatorLinks, Vec<WorkerEndpoint>) {
        build_cluster(worker_count)
    }
}

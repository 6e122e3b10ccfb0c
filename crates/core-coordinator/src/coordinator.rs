//! The coordinator: owns the placement table and capacity vector, plans
//! worker subrequests, and drives the single request/response main loop.

use std::collections::BTreeMap;

use core_protocol::{
    BlockId, ClientRequest, ClientResponse, CoordinatorMessage, ErrorCode, SliceDescriptor,
    WorkerReadResult, WriteValue,
};
use core_transport::{CoordinatorLinks, RankReceiver, RankSender};
use tracing::{debug, error, info, warn};

use crate::error::CoordinatorError;
use crate::placement::{CapacityVector, PlacementTable};
use crate::split::{conformance_check, ranks_for, split_all};

/// Whether `delete` returns freed space to the capacity vector.
///
/// The reference implementation this system is modeled on does not restore
/// capacity on delete; kept here as an explicit, named choice rather than a
/// bare `false` scattered through `delete`. See DESIGN.md.
const RESTORE_CAPACITY_ON_DELETE: bool = false;

pub struct Coordinator {
    placement: PlacementTable,
    capacity: CapacityVector,
    links: CoordinatorLinks,
}

impl Coordinator {
    pub fn new(max_size: u64, links: CoordinatorLinks) -> Self {
        let worker_count = links.workers.len();
        Self {
            placement: PlacementTable::new(),
            capacity: CapacityVector::new(worker_count, max_size),
            links,
        }
    }

    /// Runs the coordinator's main loop: a single state ("awaiting client
    /// request") that receives one request, handles it to completion, replies,
    /// and loops. Returns once the client sends `Close` (after forwarding
    /// `Close` to every worker) or its link to the client closes.
    pub async fn run(mut self) {
        loop {
            let request = match self.links.requests_rx.recv_msg().await {
                Some(request) => request,
                None => {
                    warn!(target: "coordinator.loop", "client link closed; shutting down");
                    break;
                }
            };

            let response = match request {
                ClientRequest::Close => {
                    info!(target: "coordinator.loop", "close requested");
                    self.close_all().await;
                    break;
                }
                ClientRequest::Allocate { size } => match self.allocate(size).await {
                    Ok(response) => response,
                    Err(err) => {
                        error!(target: "coordinator.loop", %err, "fatal transport error");
                        break;
                    }
                },
                ClientRequest::Read { descriptors } => match self.read(descriptors).await {
                    Ok(response) => response,
                    Err(err) => {
                        error!(target: "coordinator.loop", %err, "fatal transport error");
                        break;
                    }
                },
                ClientRequest::Write { descriptors, value } => {
                    match self.write(descriptors, value).await {
                        Ok(response) => response,
                        Err(err) => {
                            error!(target: "coordinator.loop", %err, "fatal transport error");
                            break;
                        }
                    }
                }
                ClientRequest::Delete { descriptors } => match self.delete(descriptors).await {
                    Ok(response) => response,
                    Err(err) => {
                        error!(target: "coordinator.loop", %err, "fatal transport error");
                        break;
                    }
                },
            };

            if self.links.responses_tx.send_msg(response).await.is_err() {
                warn!(target: "coordinator.loop", "client link closed while replying");
                break;
            }
        }
    }

    /// Returns the `ClientResponse` directly (rather than
    /// `Result<BlockId, ErrorCode>`) so `run` can forward it regardless of
    /// whether allocation succeeded, matching the non-fatal nature of
    /// `OutOfMemory`.
    async fn allocate(&mut self, size: u64) -> Result<ClientResponse, CoordinatorError> {
        debug_assert!(size >= 1, "allocate precondition: size >= 1");

        if self.capacity.total_free() < size {
            debug!(target: "coordinator.alloc", size, "out_of_memory");
            return Ok(ClientResponse::Allocate(Err(ErrorCode::OutOfMemory)));
        }

        let fragments = self.capacity.place(size);
        let id = self.placement.next_id();
        for fragment in &fragments {
            self.send_to_worker(
                fragment.rank,
                CoordinatorMessage::Allocate {
                    key: id,
                    length: fragment.length,
                },
            )
            .await?;
        }
        self.placement.insert(id, fragments);
        debug!(target: "coordinator.alloc", id, size, "allocated");
        Ok(ClientResponse::Allocate(Ok(id)))
    }

    /// Conformance check, split, fan-out sends, ordered collect,
    /// merge-by-id-then-rank.
    async fn read(
        &mut self,
        mut descriptors: Vec<SliceDescriptor>,
    ) -> Result<ClientResponse, CoordinatorError> {
        if let Err(code) = conformance_check(&self.placement, self.capacity.max_size(), &mut descriptors) {
            return Ok(ClientResponse::Read(Err(code)));
        }

        let subrequests = split_all(&self.placement, &descriptors);
        debug!(target: "coordinator.read", subrequests = subrequests.len(), "dispatching");

        for subrequest in &subrequests {
            self.send_to_worker(
                subrequest.rank,
                CoordinatorMessage::Read {
                    key: subrequest.key,
                    start: subrequest.local_start,
                    stop: subrequest.local_stop,
                    step: subrequest.step,
                },
            )
            .await?;
        }

        // Collected in subrequest-list order: the k-th reply comes from the
        // k-th subrequest's rank, relying on FIFO ordering per rank pair.
        let mut by_key: BTreeMap<BlockId, Vec<(usize, Vec<i64>)>> = BTreeMap::new();
        for subrequest in &subrequests {
            let WorkerReadResult { values, .. } = self.recv_from_worker(subrequest.rank).await?;
            by_key.entry(subrequest.key).or_default().push((subrequest.rank, values));
        }

        let mut results = Vec::with_capacity(by_key.len());
        for (_, mut parts) in by_key {
            parts.sort_by_key(|(rank, _)| *rank);
            results.push(parts.into_iter().flat_map(|(_, values)| values).collect());
        }
        Ok(ClientResponse::Read(Ok(results)))
    }

    /// Conformance check, expand value against the first
    /// descriptor's cardinality, split, then fire-and-forget writes with a
    /// per-`BlockId` cursor into `value` that resets on each new block.
    async fn write(
        &mut self,
        mut descriptors: Vec<SliceDescriptor>,
        value: WriteValue,
    ) -> Result<ClientResponse, CoordinatorError> {
        if let Err(code) = conformance_check(&self.placement, self.capacity.max_size(), &mut descriptors) {
            return Ok(ClientResponse::Write(Err(code)));
        }

        let Some(first) = descriptors.first() else {
            return Ok(ClientResponse::Write(Ok(())));
        };
        let total = first.cardinality();
        let expanded = match value.expand(total) {
            Ok(values) => values,
            Err(code) => return Ok(ClientResponse::Write(Err(code))),
        };

        let subrequests = split_all(&self.placement, &descriptors);

        let mut shift: usize = 0;
        let mut last_key: Option<BlockId> = None;
        for subrequest in &subrequests {
            if last_key != Some(subrequest.key) {
                shift = 0;
                last_key = Some(subrequest.key);
            }
            let sub_len = subrequest.cardinality() as usize;
            let sub_values = expanded[shift..shift + sub_len].to_vec();
            shift += sub_len;

            self.send_to_worker(
                subrequest.rank,
                CoordinatorMessage::Write {
                    key: subrequest.key,
                    start: subrequest.local_start,
                    stop: subrequest.local_stop,
                    step: subrequest.step,
                    values: sub_values,
                },
            )
            .await?;
        }
        Ok(ClientResponse::Write(Ok(())))
    }

    /// Stops at the first unknown id, leaving ids deleted before it
    /// deleted (documented behavior, not a bug: a failing delete performs
    /// no rollback of prior deletes already applied in the same batch).
    async fn delete(
        &mut self,
        descriptors: Vec<SliceDescriptor>,
    ) -> Result<ClientResponse, CoordinatorError> {
        for descriptor in &descriptors {
            let key = descriptor.key;
            if !self.placement.contains(key) {
                return Ok(ClientResponse::Delete(Err(ErrorCode::UnknownKey)));
            }

            let ranks = ranks_for(&self.placement, key);
            for rank in ranks {
                self.send_to_worker(rank, CoordinatorMessage::Delete { key }).await?;
            }

            let fragments = self.placement.remove(key);
            if RESTORE_CAPACITY_ON_DELETE {
                if let Some(fragments) = fragments {
                    self.capacity.restore(&fragments);
                }
            }
            debug!(target: "coordinator.delete", key, "deleted");
        }
        Ok(ClientResponse::Delete(Ok(())))
    }

    async fn close_all(&mut self) {
        for worker in &self.links.workers {
            if worker.directives_tx.send_msg(CoordinatorMessage::Close).await.is_err() {
                warn!(target: "coordinator.loop", rank = worker.rank, "worker link already closed");
            }
        }
    }

    async fn send_to_worker(&mut self, rank: usize, message: CoordinatorMessage) -> Result<(), CoordinatorError> {
        let ordinal = rank - 2;
        self.links.workers[ordinal]
            .directives_tx
            .send_msg(message)
            .await
            .map_err(|_| CoordinatorError::LinkClosed { rank })
    }

    async fn recv_from_worker(&mut self, rank: usize) -> Result<WorkerReadResult, CoordinatorError> {
        let ordinal = rank - 2;
        self.links.workers[ordinal]
            .replies_rx
            .recv_msg()
            .await
            .ok_or(CoordinatorError::LinkClosed { rank })
    }
}

//! The client facade: typed entry points that build protocol messages and
//! await the coordinator's matching reply. Indexing-style convenience
//! (scalar/range/tuple forms) is replaced with explicit `read_slice(s)` and
//! `write_slice(s)` entry points, since Rust has no natural indexing sugar
//! for a multi-key batch request.

use core_protocol::{BlockId, ClientRequest, ClientResponse, ErrorCode, SliceDescriptor, WriteValue};
use core_transport::{ClientLink, RankReceiver, RankSender};
use thiserror::Error;
use tracing::debug;

/// Failure modes visible to a client caller: either a typed protocol error
/// code returned by the coordinator, or the transport itself going away.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Protocol(#[from] ErrorCode),
    #[error("coordinator link closed")]
    Disconnected,
}

pub struct DistributedMemory {
    link: ClientLink,
}

impl DistributedMemory {
    pub fn new(link: ClientLink) -> Self {
        Self { link }
    }

    pub async fn allocate(&mut self, size: u64) -> Result<BlockId, ClientError> {
        match self.roundtrip(ClientRequest::Allocate { size }).await? {
            ClientResponse::Allocate(result) => Ok(result?),
            other => panic!("protocol desync: expected Allocate reply, got {other:?}"),
        }
    }

    pub async fn read_slice(&mut self, descriptor: SliceDescriptor) -> Result<Vec<i64>, ClientError> {
        let mut results = self.read_slices(vec![descriptor]).await?;
        Ok(results.remove(0))
    }

    pub async fn read_slices(
        &mut self,
        descriptors: Vec<SliceDescriptor>,
    ) -> Result<Vec<Vec<i64>>, ClientError> {
        match self.roundtrip(ClientRequest::Read { descriptors }).await? {
            ClientResponse::Read(result) => Ok(result?),
            other => panic!("protocol desync: expected Read reply, got {other:?}"),
        }
    }

    pub async fn write_slice(
        &mut self,
        descriptor: SliceDescriptor,
        value: WriteValue,
    ) -> Result<(), ClientError> {
        self.write_slices(vec![descriptor], value).await
    }

    pub async fn write_slices(
        &mut self,
        descriptors: Vec<SliceDescriptor>,
        value: WriteValue,
    ) -> Result<(), ClientError> {
        match self.roundtrip(ClientRequest::Write { descriptors, value }).await? {
            ClientResponse::Write(result) => Ok(result?),
            other => panic!("protocol desync: expected Write reply, got {other:?}"),
        }
    }

    pub async fn delete(&mut self, descriptors: Vec<SliceDescriptor>) -> Result<(), ClientError> {
        match self.roundtrip(ClientRequest::Delete { descriptors }).await? {
            ClientResponse::Delete(result) => Ok(result?),
            other => panic!("protocol desync: expected Delete reply, got {other:?}"),
        }
    }

    /// Sends `Close` and consumes `self`: the link cannot be used again once
    /// the coordinator has begun tearing down the worker pool.
    pub async fn close(mut self) {
        debug!(target: "client.close", "closing");
        let _ = self.link.requests_tx.send_msg(ClientRequest::Close).await;
    }

    async fn roundtrip(&mut self, request: ClientRequest) -> Result<ClientResponse, ClientError> {
        self.link
            .requests_tx
            .send_msg(request)
            .await
            .map_err(|_| ClientError::Disconnected)?;
        self.link.responses_rx.recv_msg().await.ok_or(ClientError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_coordinator::Coordinator;
    use core_transport::build_cluster;

    async fn spawn_cluster(max_size: u64, worker_count: usize) -> DistributedMemory {
        let (client_link, coordinator_links, workers) = build_cluster(worker_count);
        let coordinator = Coordinator::new(max_size, coordinator_links);
        tokio::spawn(coordinator.run());
        for worker in workers {
            tokio::spawn(core_worker::run(worker));
        }
        DistributedMemory::new(client_link)
    }

    #[tokio::test]
    async fn allocate_then_write_then_read_round_trips() {
        let mut memory = spawn_cluster(4, 3).await;
        let key = memory.allocate(8).await.unwrap();
        memory
            .write_slice(
                SliceDescriptor::new(key, 0, 8, 1),
                WriteValue::Sequence(vec![1, 2, 3, 4, 5, 6, 7, 8]),
            )
            .await
            .unwrap();
        let values = memory.read_slice(SliceDescriptor::new(key, 0, 8, 1)).await.unwrap();
        assert_eq!(values, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        memory.close().await;
    }

    #[tokio::test]
    async fn read_unknown_key_surfaces_error_code() {
        let mut memory = spawn_cluster(4, 3).await;
        let err = memory
            .read_slice(SliceDescriptor::new(9, 0, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Protocol(ErrorCode::UnknownKey)));
        memory.close().await;
    }

    #[tokio::test]
    async fn allocate_beyond_capacity_reports_out_of_memory() {
        let mut memory = spawn_cluster(4, 3).await;
        let err = memory.allocate(13).await.unwrap_err();
        assert!(matches!(err, ClientError::Protocol(ErrorCode::OutOfMemory)));
        memory.close().await;
    }

    #[tokio::test]
    async fn scalar_write_broadcasts_across_the_slice() {
        let mut memory = spawn_cluster(4, 3).await;
        let key = memory.allocate(4).await.unwrap();
        memory
            .write_slice(SliceDescriptor::new(key, 0, 4, 1), WriteValue::Scalar(9))
            .await
            .unwrap();
        let values = memory.read_slice(SliceDescriptor::new(key, 0, 4, 1)).await.unwrap();
        assert_eq!(values, vec![9, 9, 9, 9]);
        memory.close().await;
    }
}

//! End-to-end coverage of the six documented boundary scenarios (allocation
//! spanning multiple workers, write/read round trips, strided reads crossing
//! fragment boundaries, and the two error paths), driven through the full
//! coordinator + worker task pipeline over `core-transport` rather than by
//! calling coordinator methods directly (see the unit tests colocated in
//! `src/coordinator.rs` for the latter).

use core_client::DistributedMemory;
use core_coordinator::Coordinator;
use core_protocol::{ErrorCode, SliceDescriptor, WriteValue};
use core_transport::build_cluster;

const WORKER_MAX_SIZE: u64 = 4;
const WORKER_COUNT: usize = 3;

async fn spawn_cluster() -> DistributedMemory {
    let (client_link, coordinator_links, worker_endpoints) = build_cluster(WORKER_COUNT);
    let coordinator = Coordinator::new(WORKER_MAX_SIZE, coordinator_links);
    tokio::spawn(coordinator.run());
    for endpoint in worker_endpoints {
        tokio::spawn(core_worker::run(endpoint));
    }
    DistributedMemory::new(client_link)
}

#[tokio::test]
async fn scenario_1_allocate_ten_spans_three_workers() {
    let mut memory = spawn_cluster().await;
    let key = memory.allocate(10).await.unwrap();
    assert_eq!(key, 0);
    memory.close().await;
}

#[tokio::test]
async fn scenario_2_write_then_read_full_block() {
    let mut memory = spawn_cluster().await;
    let key = memory.allocate(10).await.unwrap();

    memory
        .write_slice(
            SliceDescriptor::new(key, 0, 10, 1),
            WriteValue::Sequence(vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]),
        )
        .await
        .unwrap();

    let values = memory.read_slice(SliceDescriptor::new(key, 0, 10, 1)).await.unwrap();
    assert_eq!(values, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    memory.close().await;
}

#[tokio::test]
async fn scenario_3_stride_two_read_crosses_two_fragments() {
    let mut memory = spawn_cluster().await;
    let key = memory.allocate(10).await.unwrap();
    memory
        .write_slice(
            SliceDescriptor::new(key, 0, 10, 1),
            WriteValue::Sequence(vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]),
        )
        .await
        .unwrap();

    let values = memory.read_slice(SliceDescriptor::new(key, 1, 9, 2)).await.unwrap();
    assert_eq!(values, vec![1, 3, 5, 7]);
    memory.close().await;
}

#[tokio::test]
async fn scenario_4_stride_three_read_crosses_all_three_fragments() {
    let mut memory = spawn_cluster().await;
    let key = memory.allocate(10).await.unwrap();
    memory
        .write_slice(
            SliceDescriptor::new(key, 0, 10, 1),
            WriteValue::Sequence(vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]),
        )
        .await
        .unwrap();

    let values = memory.read_slice(SliceDescriptor::new(key, 0, 10, 3)).await.unwrap();
    assert_eq!(values, vec![0, 3, 6, 9]);
    memory.close().await;
}

#[tokio::test]
async fn scenario_5_allocate_beyond_total_capacity_leaves_state_untouched() {
    let mut memory = spawn_cluster().await;
    let err = memory.allocate(13).await.unwrap_err();
    assert!(matches!(err, core_client::ClientError::Protocol(ErrorCode::OutOfMemory)));

    // Placement table untouched: a fresh allocate still gets id 0.
    let key = memory.allocate(4).await.unwrap();
    assert_eq!(key, 0);
    memory.close().await;
}

#[tokio::test]
async fn scenario_6_delete_unallocated_id_reports_unknown_key() {
    let mut memory = spawn_cluster().await;
    let err = memory
        .delete(vec![SliceDescriptor::new(7, 0, 0, 1)])
        .await
        .unwrap_err();
    assert!(matches!(err, core_client::ClientError::Protocol(ErrorCode::UnknownKey)));
    memory.close().await;
}

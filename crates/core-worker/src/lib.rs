//! The worker role: an [`ElementStore`] plus the four-directive message loop
//! that drives it.

mod store;

pub use store::ElementStore;

use core_protocol::{CoordinatorMessage, WorkerReadResult};
use core_transport::{RankReceiver, RankSender, WorkerEndpoint};
use tracing::trace;

/// Runs one worker to completion: receives directives from the coordinator
/// until `Close`, applying each to its local `ElementStore` and replying to
/// `Read` directives only.
pub async fn run(mut endpoint: WorkerEndpoint) {
    let mut store = ElementStore::new();
    let rank = endpoint.rank;

    while let Some(message) = endpoint.directives_rx.recv_msg().await {
        match message {
            CoordinatorMessage::Close => {
                trace!(target: "worker.loop", rank, "close");
                break;
            }
            CoordinatorMessage::Allocate { key, length } => {
                trace!(target: "worker.loop", rank, key, length, "malloc");
                store.malloc(key, length);
            }
            CoordinatorMessage::Read { key, start, stop, step } => {
                trace!(target: "worker.loop", rank, key, start, stop, step, "get_item");
                let values = store.get_item(key, start, stop, step);
                if endpoint
                    .replies_tx
                    .send_msg(WorkerReadResult { key, values })
                    .await
                    .is_err()
                {
                    trace!(target: "worker.loop", rank, "coordinator link closed while replying");
                    break;
                }
            }
            CoordinatorMessage::Write { key, start, stop, step, values } => {
                trace!(target: "worker.loop", rank, key, start, stop, step, "set_item");
                store.set_item(key, start, stop, step, &values);
            }
            CoordinatorMessage::Delete { key } => {
                trace!(target: "worker.loop", rank, key, "del_item");
                store.del_item(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_transport::build_cluster;

    #[tokio::test]
    async fn close_directive_ends_the_loop() {
        let (_client, links, mut workers) = build_cluster(1);
        let mut coordinator_links = links;
        let endpoint = workers.remove(0);
        let handle = tokio::spawn(run(endpoint));

        coordinator_links.workers[0]
            .directives_tx
            .send(CoordinatorMessage::Close)
            .await
            .unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn read_directive_replies_with_requested_slice() {
        let (_client, mut links, mut workers) = build_cluster(1);
        let endpoint = workers.remove(0);
        let handle = tokio::spawn(run(endpoint));

        let worker = &mut links.workers[0];
        worker
            .directives_tx
            .send(CoordinatorMessage::Allocate { key: 0, length: 4 })
            .await
            .unwrap();
        worker
            .directives_tx
            .send(CoordinatorMessage::Write {
                key: 0,
                start: 0,
                stop: 4,
                step: 1,
                values: vec![1, 2, 3, 4],
            })
            .await
            .unwrap();
        worker
            .directives_tx
            .send(CoordinatorMessage::Read { key: 0, start: 0, stop: 4, step: 1 })
            .await
            .unwrap();

        let result = worker.replies_rx.recv().await.unwrap();
        assert_eq!(result.key, 0);
        assert_eq!(result.values, vec![1, 2, 3, 4]);

        worker.directives_tx.send(CoordinatorMessage::Close).await.unwrap();
        handle.await.unwrap();
    }
}

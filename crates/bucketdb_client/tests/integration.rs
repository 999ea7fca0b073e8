//! Integration tests for the client against the in-memory server.

use bucketdb_client::{
    ClientConfig, ClientError, HttpExecutor, LoopbackClient, OutcomeCategory, RemoteClient,
    RequestOptions,
};
use bucketdb_protocol::{records_path, CollectionRef, RequestDescriptor, SyncMarker};
use bucketdb_testkit::generators::record_writes_strategy;
use bucketdb_testkit::{MemoryServer, ServerConfig};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

type Client = RemoteClient<HttpExecutor<LoopbackClient<Arc<MemoryServer>>>>;

fn connect(server: &Arc<MemoryServer>, config: ClientConfig) -> Client {
    RemoteClient::connect(config, LoopbackClient::new(Arc::clone(server)))
}

fn setup(limit: usize) -> (Arc<MemoryServer>, Client) {
    let server = Arc::new(MemoryServer::new(ServerConfig::new(Some(limit))));
    let client = connect(&server, ClientConfig::new("memory://").with_bucket("main"));
    (server, client)
}

fn tasks() -> CollectionRef {
    CollectionRef::new("main", "tasks")
}

fn write(id: &str, title: &str) -> RequestDescriptor {
    RequestDescriptor::put(
        format!("{}/{id}", records_path(&tasks(), None)),
        json!({"data": {"title": title}}),
    )
}

fn writes(n: usize) -> Vec<RequestDescriptor> {
    (0..n).map(|i| write(&format!("r{i:02}"), "task")).collect()
}

#[test]
fn chunked_batch_against_server() {
    let (server, client) = setup(5);

    let requests = writes(17);
    let responses = client.batch(&requests, &RequestOptions::new()).unwrap();

    assert_eq!(responses.len(), 17);
    assert_eq!(server.batch_count(), 4);
    for (i, response) in responses.iter().enumerate() {
        assert_eq!(response.status, 201);
        assert_eq!(response.body.as_ref().unwrap()["data"]["id"], format!("r{i:02}"));
    }
    assert_eq!(server.store().len(&tasks()), 17);
}

#[test]
fn parallel_chunks_keep_order() {
    let (server, client) = setup(3);

    let requests = writes(20);
    let responses = client
        .batch(&requests, &RequestOptions::new().with_concurrency(4))
        .unwrap();

    assert_eq!(server.batch_count(), 7);
    let ids: Vec<_> = responses
        .iter()
        .map(|r| r.body.as_ref().unwrap()["data"]["id"].clone())
        .collect();
    let expected: Vec<_> = (0..20).map(|i| json!(format!("r{i:02}"))).collect();
    assert_eq!(ids, expected);
}

#[test]
fn connect_uses_configured_server_url() {
    let (_server, client) = setup(5);
    assert_eq!(client.executor().base_url(), "memory:");
    assert_eq!(client.config().server_url, "memory://");
    assert!(client.server_settings().is_ok());
}

#[test]
fn empty_batch_sends_nothing() {
    let (server, client) = setup(5);

    let responses = client.batch(&[], &RequestOptions::new()).unwrap();
    assert!(responses.is_empty());
    assert_eq!(server.request_count(), 0);
}

#[test]
fn settings_fetched_once() {
    let (server, client) = setup(2);

    client.batch(&writes(3), &RequestOptions::new()).unwrap();
    client.batch(&writes(3), &RequestOptions::new()).unwrap();
    client
        .fetch_changes_since("tasks", None, &RequestOptions::new())
        .unwrap();

    let roots = server.requests().iter().filter(|r| *r == "GET /").count();
    assert_eq!(roots, 1);
    assert_eq!(client.server_info().unwrap().project_name.as_deref(), Some("bucketdb"));
}

#[test]
fn aggregate_conflicts_and_creations() {
    let (_server, client) = setup(2);
    client.batch(&[write("a", "first")], &RequestOptions::new()).unwrap();

    let requests = vec![write("a", "second"), write("b", "new"), write("c", "new")];
    let options = RequestOptions::new().with_header("If-None-Match", "*");
    let result = client.batch_aggregate(&requests, &options).unwrap();

    assert_eq!(result.total(), 3);
    assert!(result.has_failures());
    let conflicts = result.get(OutcomeCategory::Conflict);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].index, 0);
    assert_eq!(result.get(OutcomeCategory::Created).len(), 2);
}

#[test]
fn partial_batch_reports_applied_chunks() {
    let (server, client) = setup(2);
    server.fail_batch(1, 503);

    let err = client.batch(&writes(5), &RequestOptions::new()).unwrap_err();
    match &err {
        ClientError::PartialBatch {
            failed_chunk,
            total_chunks,
            applied_requests,
            ..
        } => {
            assert_eq!(*failed_chunk, 1);
            assert_eq!(*total_chunks, 3);
            assert_eq!(*applied_requests, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_retryable());
    assert_eq!(err.status(), Some(503));

    // No further chunks were sent after the failure.
    assert_eq!(server.batch_count(), 2);
    assert_eq!(server.store().len(&tasks()), 2);
}

#[test]
fn change_sync_lifecycle() {
    let (_server, client) = setup(10);
    let options = RequestOptions::new();
    client
        .batch(&[write("a", "one"), write("b", "two")], &options)
        .unwrap();

    // First sync returns everything.
    let first = client.fetch_changes_since("tasks", None, &options).unwrap();
    assert_eq!(first.changes.len(), 2);
    assert_eq!(first.marker, Some(SyncMarker::new(2)));

    // Nothing changed since.
    let again = client
        .fetch_changes_since("tasks", first.marker, &options)
        .unwrap();
    assert!(again.is_unchanged());
    assert_eq!(again.marker, first.marker);

    // One update and one deletion.
    client.batch(&[write("a", "edited")], &options).unwrap();
    client
        .batch(
            &[RequestDescriptor::delete(format!(
                "{}/b",
                records_path(&tasks(), None)
            ))],
            &options,
        )
        .unwrap();

    let changed = client
        .fetch_changes_since("tasks", first.marker, &options)
        .unwrap();
    assert_eq!(changed.marker, Some(SyncMarker::new(4)));
    assert_eq!(changed.changes.len(), 2);
    assert_eq!(changed.changes[0]["title"], "edited");
    assert_eq!(changed.changes[1]["deleted"], true);
}

#[test]
fn flushed_server_is_detected_as_reset() {
    let (server, client) = setup(10);
    let options = RequestOptions::new();
    client.batch(&writes(3), &options).unwrap();

    let synced = client.fetch_changes_since("tasks", None, &options).unwrap();
    let marker = synced.marker.unwrap();

    server.flush();

    let err = client
        .fetch_changes_since("tasks", Some(marker), &options)
        .unwrap_err();
    assert!(err.is_store_reset());
    match err {
        ClientError::StoreReset {
            collection,
            local,
            remote,
        } => {
            assert_eq!(collection, "main/tasks");
            assert_eq!(local, marker);
            assert!(remote > local);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn fetch_from_another_bucket() {
    let (_server, client) = setup(10);
    let blog = CollectionRef::new("blog", "posts");
    client
        .batch(
            &[RequestDescriptor::put(
                format!("{}/hello", records_path(&blog, None)),
                json!({"data": {}}),
            )],
            &RequestOptions::new(),
        )
        .unwrap();

    let main = client
        .fetch_changes_since("posts", None, &RequestOptions::new())
        .unwrap();
    assert!(main.changes.is_empty());

    let other = client
        .fetch_changes_since("posts", None, &RequestOptions::new().with_bucket("blog"))
        .unwrap();
    assert_eq!(other.changes.len(), 1);
}

#[test]
fn backoff_header_is_tracked() {
    let (server, client) = setup(10);
    assert_eq!(client.remaining_backoff_ms(), 0);

    server.set_backoff(Some(10));
    client.server_settings().unwrap();
    client.batch(&writes(1), &RequestOptions::new()).unwrap();

    let remaining = client.remaining_backoff_ms();
    assert!(remaining > 0 && remaining <= 10_000);
    assert!(client.backoff_tracker().is_active());
}

#[test]
fn server_errors_surface_status() {
    let (server, client) = setup(10);
    server.fail_next(500);

    let err = client.server_settings().unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(err.is_retryable());

    // The failure was not cached.
    assert!(client.server_settings().is_ok());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_write_lands_once(
        requests in record_writes_strategy(CollectionRef::new("main", "tasks"), 40),
        limit in 1usize..8,
    ) {
        let (server, client) = setup(limit);

        let result = client.batch_aggregate(&requests, &RequestOptions::new()).unwrap();
        prop_assert_eq!(result.total(), requests.len());
        prop_assert_eq!(result.get(OutcomeCategory::Created).len(), requests.len());
        prop_assert_eq!(server.batch_count(), requests.len().div_ceil(limit));
        prop_assert_eq!(server.store().len(&tasks()), requests.len());
    }
}

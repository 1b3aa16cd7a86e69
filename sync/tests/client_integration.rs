//! End-to-end behavior of the client against an in-memory config server.

use parking_lot::Mutex;
use rc_core::{Change, ChangeEvent, ChangeObserver, ConfigValue};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use sync::{Client, ClientError};
use testing::{FaultyTransport, MockConfigServer, client_config};
use tokio::sync::mpsc::Receiver;

const WAIT: Duration = Duration::from_secs(5);

fn client(server: &Arc<MockConfigServer>, config: config::ClientConfig) -> Client {
    Client::builder(config)
        .with_transport(server.clone())
        .build()
        .unwrap()
}

fn faulty_client(faulty: &Arc<FaultyTransport>, config: config::ClientConfig) -> Client {
    Client::builder(config)
        .with_transport(faulty.clone())
        .build()
        .unwrap()
}

async fn next_event(events: &mut Receiver<ChangeEvent>) -> ChangeEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("no change event in time")
        .expect("change stream closed")
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_add_modify_delete_reach_the_change_stream() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(MockConfigServer::new());
    server.set("application", "name", "billing");

    let client = client(&server, client_config(dir.path(), &["application"]));
    let mut events = client.watch_update().unwrap();
    client.start().await.unwrap();
    assert_eq!(client.get_string("name").as_deref(), Some("billing"));
    assert!(client.get_release_key("application").is_some());

    server.set("application", "timeout", "30");
    let event = next_event(&mut events).await;
    assert_eq!(event.namespace, "application");
    assert_eq!(
        event.get("timeout"),
        Some(&Change::Add {
            new_value: ConfigValue::from("30")
        })
    );
    assert_eq!(client.get_int("timeout"), Some(30));

    server.set("application", "timeout", "60");
    let event = next_event(&mut events).await;
    assert_eq!(
        event.get("timeout"),
        Some(&Change::Modify {
            old_value: ConfigValue::from("30"),
            new_value: ConfigValue::from("60")
        })
    );
    assert_eq!(client.get_int("timeout"), Some(60));

    server.delete("application", "timeout");
    let event = next_event(&mut events).await;
    assert_eq!(event.len(), 1);
    assert_eq!(
        event.get("timeout"),
        Some(&Change::Delete {
            old_value: ConfigValue::from("60")
        })
    );
    assert!(client.get_value("timeout").is_none());
    assert_eq!(client.get_int_or("timeout", 5), 5);
    assert_eq!(client.get_release_key("application"), server.release_key("application"));

    client.stop().await;
}

#[tokio::test]
async fn test_preload_falls_back_to_snapshot_when_offline() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(MockConfigServer::new());
    server.set("application", "name", "billing");
    let config = client_config(dir.path(), &["application"]);

    let first = client(&server, config.clone());
    first.start().await.unwrap();
    first.stop().await;
    assert!(config.dump_file_path().exists());

    server.set_offline(true);
    let second = client(&server, config);
    second.start().await.unwrap();
    assert_eq!(second.get_string("name").as_deref(), Some("billing"));
    assert!(second.get_release_key("application").is_none());

    let before = server.config_requests("application").len();
    server.set_offline(false);
    wait_until(|| server.config_requests("application").len() > before).await;

    let requests = server.config_requests("application");
    assert!(requests[before].ends_with("releaseKey="), "{}", requests[before]);
    wait_until(|| second.get_release_key("application") == server.release_key("application")).await;
    assert_eq!(second.get_string("name").as_deref(), Some("billing"));

    second.stop().await;
}

#[tokio::test]
async fn test_start_fails_without_server_or_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(MockConfigServer::new());
    server.set_offline(true);

    let client = client(&server, client_config(dir.path(), &["application"]));
    let err = client.start().await.unwrap_err();
    assert!(matches!(err, ClientError::PreloadFailed { ref namespace, .. } if namespace == "application"));
    assert!(client.get_all_keys("application").is_empty());

    client.stop().await;
}

struct Recorder(Mutex<Vec<ChangeEvent>>);

impl Recorder {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Vec::new())))
    }

    fn count(&self) -> usize {
        self.0.lock().len()
    }
}

impl ChangeObserver for Recorder {
    fn handle_change_event(&self, event: &ChangeEvent) {
        self.0.lock().push(event.clone());
    }
}

struct Faulty;

impl ChangeObserver for Faulty {
    fn handle_change_event(&self, _event: &ChangeEvent) {
        panic!("observer failure");
    }
}

#[tokio::test]
async fn test_observers_are_isolated_and_recallable() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(MockConfigServer::new());
    server.set("application", "name", "billing");

    let client = client(&server, client_config(dir.path(), &["application"]));
    let recalled = Recorder::new();
    let recall = client.register_observer(recalled.clone());
    let _faulty = client.register_observer(Arc::new(Faulty));
    let steady = Recorder::new();
    let _steady = client.register_observer(steady.clone());
    assert_eq!(client.observers().len(), 3);

    assert!(client.start_watch_update());
    client.start().await.unwrap();

    server.set("application", "name", "payments");
    wait_until(|| steady.count() == 1).await;
    assert_eq!(recalled.count(), 1);

    recall();
    recall();
    assert_eq!(client.observers().len(), 2);

    server.set("application", "name", "ledger");
    wait_until(|| steady.count() == 2).await;
    assert_eq!(recalled.count(), 1);

    let last = steady.0.lock()[1].clone();
    assert_eq!(
        last.get("name").and_then(Change::new_value),
        Some(&ConfigValue::from("ledger"))
    );

    client.stop().await;
}

#[tokio::test]
async fn test_subscribing_fetches_new_namespace() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(MockConfigServer::new());
    server.set("application", "name", "billing");
    server.set("feature_flags", "checkout", "1");

    let client = client(&server, client_config(dir.path(), &["application"]));
    let mut events = client.watch_update().unwrap();
    client.start().await.unwrap();
    assert!(client.get_all_keys("feature_flags").is_empty());

    client.subscribe_to_namespaces(["feature_flags"]).await.unwrap();
    assert!(client.watched_namespaces().contains(&"feature_flags".to_string()));
    assert_eq!(client.get_release_key("feature_flags"), server.release_key("feature_flags"));

    let event = next_event(&mut events).await;
    assert_eq!(event.namespace, "feature_flags");
    assert_eq!(event.get("checkout").map(Change::change_type), Some(rc_core::ChangeType::Add));

    let flags = client.namespace("feature_flags");
    assert_eq!(flags.get_int("checkout"), Some(1));
    assert_eq!(flags.get_float("checkout"), Some(1.0));
    assert_eq!(flags.get_bool("checkout"), Some(true));

    client.stop().await;
}

#[derive(Debug, Deserialize, PartialEq)]
struct ClientSettings {
    name: String,
    limits: Vec<u32>
}

#[tokio::test]
async fn test_document_namespace_content_and_value() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(MockConfigServer::new());
    let document = r#"{"name":"billing","limits":[1,2],"db":{"host":"10.0.0.1"}}"#;
    server.set_content("client.json", document);

    let client = client(&server, client_config(dir.path(), &["client.json"]));
    client.start().await.unwrap();

    assert_eq!(client.get_namespace_content("client.json").as_deref(), Some(document));
    let view = client.namespace("client.json");
    assert_eq!(view.get_string("db.host").as_deref(), Some("10.0.0.1"));
    assert_eq!(view.get_int_slice("limits"), Some(vec![1, 2]));

    let settings: ClientSettings = client.get_namespace_value("client.json").unwrap();
    assert_eq!(
        settings,
        ClientSettings {
            name: "billing".to_string(),
            limits: vec![1, 2]
        }
    );

    client.stop().await;
}

#[tokio::test]
async fn test_stop_ends_background_work() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(MockConfigServer::new());
    server.set("application", "name", "billing");

    let client = client(&server, client_config(dir.path(), &["application"]));
    let mut events = client.watch_update().unwrap();
    client.start().await.unwrap();

    tokio::time::timeout(WAIT, client.stop())
        .await
        .expect("stop waits on a held poll");
    assert!(client.is_stopped());
    assert!(events.recv().await.is_none());

    server.set("application", "name", "payments");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.get_string("name").as_deref(), Some("billing"));
}

#[tokio::test]
async fn test_subscribe_reports_failed_fetch_and_keeps_watching() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(MockConfigServer::new());
    server.set("application", "name", "billing");
    server.set("db.properties", "host", "db.local");
    let faulty = Arc::new(FaultyTransport::new(server.clone()));
    faulty.fail_config_fetches("db.properties");

    let client = faulty_client(&faulty, client_config(dir.path(), &["application"]));
    client.start().await.unwrap();

    let err = client.subscribe_to_namespaces(["db.properties"]).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
    assert!(client.watched_namespaces().contains(&"db.properties".to_string()));

    faulty.heal_config_fetches("db.properties");
    wait_until(|| client.namespace("db.properties").get_string("host").as_deref() == Some("db.local")).await;

    client.stop().await;
}

#[tokio::test]
async fn test_refresh_recovers_after_failed_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(MockConfigServer::new());
    server.set("application", "key", "val");
    let faulty = Arc::new(FaultyTransport::new(server.clone()));

    let client = faulty_client(&faulty, client_config(dir.path(), &["application"]));
    client.start().await.unwrap();
    assert_eq!(client.get_string("key").as_deref(), Some("val"));

    faulty.fail_config_fetches("application");
    server.set("application", "key", "val2");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(client.get_string("key").as_deref(), Some("val"));

    faulty.heal_config_fetches("application");
    wait_until(|| client.get_string("key").as_deref() == Some("val2")).await;
    assert_eq!(client.get_release_key("application"), server.release_key("application"));

    client.stop().await;
}

#[tokio::test]
async fn test_partial_outage_preload_keeps_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(MockConfigServer::new());
    server.set("application", "name", "billing");
    server.set("db.properties", "host", "db.local");
    let config = client_config(dir.path(), &["application", "db.properties"]);

    let first = client(&server, config.clone());
    first.start().await.unwrap();
    first.stop().await;

    server.set("application", "name", "payments");
    let faulty = Arc::new(FaultyTransport::new(server.clone()));
    faulty.fail_config_fetches("db.properties");

    let second = faulty_client(&faulty, config.clone());
    second.start().await.unwrap();
    assert_eq!(second.get_string("name").as_deref(), Some("payments"));
    assert_eq!(
        second.namespace("db.properties").get_string("host").as_deref(),
        Some("db.local")
    );
    second.stop().await;

    let snapshot = storage::Snapshot::read_from(&config.dump_file_path()).unwrap();
    assert_eq!(
        snapshot.namespace("db.properties").and_then(|ns| ns.get("host")),
        Some(&ConfigValue::from("db.local"))
    );
}

#[tokio::test]
async fn test_full_delivery_queue_loses_no_events() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(MockConfigServer::new());
    server.set("application", "key", "v0");
    let mut config = client_config(dir.path(), &["application"]);
    config.delivery_queue_capacity = 1;

    let client = client(&server, config);
    let mut events = client.watch_update().unwrap();
    client.start().await.unwrap();

    server.set("application", "key", "v1");
    wait_until(|| client.get_string("key").as_deref() == Some("v1")).await;
    server.set("application", "key", "v2");
    wait_until(|| client.get_string("key").as_deref() == Some("v2")).await;
    server.set("application", "key", "v3");

    for expected in ["v1", "v2", "v3"] {
        let event = next_event(&mut events).await;
        assert_eq!(
            event.get("key").and_then(Change::new_value),
            Some(&ConfigValue::from(expected))
        );
    }
    assert_eq!(client.get_string("key").as_deref(), Some("v3"));

    client.stop().await;
}

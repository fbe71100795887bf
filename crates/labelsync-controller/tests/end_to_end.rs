use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use labelsync_config::{ControllerSettings, LabelSyncConfig, QueueSettings};
use labelsync_controller::{
    Committer, ControllerError, LabelPatch, LabelSyncEngine, MergePatchCommitter,
};
use labelsync_core::events::EventBroadcaster;
use labelsync_core::{ApiBinding, ApiExport, ClusterObject, ResourceKey, ResourceKind};
use labelsync_storage::{ClusterStore, DynStore, EventedStore, InMemoryStore, PatchType};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const MARKER: &str = "sync";

/// Records every patch handed to the committer, then delegates.
struct RecordingCommitter {
    inner: MergePatchCommitter,
    seen: Mutex<Vec<(String, serde_json::Value)>>,
}

#[async_trait]
impl Committer for RecordingCommitter {
    async fn apply(&self, key: &ResourceKey, patch: &LabelPatch) -> Result<(), ControllerError> {
        self.seen
            .lock()
            .push((key.encode(), patch.to_merge_patch()));
        self.inner.apply(key, patch).await
    }
}

impl RecordingCommitter {
    fn non_empty(&self) -> Vec<(String, serde_json::Value)> {
        let mut seen: Vec<_> = self
            .seen
            .lock()
            .iter()
            .filter(|(_, patch)| patch["metadata"]["labels"] != json!({}))
            .cloned()
            .collect();
        seen.sort_by(|a, b| a.0.cmp(&b.0));
        seen
    }

    fn empty_count(&self) -> usize {
        self.seen
            .lock()
            .iter()
            .filter(|(_, patch)| patch["metadata"]["labels"] == json!({}))
            .count()
    }
}

struct Harness {
    store: Arc<EventedStore<InMemoryStore>>,
    committer: Arc<RecordingCommitter>,
    engine: Arc<LabelSyncEngine>,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

fn config() -> LabelSyncConfig {
    LabelSyncConfig {
        controller: ControllerSettings {
            workers: 2,
            marker_label: MARKER.to_string(),
            resync_period_secs: 0,
        },
        queue: QueueSettings {
            base_delay_ms: 1,
            max_delay_ms: 50,
            ..Default::default()
        },
        ..Default::default()
    }
}

impl Harness {
    async fn seed(
        store: &EventedStore<InMemoryStore>,
        kind: ResourceKind,
        value: serde_json::Value,
    ) {
        store.create(kind, &value).await.expect("seed object");
    }

    async fn start(seed: impl FnOnce() -> (Vec<ApiExport>, Vec<ApiBinding>)) -> Harness {
        let broadcaster = EventBroadcaster::new_shared();
        let store = Arc::new(EventedStore::new(InMemoryStore::new(), broadcaster.clone()));

        let (exports, bindings) = seed();
        for export in exports {
            Self::seed(&store, ResourceKind::ApiExport, export.to_value().unwrap()).await;
        }
        for binding in bindings {
            Self::seed(&store, ResourceKind::ApiBinding, binding.to_value().unwrap()).await;
        }

        let dyn_store: DynStore = store.clone();
        let committer = Arc::new(RecordingCommitter {
            inner: MergePatchCommitter::new(dyn_store.clone()),
            seen: Mutex::new(Vec::new()),
        });
        let engine = Arc::new(LabelSyncEngine::with_committer(
            &config(),
            dyn_store,
            broadcaster,
            committer.clone(),
        ));

        let (shutdown, rx) = watch::channel(false);
        let handle = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run(rx).await })
        };
        eventually("caches synced", || engine.has_synced()).await;

        Harness {
            store,
            committer,
            engine,
            shutdown,
            handle,
        }
    }

    async fn binding(&self, token: &str) -> ApiBinding {
        let key = ResourceKey::decode(token).unwrap();
        self.store
            .get(ResourceKind::ApiBinding, &key)
            .await
            .unwrap()
            .expect("binding exists")
            .decode()
            .unwrap()
    }

    async fn has_marker(&self, token: &str) -> bool {
        self.binding(token).await.metadata.has_label(MARKER)
    }

    /// Poll the store until every binding in `tokens` has (or lacks) the marker.
    async fn wait_for_marker(&self, tokens: &[&str], present: bool) {
        let converged = async {
            loop {
                let mut done = true;
                for token in tokens {
                    done &= self.has_marker(token).await == present;
                }
                if done {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        timeout(Duration::from_secs(5), converged)
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for marker={present} on {tokens:?}"));
    }

    async fn label_export(&self, token: &str, value: serde_json::Value) {
        let key = ResourceKey::decode(token).unwrap();
        let body = serde_json::to_vec(&json!({"metadata": {"labels": {MARKER: value}}})).unwrap();
        self.store
            .patch(ResourceKind::ApiExport, &key, PatchType::Merge, &body)
            .await
            .unwrap();
    }

    /// Wait until the queue is empty and the caches stopped changing.
    async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(100)).await;
        eventually("queue drained", || self.engine.controller().queue().is_empty()).await;
    }

    async fn stop(self) {
        self.shutdown.send_replace(true);
        timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("engine stops")
            .expect("engine task");
    }
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

fn fan_out_fixture() -> (Vec<ApiExport>, Vec<ApiBinding>) {
    (
        vec![ApiExport::new("org-a", "p")],
        vec![
            ApiBinding::new("org-b", "c1").with_reference("org-a", "p"),
            ApiBinding::new("org-c", "c2").with_reference("org-a", "p"),
        ],
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn export_label_fans_out_to_bindings_in_other_clusters() -> anyhow::Result<()> {
    let h = Harness::start(fan_out_fixture).await;
    h.settle().await;
    assert!(h.committer.non_empty().is_empty());

    h.label_export("org-a|p", json!("")).await;
    h.wait_for_marker(&["org-b|c1", "org-c|c2"], true).await;
    h.settle().await;

    let expected = json!({"metadata": {"labels": {"sync": ""}}});
    assert_eq!(
        h.committer.non_empty(),
        vec![
            ("org-b|c1".to_string(), expected.clone()),
            ("org-c|c2".to_string(), expected),
        ]
    );
    // The writes come back as events and reconcile to empty patches.
    assert!(h.committer.empty_count() >= 2);
    // One write for the export, one per binding.
    assert_eq!(h.store.inner().patch_requests(), 3);

    h.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn removing_export_label_removes_it_from_bindings() -> anyhow::Result<()> {
    let h = Harness::start(|| {
        (
            vec![ApiExport::new("org-a", "p")],
            vec![
                ApiBinding::new("org-b", "c1")
                    .with_reference("org-a", "p")
                    .with_label(MARKER, "")
                    .with_label("team", "blue"),
            ],
        )
    })
    .await;

    // The export never had the marker, so the initial sync removes it.
    h.wait_for_marker(&["org-b|c1"], false).await;
    let binding = h.binding("org-b|c1").await;
    assert_eq!(binding.labels().get("team").map(String::as_str), Some("blue"));

    // Marker value on the export is not propagated, only its presence.
    h.label_export("org-a|p", json!("any-value")).await;
    h.wait_for_marker(&["org-b|c1"], true).await;
    let binding = h.binding("org-b|c1").await;
    assert_eq!(binding.labels().get(MARKER).map(String::as_str), Some(""));

    h.label_export("org-a|p", serde_json::Value::Null).await;
    h.wait_for_marker(&["org-b|c1"], false).await;

    h.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transient_write_failures_are_retried_until_converged() -> anyhow::Result<()> {
    let h = Harness::start(fan_out_fixture).await;
    h.settle().await;

    // The export is written with a full update so only binding patches fail.
    h.store.inner().fail_next_patches(2);
    let export = ApiExport::new("org-a", "p").with_label(MARKER, "");
    h.store
        .update(ResourceKind::ApiExport, &export.to_value()?)
        .await?;
    h.wait_for_marker(&["org-b|c1", "org-c|c2"], true).await;
    h.settle().await;

    // Two failed and two successful binding writes.
    assert_eq!(h.store.inner().patch_requests(), 4);

    h.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deleted_and_unresolved_bindings_are_left_alone() -> anyhow::Result<()> {
    let h = Harness::start(|| {
        (
            vec![ApiExport::new("org-a", "p").with_label(MARKER, "")],
            vec![
                ApiBinding::new("org-b", "dangling").with_reference("org-a", "missing"),
                ApiBinding::new("org-b", "unbound"),
            ],
        )
    })
    .await;
    h.settle().await;
    assert!(!h.has_marker("org-b|dangling").await);
    assert!(!h.has_marker("org-b|unbound").await);
    assert!(h.committer.seen.lock().is_empty());

    // A binding deleted right after creation never produces a write error.
    let doomed = ApiBinding::new("org-c", "doomed").with_reference("org-a", "p");
    h.store
        .create(ResourceKind::ApiBinding, &doomed.to_value()?)
        .await?;
    h.store
        .delete(ResourceKind::ApiBinding, &ResourceKey::decode("org-c|doomed")?)
        .await?;
    h.settle().await;
    assert!(!h.engine.binding_cache().contains(&ResourceKey::decode("org-c|doomed")?));

    // A binding created later against a labelled export picks up the marker.
    let late = ApiBinding::new("org-d", "late").with_reference("org-a", "p");
    h.store
        .create(ResourceKind::ApiBinding, &late.to_value()?)
        .await?;
    h.wait_for_marker(&["org-d|late"], true).await;

    h.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deleting_the_export_leaves_bindings_untouched() -> anyhow::Result<()> {
    let h = Harness::start(|| {
        (
            vec![ApiExport::new("org-a", "p").with_label(MARKER, "")],
            vec![ApiBinding::new("org-b", "c1").with_reference("org-a", "p")],
        )
    })
    .await;
    h.wait_for_marker(&["org-b|c1"], true).await;
    h.settle().await;

    let writes = h.store.inner().patch_requests();
    h.store
        .delete(ResourceKind::ApiExport, &ResourceKey::decode("org-a|p")?)
        .await?;
    h.settle().await;

    assert!(h.has_marker("org-b|c1").await);
    assert_eq!(h.store.inner().patch_requests(), writes);

    h.stop().await;
    Ok(())
}

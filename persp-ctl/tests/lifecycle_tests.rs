//! Lifecycle tests against an in-memory perspective API
//!
//! Tests the implementation of:
//! - create: id extracted from confirmation, assigned ref ids persisted
//! - read: server document replaces stored model, watermark kept
//! - update: stored ref ids, dynamic groups and other-group entries carried over
//! - delete/import/plan
//! - codec failures abort before the network call and before state writes

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use persp_common::intent::parse_intent;
use persp_common::{Error, Perspective, Result};
use persp_ctl::{Lifecycle, StateStore, Transport};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Records every call; documents keyed by id
#[derive(Default)]
struct FakeApi {
    next_id: Mutex<u64>,
    documents: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<String>>,
    confirmation: Mutex<Option<String>>,
}

impl FakeApi {
    fn with_document(id: &str, document: Value) -> Self {
        let api = FakeApi::default();
        api.documents
            .lock()
            .unwrap()
            .insert(id.to_string(), serde_json::to_vec(&document).unwrap());
        api
    }

    fn document(&self, id: &str) -> Value {
        let documents = self.documents.lock().unwrap();
        serde_json::from_slice(&documents[id]).unwrap()
    }

    fn set_document(&self, id: &str, document: Value) {
        self.documents
            .lock()
            .unwrap()
            .insert(id.to_string(), serde_json::to_vec(&document).unwrap());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeApi {
    async fn create(&self, body: Vec<u8>) -> Result<String> {
        self.calls.lock().unwrap().push("create".into());
        if let Some(text) = self.confirmation.lock().unwrap().clone() {
            return Ok(text);
        }
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let id = (4820 + *next).to_string();
        self.documents.lock().unwrap().insert(id.clone(), body);
        Ok(format!("Perspective {} created", id))
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(format!("fetch {}", id));
        self.documents
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::TransportFailure {
                status: 404,
                body: "Record not found".into(),
            })
    }

    async fn replace(&self, id: &str, body: Vec<u8>) -> Result<()> {
        self.calls.lock().unwrap().push(format!("replace {}", id));
        self.documents.lock().unwrap().insert(id.to_string(), body);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("remove {}", id));
        self.documents.lock().unwrap().remove(id);
        Ok(())
    }
}

const TEAM_INTENT: &str = r#"
name = "Cost by Team"
include_in_reports = true

[[group]]
name = "Team"

[[group.rule]]
asset = "AwsInstance"

[[group.rule.condition]]
tag_field = ["Team"]
val = "infra"

[[group]]
name = "Environment"
type = "categorize"
"#;

fn intent() -> Perspective {
    parse_intent(TEAM_INTENT).unwrap()
}

fn lifecycle(api: FakeApi) -> (Lifecycle<FakeApi>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = StateStore::new(temp_dir.path());
    (Lifecycle::new(api, store), temp_dir)
}

/// Simulate the server enriching the stored document after create
fn server_enriches(api: &FakeApi, id: &str) {
    let mut document = api.document(id);
    document["group"][1]["dynamic_group"] = json!([
        {"ref_id": "90", "name": "prod", "val": "prod"},
        {"ref_id": "91", "name": "dev", "val": "dev"}
    ]);
    document["other_group"] = json!([{
        "constant_type": "Dynamic Group Block",
        "ref_id": "92",
        "blk_id": document["group"][1]["ref_id"].clone(),
        "name": "Other",
        "is_other": "true"
    }]);
    api.set_document(id, document);
}

#[tokio::test]
async fn test_create_persists_id_and_ref_ids() {
    let (lifecycle, _dir) = lifecycle(FakeApi::default());

    let record = lifecycle.create("team", intent()).await.unwrap();

    assert_eq!(record.id, "4821");
    assert_eq!(record.perspective.groups[0].ref_id(), Some("1"));
    assert_eq!(record.perspective.groups[1].ref_id(), Some("2"));
    assert_eq!(lifecycle.store().load("team").unwrap(), record);
}

#[tokio::test]
async fn test_create_with_unrecognized_confirmation_fails() {
    let api = FakeApi::default();
    *api.confirmation.lock().unwrap() = Some("Created OK".into());
    let (lifecycle, _dir) = lifecycle(api);

    let err = lifecycle.create("team", intent()).await.unwrap_err();

    assert!(matches!(err, Error::UnparseableResponse { .. }));
    assert!(!lifecycle.store().exists("team").unwrap());
}

#[tokio::test]
async fn test_create_refuses_existing_label() {
    let (lifecycle, _dir) = lifecycle(FakeApi::default());
    lifecycle.create("team", intent()).await.unwrap();

    let err = lifecycle.create("team", intent()).await.unwrap_err();

    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_malformed_intent_never_reaches_the_network() {
    let (lifecycle, _dir) = lifecycle(FakeApi::default());
    let mut bad = intent();
    bad.groups[0] = persp_common::Group::filter("Team", vec![persp_common::Rule::new("")]);

    let err = lifecycle.create("team", bad).await.unwrap_err();

    assert!(matches!(err, Error::MalformedConfig { .. }));
    assert!(lifecycle.calls_made().is_empty());
}

#[tokio::test]
async fn test_update_after_read_keeps_computed_fields() {
    let (lifecycle, _dir) = lifecycle(FakeApi::default());
    let created = lifecycle.create("team", intent()).await.unwrap();
    server_enriches(lifecycle_api(&lifecycle), &created.id);

    let read = lifecycle.read("team").await.unwrap();
    assert_eq!(read.perspective.groups[1].kind.dynamic_groups().len(), 2);
    assert_eq!(read.perspective.ref_id_watermark, 92);

    // Add a group; existing ids must not move
    let mut changed = intent();
    changed
        .groups
        .push(persp_common::Group::categorize("Service"));
    let updated = lifecycle.update("team", changed).await.unwrap();

    let sent = lifecycle_api(&lifecycle).document(&created.id);
    assert_eq!(sent["group"][0]["ref_id"], "1");
    assert_eq!(sent["group"][1]["ref_id"], "2");
    assert_eq!(sent["group"][2]["ref_id"], "93");
    assert!(sent["group"][1].get("dynamic_group").is_none());
    assert_eq!(sent["other_group"][0]["blk_id"], "2");
    assert_eq!(updated.perspective.groups[1].kind.dynamic_groups().len(), 2);
}

#[tokio::test]
async fn test_removed_group_id_is_not_reused() {
    let (lifecycle, _dir) = lifecycle(FakeApi::default());
    let created = lifecycle.create("team", intent()).await.unwrap();

    // Drop "Environment" (id 2), then add a new group
    let mut without_env = intent();
    without_env.groups.truncate(1);
    lifecycle.update("team", without_env).await.unwrap();

    let mut with_new = intent();
    with_new.groups.truncate(1);
    with_new.groups.push(persp_common::Group::categorize("Region"));
    lifecycle.update("team", with_new).await.unwrap();

    let sent = lifecycle_api(&lifecycle).document(&created.id);
    assert_eq!(sent["group"][1]["name"], "Region");
    assert_eq!(sent["group"][1]["ref_id"], "3");
}

#[tokio::test]
async fn test_plan_reports_no_drift_after_write() {
    let (lifecycle, _dir) = lifecycle(FakeApi::default());
    let created = lifecycle.create("team", intent()).await.unwrap();
    server_enriches(lifecycle_api(&lifecycle), &created.id);

    assert!(lifecycle.plan("team", &intent()).await.unwrap().is_empty());

    let mut changed = intent();
    changed.include_in_reports = false;
    let changes = lifecycle.plan("team", &changed).await.unwrap();
    assert_eq!(changes, vec!["include_in_reports: true -> false".to_string()]);
}

#[tokio::test]
async fn test_undecodable_read_leaves_state_untouched() {
    let (lifecycle, _dir) = lifecycle(FakeApi::default());
    let created = lifecycle.create("team", intent()).await.unwrap();
    lifecycle_api(&lifecycle).set_document(&created.id, json!({"include_in_reports": true}));

    let err = lifecycle.read("team").await.unwrap_err();

    assert!(matches!(err, Error::UnparseableResponse { .. }));
    assert_eq!(lifecycle.store().load("team").unwrap(), created);
}

#[tokio::test]
async fn test_import_then_delete() {
    let api = FakeApi::with_document(
        "555",
        json!({"schema": {"name": "Imported", "include_in_reports": false,
            "group": [{"name": "All", "ref_id": "7", "type": "categorize"}]}}),
    );
    let (lifecycle, _dir) = lifecycle(api);

    let record = lifecycle.import("imported", "555").await.unwrap();
    assert_eq!(record.perspective.name, "Imported");
    assert_eq!(record.perspective.ref_id_watermark, 7);

    lifecycle.delete("imported").await.unwrap();

    assert!(!lifecycle.store().exists("imported").unwrap());
    assert_eq!(lifecycle.calls_made(), vec!["fetch 555", "remove 555"]);
}

#[tokio::test]
async fn test_import_rejects_non_numeric_id() {
    let (lifecycle, _dir) = lifecycle(FakeApi::default());

    let err = lifecycle.import("x", "12/../34").await.unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert!(lifecycle.calls_made().is_empty());
}

#[tokio::test]
async fn test_transport_failure_propagates_status() {
    let (lifecycle, _dir) = lifecycle(FakeApi::default());

    let err = lifecycle.import("gone", "404").await.unwrap_err();

    assert!(matches!(err, Error::TransportFailure { status: 404, .. }));
}

// Accessors into the fake behind the lifecycle

fn lifecycle_api(lifecycle: &Lifecycle<FakeApi>) -> &FakeApi {
    lifecycle.transport()
}

trait CallsMade {
    fn calls_made(&self) -> Vec<String>;
}

impl CallsMade for Lifecycle<FakeApi> {
    fn calls_made(&self) -> Vec<String> {
        self.transport().calls()
    }
}

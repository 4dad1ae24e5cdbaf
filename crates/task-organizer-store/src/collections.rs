//! Shared in-memory collection tree used by the local stores.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use task_organizer_core::{RecordPatch, Snapshot, TaskId, TaskRecord};
use tokio::sync::watch;
use tracing::warn;

struct CollectionNode {
    records: BTreeMap<TaskId, TaskRecord>,
    feed: watch::Sender<Option<Snapshot>>,
}

impl CollectionNode {
    fn new(records: BTreeMap<TaskId, TaskRecord>) -> Self {
        let (feed, _) = watch::channel(Some(Snapshot::from_entries(records.clone())));
        Self { records, feed }
    }

    fn publish(&self) {
        self.feed
            .send_replace(Some(Snapshot::from_entries(self.records.clone())));
    }
}

/// Named collections of task records, each with its own snapshot feed.
#[derive(Default)]
pub(crate) struct Collections {
    nodes: BTreeMap<String, CollectionNode>,
}

impl Collections {
    /// Rebuild collections from a database document.
    pub(crate) fn from_document(document: &Value) -> Self {
        let mut collections = Self::default();
        collections.replace_all(document);
        collections
    }

    fn node_mut(&mut self, name: &str) -> &mut CollectionNode {
        self.nodes
            .entry(name.to_owned())
            .or_insert_with(|| CollectionNode::new(BTreeMap::new()))
    }

    pub(crate) fn create(&mut self, name: &str, record: TaskRecord) -> TaskId {
        let node = self.node_mut(name);
        let mut key = TaskId::generate();
        while node.records.contains_key(&key) {
            key = TaskId::generate();
        }
        node.records.insert(key.clone(), record);
        node.publish();
        key
    }

    /// Merge a patch; a missing record is created from the patched fields.
    pub(crate) fn patch(&mut self, name: &str, key: &TaskId, patch: &RecordPatch) {
        if patch.is_empty() {
            return;
        }
        let node = self.node_mut(name);
        let record = node.records.entry(key.clone()).or_default();
        patch.apply_to(record);
        node.publish();
    }

    /// Remove a record. Returns whether it existed.
    pub(crate) fn delete(&mut self, name: &str, key: &TaskId) -> bool {
        let Some(node) = self.nodes.get_mut(name) else {
            return false;
        };
        let existed = node.records.remove(key).is_some();
        if existed {
            node.publish();
        }
        existed
    }

    pub(crate) fn receiver(&mut self, name: &str) -> watch::Receiver<Option<Snapshot>> {
        self.node_mut(name).feed.subscribe()
    }

    pub(crate) fn snapshot(&self, name: &str) -> Snapshot {
        self.nodes.get(name).map_or_else(Snapshot::absent, |node| {
            Snapshot::from_entries(node.records.clone())
        })
    }

    /// Replace every collection with the contents of `document`.
    ///
    /// Only collections whose records actually changed are republished.
    pub(crate) fn replace_all(&mut self, document: &Value) -> usize {
        let mut incoming: BTreeMap<String, BTreeMap<TaskId, TaskRecord>> = BTreeMap::new();
        if let Some(children) = document.as_object() {
            for (name, node) in children {
                let (snapshot, rejected) = Snapshot::from_json(node);
                if !rejected.is_empty() {
                    warn!(collection = %name, rejected = rejected.len(), "Skipping malformed records");
                }
                incoming.insert(name.clone(), snapshot.entries().cloned().unwrap_or_default());
            }
        }

        let mut changed = 0;
        for (name, node) in &mut self.nodes {
            let records = incoming.remove(name).unwrap_or_default();
            if node.records != records {
                node.records = records;
                node.publish();
                changed += 1;
            }
        }
        for (name, records) in incoming {
            changed += 1;
            self.nodes.insert(name, CollectionNode::new(records));
        }
        changed
    }

    /// Render all non-empty collections as a database document.
    pub(crate) fn to_document(&self) -> Result<Value, serde_json::Error> {
        let mut root = Map::new();
        for (name, node) in &self.nodes {
            if node.records.is_empty() {
                continue;
            }
            root.insert(name.clone(), serde_json::to_value(&node.records)?);
        }
        Ok(Value::Object(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mutations_republish_snapshots() {
        let mut collections = Collections::default();
        let receiver = collections.receiver("tasks");
        assert_eq!(*receiver.borrow(), Some(Snapshot::absent()));

        let key = collections.create("tasks", TaskRecord::new("Buy milk", 1));
        let current = receiver.borrow().clone().unwrap_or_default();
        assert_eq!(current.len(), 1);

        collections.patch("tasks", &key, &RecordPatch::completed(true));
        let tasks = receiver.borrow().clone().unwrap_or_default().into_tasks();
        assert!(tasks[0].completed);
        assert_eq!(tasks[0].text, "Buy milk");

        assert!(collections.delete("tasks", &key));
        assert_eq!(*receiver.borrow(), Some(Snapshot::absent()));
        assert!(!collections.delete("tasks", &key));
    }

    #[test]
    fn patching_missing_record_creates_partial_entry() {
        let mut collections = Collections::default();
        collections.patch("tasks", &TaskId::new("ghost"), &RecordPatch::text("hello"));
        let tasks = collections.snapshot("tasks").into_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].number, 0);
        assert!(!tasks[0].completed);
    }

    #[test]
    fn replace_all_only_counts_changed_collections() {
        let document = json!({
            "tasks": { "k1": { "text": "a", "completed": false, "number": 1 } },
            "archive": { "k9": { "text": "z", "completed": true, "number": 9 } }
        });
        let mut collections = Collections::from_document(&document);
        assert_eq!(collections.snapshot("tasks").len(), 1);

        assert_eq!(collections.replace_all(&document), 0);

        let updated = json!({
            "tasks": { "k1": { "text": "a", "completed": true, "number": 1 } },
            "archive": { "k9": { "text": "z", "completed": true, "number": 9 } }
        });
        assert_eq!(collections.replace_all(&updated), 1);
    }

    #[test]
    fn document_omits_empty_collections() {
        let mut collections = Collections::default();
        let key = collections.create("tasks", TaskRecord::new("a", 1));
        collections.receiver("empty");
        let document = collections
            .to_document()
            .unwrap_or_else(|err| panic!("document must serialize: {err}"));
        assert!(document.get("empty").is_none());
        assert_eq!(
            document["tasks"][key.as_str()],
            json!({ "text": "a", "completed": false, "number": 1 })
        );
    }
}

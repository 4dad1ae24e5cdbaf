//! Local mirror of a database node, updated from streamed `put`/`patch` events.

use serde_json::{Map, Value};

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// Replace the value at `path`; `null` removes it.
pub(crate) fn put(tree: &mut Value, path: &str, data: Value) {
    set_at(tree, &segments(path), data);
}

/// Replace each child of `data` under `path`, leaving siblings alone.
pub(crate) fn patch(tree: &mut Value, path: &str, data: Value) {
    let base = segments(path);
    let Value::Object(children) = data else {
        set_at(tree, &base, data);
        return;
    };
    for (key, value) in children {
        let mut child_path = base.clone();
        child_path.extend(segments(&key));
        set_at(tree, &child_path, value);
    }
}

fn set_at(node: &mut Value, path: &[&str], data: Value) {
    let Some((head, rest)) = path.split_first() else {
        *node = data;
        return;
    };
    if !node.is_object() {
        if data.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Some(children) = node.as_object_mut() else {
        return;
    };
    let child = children.entry((*head).to_owned()).or_insert(Value::Null);
    set_at(child, rest, data);
    if child.is_null() {
        children.remove(*head);
    }
    if children.is_empty() {
        *node = Value::Null;
    }
}

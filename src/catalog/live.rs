use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Records identified by a stable string key.
pub trait Keyed {
    fn key(&self) -> &str;
}

/// One pushed change to a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "record", rename_all = "lowercase")]
pub enum ChangeEvent<T> {
    Insert(T),
    Update(T),
    Delete(String),
}

impl<T: Keyed> ChangeEvent<T> {
    pub fn key(&self) -> &str {
        match self {
            ChangeEvent::Insert(r) | ChangeEvent::Update(r) => r.key(),
            ChangeEvent::Delete(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Insert(_) => "insert",
            ChangeEvent::Update(_) => "update",
            ChangeEvent::Delete(_) => "delete",
        }
    }
}

/// Apply `event` to `items` in place. Returns false when nothing changed.
///
/// New records go to the front (the list is newest first). An insert for a
/// known key replaces it, an update for an unknown key inserts, a delete
/// for an unknown key is a no-op.
pub fn apply_change<T: Keyed>(items: &mut Vec<T>, event: ChangeEvent<T>) -> bool {
    debug!(kind = event.kind(), key = event.key(), "applying change");
    match event {
        ChangeEvent::Insert(record) | ChangeEvent::Update(record) => {
            match items.iter().position(|r| r.key() == record.key()) {
                Some(pos) => items[pos] = record,
                None => items.insert(0, record),
            }
            true
        }
        ChangeEvent::Delete(id) => {
            let before = items.len();
            items.retain(|r| r.key() != id);
            items.len() != before
        }
    }
}

/// Changes that turn `local` into `remote`: inserts for new keys, updates
/// for keys whose record differs, deletes for keys gone from `remote`.
pub fn diff_snapshots<T>(local: &[T], remote: &[T]) -> Vec<ChangeEvent<T>>
where
    T: Keyed + PartialEq + Clone,
{
    let local_by_key: HashMap<&str, &T> = local.iter().map(|r| (r.key(), r)).collect();
    let remote_keys: std::collections::HashSet<&str> = remote.iter().map(|r| r.key()).collect();

    let mut changes = Vec::new();
    for r in remote {
        match local_by_key.get(r.key()) {
            None => changes.push(ChangeEvent::Insert(r.clone())),
            Some(l) if *l != r => changes.push(ChangeEvent::Update(r.clone())),
            Some(_) => {}
        }
    }
    for l in local {
        if !remote_keys.contains(l.key()) {
            changes.push(ChangeEvent::Delete(l.key().to_string()));
        }
    }
    changes
}

/// A snapshot that changes only through [`ChangeEvent`]s and counts its
/// revisions so derived views know when to recompute.
#[derive(Debug, Clone)]
pub struct LiveSnapshot<T> {
    items: Vec<T>,
    generation: u64,
}

impl<T: Keyed> LiveSnapshot<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, generation: 0 }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace everything, e.g. after a full refetch.
    pub fn replace(&mut self, items: Vec<T>) {
        self.items = items;
        self.generation += 1;
    }

    pub fn apply(&mut self, event: ChangeEvent<T>) -> bool {
        let changed = apply_change(&mut self.items, event);
        if changed {
            self.generation += 1;
        }
        changed
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Rec {
        id: String,
        v: i32,
    }

    impl Keyed for Rec {
        fn key(&self) -> &str {
            &self.id
        }
    }

    fn rec(id: &str, v: i32) -> Rec {
        Rec { id: id.to_string(), v }
    }

    #[test]
    fn insert_update_delete() {
        let mut snap = LiveSnapshot::new(vec![rec("a", 1)]);
        assert!(snap.apply(ChangeEvent::Insert(rec("b", 2))));
        assert_eq!(snap.items()[0], rec("b", 2));
        assert!(snap.apply(ChangeEvent::Update(rec("a", 9))));
        assert_eq!(snap.items()[1], rec("a", 9));
        assert!(snap.apply(ChangeEvent::Delete("b".into())));
        assert_eq!(snap.items(), &[rec("a", 9)]);
        assert_eq!(snap.generation(), 3);
    }

    #[test]
    fn unknown_delete_does_not_bump_generation() {
        let mut snap = LiveSnapshot::new(vec![rec("a", 1)]);
        assert!(!snap.apply(ChangeEvent::Delete("zzz".into())));
        assert_eq!(snap.generation(), 0);
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn update_of_unknown_key_inserts() {
        let mut items = vec![rec("a", 1)];
        assert!(apply_change(&mut items, ChangeEvent::Update(rec("c", 3))));
        assert_eq!(items, vec![rec("c", 3), rec("a", 1)]);
        assert!(apply_change(&mut items, ChangeEvent::Insert(rec("a", 5))));
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].v, 5);
    }

    #[test]
    fn diff_then_apply_reaches_remote() {
        let local = vec![rec("a", 1), rec("b", 2), rec("gone", 0)];
        let remote = vec![rec("new", 7), rec("a", 1), rec("b", 3)];
        let changes = diff_snapshots(&local, &remote);
        let kinds: Vec<(&str, &str)> = changes.iter().map(|c| (c.kind(), c.key())).collect();
        assert_eq!(
            kinds,
            vec![("insert", "new"), ("update", "b"), ("delete", "gone")]
        );

        let mut items = local.clone();
        for c in changes {
            apply_change(&mut items, c);
        }
        let mut got: Vec<_> = items.iter().map(|r| (r.id.clone(), r.v)).collect();
        got.sort();
        assert_eq!(
            got,
            vec![("a".to_string(), 1), ("b".to_string(), 3), ("new".to_string(), 7)]
        );
    }

    #[test]
    fn change_event_wire_shape() {
        let json = serde_json::to_value(ChangeEvent::<Rec>::Delete("x".into())).unwrap();
        assert_eq!(json, serde_json::json!({"type": "delete", "record": "x"}));
    }
}

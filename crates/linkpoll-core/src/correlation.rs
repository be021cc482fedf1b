// ── Correlation store ──
//
// Maps each in-flight sub-request to the device it was fanned out from.
// Entries are written on the driver task at dispatch and taken on whichever
// executor thread observes the completion.
//
// Invariant: `register` returns only after the entry is visible, and the
// dispatcher spawns the request only after `register` returns. A completion
// can therefore never observe a missing entry for its own context.

use std::fmt;

use dashmap::DashMap;
use uuid::Uuid;

use crate::model::CorrelationEntry;

/// Opaque identity of one dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestContext(Uuid);

impl RequestContext {
    /// A fresh, globally unique context.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Thread-safe map from `RequestContext` to `CorrelationEntry`.
#[derive(Debug, Default)]
pub struct CorrelationStore {
    entries: DashMap<RequestContext, CorrelationEntry>,
}

impl CorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `entry` under a freshly obtained context and return it.
    pub fn register(&self, entry: CorrelationEntry) -> RequestContext {
        let context = RequestContext::new();
        self.entries.insert(context, entry);
        context
    }

    /// Remove and return the entry for `context`.
    ///
    /// Exactly one caller gets `Some` for a given context.
    pub fn take(&self, context: RequestContext) -> Option<CorrelationEntry> {
        self.entries.remove(&context).map(|(_, entry)| entry)
    }

    pub fn get(&self, context: RequestContext) -> Option<CorrelationEntry> {
        self.entries.get(&context).map(|r| r.value().clone())
    }

    pub fn contains(&self, context: RequestContext) -> bool {
        self.entries.contains_key(&context)
    }

    /// Snapshot of the contexts currently in flight.
    pub fn contexts(&self) -> Vec<RequestContext> {
        self.entries.iter().map(|r| *r.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    fn entry(object_id: u32) -> CorrelationEntry {
        CorrelationEntry {
            endpoint: "dev1".into(),
            registration_id: json!("r1"),
            registration_date: json!("2024-01-01"),
            address: json!("1.2.3.4"),
            object_id: json!(object_id),
            object_instance_id: json!(0),
        }
    }

    #[test]
    fn register_then_take_exactly_once() {
        let store = CorrelationStore::new();
        let ctx = store.register(entry(3));

        assert!(store.contains(ctx));
        assert_eq!(store.get(ctx), Some(entry(3)));
        assert_eq!(store.take(ctx), Some(entry(3)));
        assert_eq!(store.take(ctx), None);
        assert!(store.is_empty());
    }

    #[test]
    fn contexts_are_distinct() {
        let store = CorrelationStore::new();
        let a = store.register(entry(3));
        let b = store.register(entry(3));

        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        let mut contexts = store.contexts();
        contexts.sort_by_key(ToString::to_string);
        let mut expected = vec![a, b];
        expected.sort_by_key(ToString::to_string);
        assert_eq!(contexts, expected);
    }

    #[test]
    fn concurrent_takes_consume_each_entry_once() {
        let store = Arc::new(CorrelationStore::new());
        let contexts: Vec<_> = (0..64).map(|i| store.register(entry(i))).collect();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let contexts = contexts.clone();
                std::thread::spawn(move || {
                    contexts
                        .into_iter()
                        .filter(|ctx| store.take(*ctx).is_some())
                        .count()
                })
            })
            .collect();

        let taken: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap_or_default())
            .sum();
        assert_eq!(taken, 64);
        assert!(store.is_empty());
    }
}

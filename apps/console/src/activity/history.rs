use std::collections::{HashMap, HashSet};

use crate::activity::row_key::{KeyAssigner, RowKey};
use crate::models::MirrorEvent;

pub const DEFAULT_MAX_ACTIVITIES: usize = 1_000;

/// 推送去重的时间窗口：无 id 时，字段相同且时间差小于该值视为同一事件。
const DEDUP_WINDOW_MS: i128 = 1_000;

#[derive(Clone, Debug, PartialEq)]
pub struct ActivityEntry {
    pub key: RowKey,
    pub event: MirrorEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Updated(RowKey),
    Inserted(RowKey),
}

impl PushOutcome {
    pub fn key(&self) -> &RowKey {
        match self {
            Self::Updated(key) | Self::Inserted(key) => key,
        }
    }
}

/// 活动历史：按时间倒序、长度受限、逻辑事件唯一。
///
/// 只能通过 [`ActivityHistory::apply_snapshot`]、[`ActivityHistory::apply_push`]
/// 与 [`ActivityHistory::clear`] 修改，每次修改都会递增 `revision`。
#[derive(Clone, Debug)]
pub struct ActivityHistory {
    entries: Vec<ActivityEntry>,
    capacity: usize,
    revision: u64,
    keys: KeyAssigner,
    evicted: Vec<RowKey>,
}

impl Default for ActivityHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_ACTIVITIES)
    }
}

impl PartialEq for ActivityHistory {
    fn eq(&self, other: &Self) -> bool {
        self.revision == other.revision && self.entries == other.entries
    }
}

impl ActivityHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
            revision: 0,
            keys: KeyAssigner::default(),
            evicted: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[ActivityEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn keys(&self) -> impl Iterator<Item = &RowKey> {
        self.entries.iter().map(|entry| &entry.key)
    }

    /// 最近一次修改因超出容量被挤出的行。
    pub fn last_evicted(&self) -> &[RowKey] {
        &self.evicted
    }

    pub fn get(&self, key: &RowKey) -> Option<&ActivityEntry> {
        self.entries.iter().find(|entry| &entry.key == key)
    }

    pub fn apply_snapshot(&mut self, events: Vec<MirrorEvent>) -> &Self {
        let carried: HashMap<String, RowKey> = self
            .entries
            .drain(..)
            .filter_map(|entry| entry.event.id.clone().map(|id| (id, entry.key)))
            .collect();

        let mut used = HashSet::with_capacity(events.len());
        let mut entries = Vec::with_capacity(events.len());

        for (position, event) in events.into_iter().enumerate() {
            let candidate = event
                .id
                .as_ref()
                .and_then(|id| carried.get(id).cloned())
                .filter(|key| !used.contains(key))
                .unwrap_or_else(|| self.keys.snapshot_key(&event, position));
            let key = self.keys.ensure_unique(candidate, &used);
            used.insert(key.clone());
            entries.push(ActivityEntry { key, event });
        }

        self.entries = entries;
        self.normalize();
        self
    }

    pub fn apply_push(&mut self, event: MirrorEvent) -> PushOutcome {
        let outcome = match self
            .entries
            .iter()
            .position(|existing| is_same_logical_event(&existing.event, &event))
        {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.event = event;
                PushOutcome::Updated(entry.key.clone())
            }
            None => {
                let key = self.keys.push_key(&event);
                self.entries.insert(0, ActivityEntry {
                    key: key.clone(),
                    event,
                });
                PushOutcome::Inserted(key)
            }
        };

        self.normalize();
        outcome
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.evicted.clear();
        self.revision += 1;
    }

    fn normalize(&mut self) {
        // 稳定排序：时间戳相同的事件保持到达顺序
        self.entries
            .sort_by(|left, right| right.event.timestamp.cmp(&left.event.timestamp));
        self.evicted = if self.entries.len() > self.capacity {
            self.entries
                .split_off(self.capacity)
                .into_iter()
                .map(|entry| entry.key)
                .collect()
        } else {
            Vec::new()
        };
        self.revision += 1;
    }
}

/// 推送事件的身份判定：双方都有 id 时比较 id；否则比较仓库、组织、消息以及时间差。
pub fn is_same_logical_event(existing: &MirrorEvent, incoming: &MirrorEvent) -> bool {
    if let (Some(left), Some(right)) = (existing.id.as_deref(), incoming.id.as_deref()) {
        if left == right {
            return true;
        }
    }

    existing.repository_id == incoming.repository_id
        && existing.organization_id == incoming.organization_id
        && existing.message == incoming.message
        && (existing.timestamp_ms() - incoming.timestamp_ms()).abs() < DEDUP_WINDOW_MS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepoStatus;
    use proptest::prelude::*;
    use time::macros::datetime;
    use time::{Duration, OffsetDateTime};

    const T0: OffsetDateTime = datetime!(2024-05-01 10:00:00 UTC);

    fn event(id: Option<&str>, offset_ms: i64, status: RepoStatus, message: &str) -> MirrorEvent {
        MirrorEvent {
            id: id.map(str::to_string),
            timestamp: T0 + Duration::milliseconds(offset_ms),
            status,
            message: message.to_string(),
            details: None,
            repository_id: Some("r".into()),
            repository_name: Some("octo/r".into()),
            organization_id: None,
            organization_name: None,
        }
    }

    fn assert_sorted_desc(history: &ActivityHistory) {
        for pair in history.entries().windows(2) {
            assert!(pair[0].event.timestamp >= pair[1].event.timestamp);
        }
    }

    #[test]
    fn status_update_keeps_original_row_key() {
        let mut history = ActivityHistory::default();
        let first = history.apply_push(event(Some("e1"), 0, RepoStatus::Mirroring, "m"));
        let mut update = event(Some("e1"), 2_000, RepoStatus::Mirrored, "m");
        update.repository_id = None;
        let second = history.apply_push(update);

        assert!(matches!(first, PushOutcome::Inserted(_)));
        assert_eq!(second, PushOutcome::Updated(first.key().clone()));
        assert_eq!(history.len(), 1);
        assert_eq!(history.entries()[0].event.status, RepoStatus::Mirrored);
        assert_eq!(&history.entries()[0].key, first.key());
    }

    #[test]
    fn field_match_within_window_merges_without_ids() {
        let mut history = ActivityHistory::default();
        history.apply_push(event(None, 0, RepoStatus::Mirroring, "syncing octo/r"));
        let outcome = history.apply_push(event(None, 999, RepoStatus::Mirrored, "syncing octo/r"));
        assert!(matches!(outcome, PushOutcome::Updated(_)));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn field_match_outside_window_inserts() {
        let mut history = ActivityHistory::default();
        history.apply_push(event(None, 0, RepoStatus::Mirroring, "m"));
        history.apply_push(event(None, 1_000, RepoStatus::Mirroring, "m"));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn different_ids_fall_through_to_field_heuristic() {
        let mut history = ActivityHistory::default();
        history.apply_push(event(Some("a"), 0, RepoStatus::Mirroring, "m"));
        let outcome = history.apply_push(event(Some("b"), 10, RepoStatus::Mirrored, "m"));
        assert!(matches!(outcome, PushOutcome::Updated(_)));
        assert_eq!(history.entries()[0].event.id.as_deref(), Some("b"));
    }

    #[test]
    fn same_push_twice_yields_one_entry() {
        let mut history = ActivityHistory::default();
        let evt = event(None, 0, RepoStatus::Failed, "boom");
        history.apply_push(evt.clone());
        history.apply_push(evt);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn cap_keeps_most_recent_events() {
        let mut history = ActivityHistory::with_capacity(1_000);
        for i in 0..1_001 {
            let id = format!("e{i}");
            history.apply_push(event(Some(&id), i * 10_000, RepoStatus::Mirrored, &id));
        }

        assert_eq!(history.len(), 1_000);
        assert_eq!(history.entries()[0].event.id.as_deref(), Some("e1000"));
        assert_eq!(history.entries()[999].event.id.as_deref(), Some("e1"));
        assert!(history.entries().iter().all(|e| e.event.id.as_deref() != Some("e0")));
        assert_sorted_desc(&history);
    }

    #[test]
    fn overflowing_push_reports_evicted_key() {
        let mut history = ActivityHistory::with_capacity(2);
        let oldest = history.apply_push(event(Some("a"), 0, RepoStatus::Mirrored, "a"));
        history.apply_push(event(Some("b"), 10_000, RepoStatus::Mirrored, "b"));
        assert!(history.last_evicted().is_empty());

        history.apply_push(event(Some("c"), 20_000, RepoStatus::Mirrored, "c"));
        assert_eq!(history.last_evicted(), &[oldest.key().clone()]);

        history.apply_push(event(Some("c"), 20_000, RepoStatus::Failed, "c"));
        assert!(history.last_evicted().is_empty());
    }

    #[test]
    fn late_push_lands_in_timestamp_order() {
        let mut history = ActivityHistory::default();
        history.apply_push(event(Some("new"), 50_000, RepoStatus::Mirrored, "a"));
        history.apply_push(event(Some("old"), 0, RepoStatus::Mirrored, "b"));
        assert_eq!(history.entries()[0].event.id.as_deref(), Some("new"));
        assert_eq!(history.entries()[1].event.id.as_deref(), Some("old"));
    }

    #[test]
    fn snapshot_replaces_and_sorts() {
        let mut history = ActivityHistory::default();
        history.apply_push(event(Some("stale"), 0, RepoStatus::Failed, "x"));
        history.apply_snapshot(vec![
            event(Some("a"), 1_000, RepoStatus::Mirrored, "a"),
            event(Some("b"), 5_000, RepoStatus::Mirrored, "b"),
            event(Some("c"), 3_000, RepoStatus::Mirrored, "c"),
        ]);

        let ids: Vec<_> = history
            .entries()
            .iter()
            .map(|e| e.event.id.clone().unwrap_or_default())
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn snapshot_is_deterministic_for_same_payload() {
        let payload = vec![
            event(None, 1_000, RepoStatus::Mirrored, "a"),
            event(None, 1_000, RepoStatus::Mirrored, "a"),
        ];
        let mut left = ActivityHistory::default();
        let mut right = ActivityHistory::default();
        left.apply_snapshot(payload.clone());
        right.apply_snapshot(payload);

        let left_keys: Vec<_> = left.keys().cloned().collect();
        let right_keys: Vec<_> = right.keys().cloned().collect();
        assert_eq!(left_keys, right_keys);
        assert_ne!(left_keys[0], left_keys[1]);
    }

    #[test]
    fn snapshot_carries_over_keys_for_known_ids() {
        let mut history = ActivityHistory::default();
        let pushed = history.apply_push(event(Some("e1"), 0, RepoStatus::Mirroring, "m"));

        history.apply_snapshot(vec![
            event(Some("e2"), 9_000, RepoStatus::Mirrored, "other"),
            event(Some("e1"), 0, RepoStatus::Mirrored, "m"),
        ]);

        let carried = history
            .entries()
            .iter()
            .find(|e| e.event.id.as_deref() == Some("e1"))
            .unwrap();
        assert_eq!(&carried.key, pushed.key());
    }

    #[test]
    fn snapshot_respects_capacity() {
        let mut history = ActivityHistory::with_capacity(3);
        history.apply_snapshot(
            (0..10)
                .map(|i| event(Some(&format!("e{i}")), i * 1_000, RepoStatus::Synced, "s"))
                .collect(),
        );
        assert_eq!(history.len(), 3);
        assert_eq!(history.entries()[0].event.id.as_deref(), Some("e9"));
    }

    #[test]
    fn every_mutation_bumps_revision() {
        let mut history = ActivityHistory::default();
        let r0 = history.revision();
        history.apply_push(event(Some("a"), 0, RepoStatus::Mirrored, "a"));
        let r1 = history.revision();
        history.apply_snapshot(Vec::new());
        let r2 = history.revision();
        history.clear();
        assert!(r0 < r1 && r1 < r2 && r2 < history.revision());
        assert!(history.is_empty());
    }

    #[derive(Clone, Debug)]
    enum Op {
        Push { id: Option<u8>, offset_ms: i64, message: u8 },
        Snapshot(Vec<(Option<u8>, i64)>),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (proptest::option::of(0u8..40), 0i64..20_000, 0u8..4)
                .prop_map(|(id, offset_ms, message)| Op::Push { id, offset_ms, message }),
            1 => proptest::collection::vec((proptest::option::of(0u8..40), 0i64..20_000), 0..30)
                .prop_map(Op::Snapshot),
        ]
    }

    proptest! {
        #[test]
        fn history_stays_bounded_sorted_and_unique(ops in proptest::collection::vec(op_strategy(), 1..120)) {
            let mut history = ActivityHistory::with_capacity(16);
            for op in ops {
                match op {
                    Op::Push { id, offset_ms, message } => {
                        let id = id.map(|n| format!("e{n}"));
                        history.apply_push(event(id.as_deref(), offset_ms, RepoStatus::Mirroring, &format!("m{message}")));
                    }
                    Op::Snapshot(items) => {
                        history.apply_snapshot(items.into_iter().map(|(id, offset_ms)| {
                            let id = id.map(|n| format!("e{n}"));
                            event(id.as_deref(), offset_ms, RepoStatus::Mirrored, "snap")
                        }).collect());
                    }
                }

                prop_assert!(history.len() <= 16);
                let keys: HashSet<_> = history.keys().cloned().collect();
                prop_assert_eq!(keys.len(), history.len());
                for pair in history.entries().windows(2) {
                    prop_assert!(pair[0].event.timestamp >= pair[1].event.timestamp);
                }
            }
        }

        #[test]
        fn repeated_push_is_idempotent(id in proptest::option::of(0u8..10), offset_ms in 0i64..5_000, repeats in 2usize..6) {
            let mut history = ActivityHistory::default();
            let id = id.map(|n| format!("e{n}"));
            let evt = event(id.as_deref(), offset_ms, RepoStatus::Syncing, "m");
            let first = history.apply_push(evt.clone());
            for _ in 1..repeats {
                let outcome = history.apply_push(evt.clone());
                prop_assert_eq!(outcome.key(), first.key());
            }
            prop_assert_eq!(history.len(), 1);
        }
    }
}

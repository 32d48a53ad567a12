use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use uuid::Uuid;

use crate::models::MirrorEvent;

const SNAPSHOT_FALLBACK_ID: &str = "activity";
const LIVE_FALLBACK_PREFIX: &str = "live";

/// 列表行的稳定标识，与服务端 id 无关。事件原地更新时保持不变。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey(Rc<str>);

impl RowKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 可直接用作 DOM id 的形式。
    pub fn dom_id(&self) -> String {
        let sanitized: String = self
            .0
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' { ch } else { '_' })
            .collect();
        format!("activity-row-{sanitized}")
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowKey {
    fn from(value: &str) -> Self {
        Self(Rc::from(value))
    }
}

impl From<String> for RowKey {
    fn from(value: String) -> Self {
        Self(Rc::from(value))
    }
}

#[derive(Debug, Default, Clone)]
pub struct KeyAssigner {
    next_sequence: u64,
}

impl KeyAssigner {
    /// 快照事件的 key 只取决于 id、时间戳和位置，同一快照重复拉取得到相同的 key。
    pub fn snapshot_key(&self, event: &MirrorEvent, position: usize) -> RowKey {
        let id = event.id.as_deref().unwrap_or(SNAPSHOT_FALLBACK_ID);
        RowKey::from(format!("{id}-{}-s{position}", event.timestamp_ms()))
    }

    pub fn push_key(&mut self, event: &MirrorEvent) -> RowKey {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let id = match event.id.as_deref() {
            Some(id) => id.to_string(),
            None => format!("{LIVE_FALLBACK_PREFIX}-{}", Uuid::new_v4().simple()),
        };
        RowKey::from(format!("{id}-{}-p{sequence}", event.timestamp_ms()))
    }

    /// 在 `used` 中已存在时追加推送序号，直到唯一为止。
    pub fn ensure_unique(&mut self, candidate: RowKey, used: &HashSet<RowKey>) -> RowKey {
        let mut key = candidate;
        while used.contains(&key) {
            let sequence = self.next_sequence;
            self.next_sequence += 1;
            key = RowKey::from(format!("{key}~{sequence}"));
        }
        key
    }
}

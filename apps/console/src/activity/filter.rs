use std::collections::BTreeSet;
use std::rc::Rc;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::{Deserialize, Serialize};

use crate::activity::history::{ActivityEntry, ActivityHistory};
use crate::models::{MirrorEvent, RepoStatus};

/// 每个查询字符需要达到的最低匹配分，低于该值的结果视为噪声。
const MIN_SCORE_PER_CHAR: i64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Repository,
    Organization,
}

impl ActivityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Repository => "repository",
            Self::Organization => "organization",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "repository" => Some(Self::Repository),
            "organization" => Some(Self::Organization),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Repository => "仓库",
            Self::Organization => "组织",
        }
    }

    fn matches(self, event: &MirrorEvent) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
        match self {
            Self::Repository => present(&event.repository_id),
            Self::Organization => present(&event.organization_id),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterParams {
    #[serde(skip)]
    pub search_term: String,
    #[serde(default)]
    pub status: Option<RepoStatus>,
    #[serde(default)]
    pub kind: Option<ActivityKind>,
    #[serde(default)]
    pub name: Option<String>,
}

impl FilterParams {
    pub fn is_empty(&self) -> bool {
        self.search_term.trim().is_empty()
            && self.status.is_none()
            && self.kind.is_none()
            && self.name.is_none()
    }

    /// 切换类型时，已选名称可能不再属于该类型，一并清空。
    pub fn set_kind(&mut self, kind: Option<ActivityKind>) {
        if self.kind != kind {
            self.kind = kind;
            self.name = None;
        }
    }

    fn light_matches(&self, event: &MirrorEvent) -> bool {
        if let Some(status) = self.status {
            if event.status != status {
                return false;
            }
        }

        if let Some(kind) = self.kind {
            if !kind.matches(event) {
                return false;
            }
        }

        if let Some(name) = self.name.as_deref() {
            let repo_hit = event.repository_name.as_deref() == Some(name);
            let org_hit = event.organization_name.as_deref() == Some(name);
            if !repo_hit && !org_hit {
                return false;
            }
        }

        true
    }
}

/// 轻量筛选：状态、类型、名称。导出使用该结果，不受模糊搜索排序影响。
pub fn light_filter<'a>(history: &'a ActivityHistory, params: &FilterParams) -> Vec<&'a ActivityEntry> {
    history
        .entries()
        .iter()
        .filter(|entry| params.light_matches(&entry.event))
        .collect()
}

/// 完整筛选：轻量筛选后再做模糊搜索，结果按相关度排序。
pub fn filter<'a>(history: &'a ActivityHistory, params: &FilterParams) -> Vec<&'a ActivityEntry> {
    let light = light_filter(history, params);
    let indices = search_rank(&light, &params.search_term);
    indices.into_iter().map(|index| light[index]).collect()
}

fn search_rank(entries: &[&ActivityEntry], search_term: &str) -> Vec<usize> {
    let needle = search_term.trim();
    if needle.is_empty() {
        return (0..entries.len()).collect();
    }

    let matcher = SkimMatcherV2::default().ignore_case();
    let threshold = needle.chars().filter(|ch| !ch.is_whitespace()).count() as i64 * MIN_SCORE_PER_CHAR;

    let mut scored: Vec<(usize, i64)> = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            searchable_fields(&entry.event)
                .filter_map(|field| matcher.fuzzy_match(field, needle))
                .max()
                .filter(|score| *score >= threshold)
                .map(|score| (index, score))
        })
        .collect();

    // 稳定排序，同分时保留时间倒序
    scored.sort_by(|left, right| right.1.cmp(&left.1));
    scored.into_iter().map(|(index, _)| index).collect()
}

fn searchable_fields(event: &MirrorEvent) -> impl Iterator<Item = &str> {
    [
        Some(event.message.as_str()),
        event.details.as_deref(),
        event.organization_name.as_deref(),
        event.repository_name.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|field| !field.is_empty())
}

/// 名称下拉框的候选项：按类型收集去重、排序后的仓库或组织名称。
pub fn name_options(history: &ActivityHistory, kind: Option<ActivityKind>) -> Vec<String> {
    let mut names = BTreeSet::new();
    for entry in history.entries() {
        let event = &entry.event;
        let include_repo = kind != Some(ActivityKind::Organization);
        let include_org = kind != Some(ActivityKind::Repository);

        if include_repo {
            if let Some(name) = event.repository_name.as_deref().filter(|n| !n.is_empty()) {
                names.insert(name.to_string());
            }
        }
        if include_org {
            if let Some(name) = event.organization_name.as_deref().filter(|n| !n.is_empty()) {
                names.insert(name.to_string());
            }
        }
    }
    names.into_iter().collect()
}

/// 筛选结果，保存的是 `history.entries()` 中的下标。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterResult {
    pub revision: u64,
    /// 渲染用：经过模糊搜索并按相关度排序。
    pub visible: Vec<usize>,
    /// 导出用：仅轻量筛选，保持时间顺序。
    pub light: Vec<usize>,
}

/// 以 `(history.revision, params)` 为键的单项缓存。
#[derive(Debug, Default)]
pub struct FilterCache {
    key: Option<(u64, FilterParams)>,
    result: Rc<FilterResult>,
    misses: u64,
}

impl FilterCache {
    pub fn get(&mut self, history: &ActivityHistory, params: &FilterParams) -> Rc<FilterResult> {
        let hit = matches!(
            &self.key,
            Some((revision, cached)) if *revision == history.revision() && cached == params
        );
        if !hit {
            self.misses += 1;
            self.result = Rc::new(compute(history, params));
            self.key = Some((history.revision(), params.clone()));
        }
        Rc::clone(&self.result)
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

fn compute(history: &ActivityHistory, params: &FilterParams) -> FilterResult {
    let light: Vec<usize> = history
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, entry)| params.light_matches(&entry.event))
        .map(|(index, _)| index)
        .collect();

    let light_entries: Vec<&ActivityEntry> =
        light.iter().map(|&index| &history.entries()[index]).collect();
    let visible = search_rank(&light_entries, &params.search_term)
        .into_iter()
        .map(|position| light[position])
        .collect();

    FilterResult {
        revision: history.revision(),
        visible,
        light,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use time::Duration;

    fn event(id: &str, offset_s: i64, status: RepoStatus) -> MirrorEvent {
        MirrorEvent {
            id: Some(id.to_string()),
            timestamp: datetime!(2024-05-01 10:00:00 UTC) + Duration::seconds(offset_s),
            status,
            message: format!("{} {id}", status.as_str()),
            details: None,
            repository_id: None,
            repository_name: None,
            organization_id: None,
            organization_name: None,
        }
    }

    fn repo_event(id: &str, offset_s: i64, name: &str, message: &str) -> MirrorEvent {
        let mut evt = event(id, offset_s, RepoStatus::Mirrored);
        evt.repository_id = Some(format!("repo-{id}"));
        evt.repository_name = Some(name.to_string());
        evt.message = message.to_string();
        evt
    }

    fn org_event(id: &str, offset_s: i64, name: &str) -> MirrorEvent {
        let mut evt = event(id, offset_s, RepoStatus::Mirrored);
        evt.organization_id = Some(format!("org-{id}"));
        evt.organization_name = Some(name.to_string());
        evt
    }

    fn history_of(events: Vec<MirrorEvent>) -> ActivityHistory {
        let mut history = ActivityHistory::default();
        history.apply_snapshot(events);
        history
    }

    fn ids(entries: &[&ActivityEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|entry| entry.event.id.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn status_filter_keeps_relative_order() {
        let events = (0..10)
            .map(|i| {
                let status = if i % 2 == 0 { RepoStatus::Failed } else { RepoStatus::Mirrored };
                event(&format!("e{i}"), i, status)
            })
            .collect();
        let history = history_of(events);
        let params = FilterParams {
            status: Some(RepoStatus::Failed),
            ..FilterParams::default()
        };

        let result = filter(&history, &params);
        assert_eq!(ids(&result), vec!["e8", "e6", "e4", "e2", "e0"]);
        assert!(result.iter().all(|e| e.event.status == RepoStatus::Failed));
    }

    #[test]
    fn kind_filter_requires_non_empty_ids() {
        let mut blank = repo_event("blank", 0, "octo/blank", "m");
        blank.repository_id = Some(String::new());
        let history = history_of(vec![
            repo_event("r1", 1, "octo/one", "m"),
            org_event("o1", 2, "octo"),
            blank,
        ]);

        let mut params = FilterParams::default();
        params.set_kind(Some(ActivityKind::Repository));
        assert_eq!(ids(&filter(&history, &params)), vec!["r1"]);

        params.set_kind(Some(ActivityKind::Organization));
        assert_eq!(ids(&filter(&history, &params)), vec!["o1"]);
    }

    #[test]
    fn name_filter_matches_repo_or_org_name() {
        let history = history_of(vec![
            repo_event("r1", 1, "octo/one", "m"),
            repo_event("r2", 2, "octo/two", "m"),
            org_event("o1", 3, "octo/one"),
        ]);
        let params = FilterParams {
            name: Some("octo/one".into()),
            ..FilterParams::default()
        };
        assert_eq!(ids(&filter(&history, &params)), vec!["o1", "r1"]);
    }

    #[test]
    fn search_ranks_by_relevance_and_drops_misses() {
        let history = history_of(vec![
            repo_event("a", 3, "octo/website", "Mirrored repository octo/website"),
            repo_event("b", 2, "octo/api", "Sync failed for octo/api"),
            repo_event("c", 1, "octo/api-docs", "Mirrored repository octo/api-docs"),
        ]);
        let params = FilterParams {
            search_term: "api".into(),
            ..FilterParams::default()
        };

        let result = ids(&filter(&history, &params));
        assert!(!result.contains(&"a".to_string()));
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn search_applies_after_light_filter() {
        let mut failed = repo_event("f", 2, "octo/api", "Sync failed for octo/api");
        failed.status = RepoStatus::Failed;
        let history = history_of(vec![failed, repo_event("ok", 1, "octo/api", "Mirrored octo/api")]);

        let params = FilterParams {
            search_term: "octo/api".into(),
            status: Some(RepoStatus::Failed),
            ..FilterParams::default()
        };
        assert_eq!(ids(&filter(&history, &params)), vec!["f"]);
        assert_eq!(ids(&light_filter(&history, &params)), vec!["f"]);
    }

    #[test]
    fn search_covers_details_field() {
        let mut evt = repo_event("d", 1, "octo/x", "Mirror failed");
        evt.details = Some("fatal: authentication required".into());
        let history = history_of(vec![evt, repo_event("n", 0, "octo/y", "Mirrored")]);
        let params = FilterParams {
            search_term: "authentication".into(),
            ..FilterParams::default()
        };
        assert_eq!(ids(&filter(&history, &params)), vec!["d"]);
    }

    #[test]
    fn filter_is_deterministic() {
        let history = history_of(vec![
            repo_event("a", 3, "octo/a", "Mirrored octo/a"),
            repo_event("b", 2, "octo/b", "Mirrored octo/b"),
        ]);
        let params = FilterParams {
            search_term: "mirrored".into(),
            ..FilterParams::default()
        };
        assert_eq!(ids(&filter(&history, &params)), ids(&filter(&history, &params)));
    }

    #[test]
    fn cache_recomputes_only_on_revision_or_params_change() {
        let mut history = history_of(vec![event("a", 0, RepoStatus::Failed)]);
        let mut cache = FilterCache::default();
        let params = FilterParams::default();

        let first = cache.get(&history, &params);
        let second = cache.get(&history, &params);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.misses(), 1);

        let failed_only = FilterParams {
            status: Some(RepoStatus::Failed),
            ..FilterParams::default()
        };
        cache.get(&history, &failed_only);
        assert_eq!(cache.misses(), 2);

        history.apply_push(event("b", 5, RepoStatus::Failed));
        let refreshed = cache.get(&history, &failed_only);
        assert_eq!(cache.misses(), 3);
        assert_eq!(refreshed.visible, vec![0, 1]);
        assert_eq!(refreshed.light, vec![0, 1]);
    }

    #[test]
    fn cached_result_matches_direct_filter() {
        let history = history_of(vec![
            repo_event("a", 3, "octo/api", "Mirrored octo/api"),
            repo_event("b", 2, "octo/web", "Mirrored octo/web"),
            org_event("o", 1, "octo"),
        ]);
        let params = FilterParams {
            search_term: "web".into(),
            kind: Some(ActivityKind::Repository),
            ..FilterParams::default()
        };
        let mut cache = FilterCache::default();
        let result = cache.get(&history, &params);

        let via_cache: Vec<_> = result
            .visible
            .iter()
            .map(|&i| history.entries()[i].event.id.clone().unwrap_or_default())
            .collect();
        assert_eq!(via_cache, ids(&filter(&history, &params)));
        assert_eq!(result.light, vec![0, 1]);
    }

    #[test]
    fn name_options_follow_kind() {
        let history = history_of(vec![
            repo_event("r1", 3, "octo/b", "m"),
            repo_event("r2", 2, "octo/a", "m"),
            repo_event("r3", 1, "octo/a", "m"),
            org_event("o1", 0, "octo"),
        ]);
        assert_eq!(
            name_options(&history, Some(ActivityKind::Repository)),
            vec!["octo/a", "octo/b"]
        );
        assert_eq!(name_options(&history, Some(ActivityKind::Organization)), vec!["octo"]);
        assert_eq!(name_options(&history, None).len(), 3);
    }

    #[test]
    fn changing_kind_resets_name() {
        let mut params = FilterParams {
            name: Some("octo".into()),
            ..FilterParams::default()
        };
        params.set_kind(Some(ActivityKind::Repository));
        assert!(params.name.is_none());
    }

    #[test]
    fn persisted_params_skip_search_term() {
        let params = FilterParams {
            search_term: "transient".into(),
            status: Some(RepoStatus::Failed),
            kind: None,
            name: None,
        };
        let json = serde_json::to_string(&params).unwrap();
        assert!(!json.contains("transient"));
        let restored: FilterParams = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.status, Some(RepoStatus::Failed));
        assert!(restored.search_term.is_empty());
    }
}

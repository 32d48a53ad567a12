use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RepoStatus {
    Queued,
    Pending,
    Imported,
    Mirroring,
    Mirrored,
    Syncing,
    Synced,
    Failed,
    Skipped,
    Deleting,
    Deleted,
    Archived,
    #[serde(other)]
    Unknown,
}

impl RepoStatus {
    pub const FILTERABLE: [RepoStatus; 12] = [
        RepoStatus::Queued,
        RepoStatus::Pending,
        RepoStatus::Imported,
        RepoStatus::Mirroring,
        RepoStatus::Mirrored,
        RepoStatus::Syncing,
        RepoStatus::Synced,
        RepoStatus::Failed,
        RepoStatus::Skipped,
        RepoStatus::Deleting,
        RepoStatus::Deleted,
        RepoStatus::Archived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Pending => "pending",
            Self::Imported => "imported",
            Self::Mirroring => "mirroring",
            Self::Mirrored => "mirrored",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
            Self::Archived => "archived",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::FILTERABLE
            .iter()
            .copied()
            .find(|status| status.as_str() == value.trim())
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Queued => "排队中",
            Self::Pending => "等待中",
            Self::Imported => "已导入",
            Self::Mirroring => "镜像中",
            Self::Mirrored => "已镜像",
            Self::Syncing => "同步中",
            Self::Synced => "已同步",
            Self::Failed => "失败",
            Self::Skipped => "已跳过",
            Self::Deleting => "删除中",
            Self::Deleted => "已删除",
            Self::Archived => "已归档",
            Self::Unknown => "未知",
        }
    }

    pub fn badge_class(self) -> &'static str {
        match self {
            Self::Mirrored | Self::Synced | Self::Imported => "bg-emerald-100 text-emerald-800",
            Self::Mirroring | Self::Syncing | Self::Deleting => "bg-sky-100 text-sky-800",
            Self::Failed => "bg-red-100 text-red-800",
            Self::Queued | Self::Pending => "bg-amber-100 text-amber-800",
            Self::Skipped | Self::Deleted | Self::Archived | Self::Unknown => {
                "bg-slate-100 text-slate-700"
            }
        }
    }
}

#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MirrorEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub status: RepoStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub repository_id: Option<String>,
    #[serde(default)]
    pub repository_name: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub organization_name: Option<String>,
}

impl MirrorEvent {
    pub fn timestamp_ms(&self) -> i128 {
        self.timestamp.unix_timestamp_nanos() / 1_000_000
    }

    pub fn has_details(&self) -> bool {
        self.details
            .as_deref()
            .map(|details| !details.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn subject_label(&self) -> Option<&str> {
        self.repository_name
            .as_deref()
            .or(self.organization_name.as_deref())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitiesResponse {
    pub success: bool,
    #[serde(default)]
    pub activities: Vec<MirrorEvent>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupRequest<'a> {
    pub user_id: &'a str,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResult {
    #[serde(default)]
    pub mirror_jobs_deleted: u64,
    #[serde(default)]
    pub events_deleted: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum CleanupResponse {
    Completed {
        success: bool,
        result: CleanupResult,
    },
    Failed {
        error: String,
    },
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubConfigView {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiteaConfigView {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// 只读取判断“是否已完成镜像配置”所需的字段。
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorConfigView {
    #[serde(default)]
    pub github_config: Option<GithubConfigView>,
    #[serde(default)]
    pub gitea_config: Option<GiteaConfigView>,
}

impl MirrorConfigView {
    pub fn is_fully_configured(&self) -> bool {
        let present = |value: Option<&String>| value.map(|v| !v.trim().is_empty()).unwrap_or(false);

        let github_ready = self
            .github_config
            .as_ref()
            .map(|github| present(github.token.as_ref()))
            .unwrap_or(false);
        let gitea_ready = self
            .gitea_config
            .as_ref()
            .map(|gitea| present(gitea.url.as_ref()) && present(gitea.token.as_ref()))
            .unwrap_or(false);

        github_ready && gitea_ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mirror_event_parses_camel_case_payload() {
        let event: MirrorEvent = serde_json::from_value(json!({
            "id": "evt-1",
            "timestamp": "2024-05-01T10:00:00Z",
            "status": "mirrored",
            "message": "Successfully mirrored repository",
            "repositoryId": "repo-1",
            "repositoryName": "octo/hello",
        }))
        .unwrap();

        assert_eq!(event.id.as_deref(), Some("evt-1"));
        assert_eq!(event.status, RepoStatus::Mirrored);
        assert_eq!(event.repository_name.as_deref(), Some("octo/hello"));
        assert!(event.organization_id.is_none());
        assert!(!event.has_details());
    }

    #[test]
    fn unrecognised_status_is_kept_as_unknown() {
        let event: MirrorEvent = serde_json::from_value(json!({
            "timestamp": "2024-05-01T10:00:00Z",
            "status": "exploding",
            "message": "?",
        }))
        .unwrap();
        assert_eq!(event.status, RepoStatus::Unknown);
        assert!(event.id.is_none());
    }

    #[test]
    fn cleanup_response_distinguishes_error_body() {
        let ok: CleanupResponse = serde_json::from_value(json!({
            "success": true,
            "result": { "mirrorJobsDeleted": 3, "eventsDeleted": 7 }
        }))
        .unwrap();
        assert!(matches!(
            ok,
            CleanupResponse::Completed { success: true, result } if result.events_deleted == 7
        ));

        let failed: CleanupResponse =
            serde_json::from_value(json!({ "error": "database locked" })).unwrap();
        assert!(matches!(failed, CleanupResponse::Failed { error } if error == "database locked"));
    }

    #[test]
    fn config_view_requires_both_sides() {
        let partial: MirrorConfigView = serde_json::from_value(json!({
            "githubConfig": { "token": "ghp" },
            "giteaConfig": { "url": "https://gitea.local" }
        }))
        .unwrap();
        assert!(!partial.is_fully_configured());

        let full: MirrorConfigView = serde_json::from_value(json!({
            "githubConfig": { "token": "ghp" },
            "giteaConfig": { "url": "https://gitea.local", "token": "tok" }
        }))
        .unwrap();
        assert!(full.is_fully_configured());
    }

    #[test]
    fn status_parse_round_trips_filterable_values() {
        assert_eq!(RepoStatus::parse("failed"), Some(RepoStatus::Failed));
        assert_eq!(RepoStatus::parse("unknown"), None);
        assert_eq!(RepoStatus::parse(""), None);
    }
}

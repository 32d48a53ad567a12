use time::{Duration, OffsetDateTime};

use crate::models::{CleanupResult, MirrorEvent, RepoStatus};

const SAMPLE_REPOS: [(&str, &str); 4] = [
    ("repo-101", "octo-org/api-gateway"),
    ("repo-102", "octo-org/web-console"),
    ("repo-103", "octo-org/infra"),
    ("repo-104", "octo-org/docs"),
];

/// 返回演示用的活动快照，便于在未接入后端时预览 UI。
pub fn sample_activity_snapshot() -> Vec<MirrorEvent> {
    let now = OffsetDateTime::now_utc();
    let mut events = Vec::new();

    for (index, (repo_id, repo_name)) in SAMPLE_REPOS.iter().enumerate() {
        let offset = Duration::minutes(index as i64 * 7);
        events.push(MirrorEvent {
            id: Some(format!("evt-{repo_id}-mirrored")),
            timestamp: now - offset,
            status: RepoStatus::Mirrored,
            message: format!("{repo_name} 镜像完成"),
            details: None,
            repository_id: Some(repo_id.to_string()),
            repository_name: Some(repo_name.to_string()),
            organization_id: Some("org-1".into()),
            organization_name: Some("octo-org".into()),
        });
    }

    events.push(MirrorEvent {
        id: Some("evt-repo-103-failed".into()),
        timestamp: now - Duration::minutes(40),
        status: RepoStatus::Failed,
        message: "octo-org/infra 同步失败".into(),
        details: Some(
            "fatal: unable to access 'https://gitea.local/octo-org/infra.git/': \
             The requested URL returned error: 403"
                .into(),
        ),
        repository_id: Some("repo-103".into()),
        repository_name: Some("octo-org/infra".into()),
        organization_id: Some("org-1".into()),
        organization_name: Some("octo-org".into()),
    });

    events.push(MirrorEvent {
        id: Some("evt-org-1-synced".into()),
        timestamp: now - Duration::hours(2),
        status: RepoStatus::Synced,
        message: "组织 octo-org 同步完成".into(),
        details: Some("共 4 个仓库".into()),
        repository_id: None,
        repository_name: None,
        organization_id: Some("org-1".into()),
        organization_name: Some("octo-org".into()),
    });

    events
}

/// 第 `seq` 条演示推送：偶数条新建镜像任务，奇数条更新上一条任务的状态。
pub fn sample_live_event(seq: u64) -> MirrorEvent {
    let (repo_id, repo_name) = SAMPLE_REPOS[(seq / 2) as usize % SAMPLE_REPOS.len()];
    let started = seq % 2 == 0;

    MirrorEvent {
        id: Some(format!("live-{}", seq / 2)),
        timestamp: OffsetDateTime::now_utc(),
        status: if started {
            RepoStatus::Mirroring
        } else {
            RepoStatus::Mirrored
        },
        message: format!("{repo_name} 正在镜像"),
        details: (!started).then(|| format!("{repo_name} 已推送到 Gitea")),
        repository_id: Some(repo_id.to_string()),
        repository_name: Some(repo_name.to_string()),
        organization_id: Some("org-1".into()),
        organization_name: Some("octo-org".into()),
    }
}

pub fn sample_cleanup_result(history_len: usize) -> CleanupResult {
    CleanupResult {
        mirror_jobs_deleted: history_len as u64 / 2,
        events_deleted: history_len as u64,
    }
}

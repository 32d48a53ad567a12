use std::cell::RefCell;
use std::rc::Rc;

use dioxus::prelude::*;
use time::OffsetDateTime;

use crate::activity::export::{export, format_timestamp};
use crate::activity::filter::{light_filter, name_options};
use crate::activity::window::compute_window;
use crate::activity::{
    ActivityKind, ExportError, ExportFormat, FilterCache, FilterParams, RowKey, RowState,
    ViewLifecycle,
};
use crate::hooks::{
    activity::use_activity_loader, cleanup::use_cleanup, live::use_live_stream,
    refresh::use_live_refresh,
};
use crate::models::{MirrorEvent, RepoStatus};
use crate::services::download;
use crate::services::measure::{read_viewport, DomMeasurer};
use crate::state::{use_app_actions, use_app_state, AppActions, AppSignal, FetchOrigin};
use crate::ui::cleanup::{CleanupButton, CleanupDialog};
use crate::APP_CONFIG;

const LIST_CONTAINER_ID: &str = "activity-list";
const DEFAULT_OVERSCAN: usize = 5;
const TOOLBAR_BUTTON_CLASS: &str = "rounded border border-slate-300 bg-white px-3 py-1 text-xs text-slate-700 hover:bg-slate-100 disabled:cursor-not-allowed disabled:opacity-50";
const SELECT_CLASS: &str =
    "rounded border border-slate-300 bg-white px-2 py-1 text-xs text-slate-700 disabled:opacity-50";

struct RowView {
    key: RowKey,
    start: f64,
    state: RowState,
    event: MirrorEvent,
}

/// 实时活动页：快照 + 事件流合并后的虚拟列表，附带筛选、导出与清理入口。
#[component]
pub fn ActivityLog() -> Element {
    let actions = use_app_actions();
    let state = use_app_state();

    let lifecycle = use_hook(ViewLifecycle::new);
    use_drop({
        let lifecycle = lifecycle.clone();
        move || {
            lifecycle.cancel();
            actions.reset_activity();
        }
    });

    let refresh = use_activity_loader(lifecycle.clone());
    use_live_stream(lifecycle.clone());
    use_live_refresh(refresh);
    let confirm_cleanup = use_cleanup(lifecycle);

    let filter_cache = use_hook(|| Rc::new(RefCell::new(FilterCache::default())));
    let overscan = APP_CONFIG
        .get()
        .map(|config| config.list_overscan)
        .unwrap_or(DEFAULT_OVERSCAN);

    let snapshot = state.read();
    let activity = &snapshot.activity;
    let history = &activity.history;
    let filters = activity.filters.clone();
    let result = filter_cache.borrow_mut().get(history, &filters);

    let visible_keys: Vec<RowKey> = result
        .visible
        .iter()
        .map(|&index| history.entries()[index].key.clone())
        .collect();
    let window = compute_window(
        &visible_keys,
        &activity.expansion,
        &activity.heights,
        activity.viewport,
        overscan,
    );
    let rows: Vec<RowView> = window
        .rows
        .iter()
        .map(|row| RowView {
            key: row.key.clone(),
            start: row.start,
            state: row.state,
            event: history.entries()[result.visible[row.index]].event.clone(),
        })
        .collect();

    let name_choices = name_options(history, filters.kind);
    let total = history.len();
    let shown = result.visible.len();
    let exportable = !result.light.is_empty();
    let live = snapshot.live_stream.clone();
    let show_skeleton = snapshot.shows_skeleton();
    let is_busy = activity.is_initial_loading || activity.is_refreshing;
    let last_refreshed = activity.last_refreshed;
    let cleanup_phase = snapshot.cleanup.phase;
    let user_label = snapshot
        .user_id
        .clone()
        .unwrap_or_else(|| "未登录".to_string());
    let auto_refresh = snapshot.mirror_configured.unwrap_or(false)
        && APP_CONFIG
            .get()
            .and_then(|config| config.refresh_interval)
            .is_some();
    drop(snapshot);

    let measure_keys: Vec<(RowKey, RowState)> =
        rows.iter().map(|row| (row.key.clone(), row.state)).collect();
    use_effect(use_reactive!(|measure_keys| {
        let keys: Vec<RowKey> = measure_keys.into_iter().map(|(key, _)| key).collect();
        actions.measure_rows(&DomMeasurer, &keys);
    }));

    let total_height = window.total_height;

    rsx! {
        section { class: "space-y-4",
            header { class: "flex flex-wrap items-start justify-between gap-3",
                div { class: "space-y-1",
                    h1 { class: "text-lg font-semibold text-slate-900", "实时活动" }
                    p { class: "text-xs text-slate-500", "用户: {user_label} · 显示 {shown} / {total} 条" }
                    LiveStatus {
                        connected: live.is_connected,
                        last_event_at: live.last_event_at,
                        last_refreshed,
                        auto_refresh,
                    }
                }
                div { class: "flex flex-wrap gap-2",
                    button {
                        class: TOOLBAR_BUTTON_CLASS,
                        disabled: is_busy,
                        onclick: move |_| refresh.call(FetchOrigin::Manual),
                        if is_busy { "刷新中…" } else { "刷新" }
                    }
                    button {
                        class: TOOLBAR_BUTTON_CLASS,
                        disabled: !exportable,
                        onclick: move |_| export_filtered(state, actions, ExportFormat::Csv),
                        "导出 CSV"
                    }
                    button {
                        class: TOOLBAR_BUTTON_CLASS,
                        disabled: !exportable,
                        onclick: move |_| export_filtered(state, actions, ExportFormat::Json),
                        "导出 JSON"
                    }
                    CleanupButton {
                        phase: cleanup_phase,
                        disabled: total == 0,
                        actions,
                    }
                }
            }

            FilterToolbar { filters, name_choices, actions }

            if show_skeleton {
                ActivitySkeleton {}
            } else if rows.is_empty() {
                div { class: "rounded-lg border border-dashed border-slate-200 bg-white p-8 text-center text-sm text-slate-500",
                    if total == 0 { "暂无活动记录" } else { "没有符合筛选条件的活动" }
                }
            } else {
                div {
                    id: LIST_CONTAINER_ID,
                    class: "relative h-[600px] overflow-y-auto rounded-lg border border-slate-200 bg-white",
                    onmounted: move |_| sync_viewport(actions),
                    onscroll: move |_| sync_viewport(actions),
                    div { style: "position: relative; height: {total_height}px;",
                        for row in rows {
                            div {
                                key: "{row.key}",
                                style: "position: absolute; top: {row.start}px; left: 0; right: 0;",
                                ActivityRow {
                                    row_key: row.key.clone(),
                                    event: row.event,
                                    state: row.state,
                                    actions,
                                }
                            }
                        }
                    }
                }
            }

            CleanupDialog {
                phase: cleanup_phase,
                entry_count: total,
                on_confirm: confirm_cleanup,
                actions,
            }
        }
    }
}

fn sync_viewport(actions: AppActions) {
    if let Some(viewport) = read_viewport(LIST_CONTAINER_ID) {
        actions.set_viewport(viewport);
    }
}

/// 导出只使用轻量筛选结果（状态、类型、名称），不受搜索词影响。
fn export_filtered(state: AppSignal, actions: AppActions, format: ExportFormat) {
    let outcome = {
        let snapshot = state.peek();
        let entries = light_filter(&snapshot.activity.history, &snapshot.activity.filters);
        let today = OffsetDateTime::now_utc().date();
        let outcome = export(format, entries.into_iter().map(|entry| &entry.event), today);
        outcome
    };

    let context = format!("导出 {}", format.label());
    match outcome {
        Ok(file) => match download::deliver(&file) {
            Ok(location) => {
                tracing::info!(%location, "activity export delivered");
                actions.set_operation_success(&context, format!("已生成 {}", file.filename));
            }
            Err(err) => {
                tracing::warn!(%err, "activity export download failed");
                actions.set_operation_error(&context, err.to_string());
            }
        },
        Err(err @ ExportError::Empty) => actions.set_operation_error(&context, err.to_string()),
        Err(err) => {
            tracing::error!(%err, "activity export failed");
            actions.set_operation_error(&context, err.to_string());
        }
    }
}

#[derive(Props, Clone)]
#[props(no_eq)]
struct LiveStatusProps {
    connected: bool,
    last_event_at: Option<OffsetDateTime>,
    last_refreshed: Option<OffsetDateTime>,
    auto_refresh: bool,
}

impl PartialEq for LiveStatusProps {
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

impl Eq for LiveStatusProps {}

#[component]
fn LiveStatus(props: LiveStatusProps) -> Element {
    let (dot_class, label) = if props.connected {
        ("bg-emerald-500", "实时连接")
    } else {
        ("bg-slate-400", "未连接")
    };
    let refreshed_label = props
        .last_refreshed
        .and_then(|at| format_timestamp(at).ok())
        .unwrap_or_else(|| "尚未刷新".to_string());
    let event_label = props.last_event_at.and_then(|at| format_timestamp(at).ok());

    rsx! {
        div { class: "flex items-center gap-3 text-[11px] text-slate-500",
            span { class: "flex items-center gap-1",
                span { class: format!("inline-block h-2 w-2 rounded-full {}", dot_class) }
                "{label}"
            }
            span { "上次刷新: {refreshed_label}" }
            if let Some(event_label) = event_label {
                span { "最近推送: {event_label}" }
            }
            if props.auto_refresh {
                span { class: "rounded bg-slate-100 px-1.5 py-0.5", "自动刷新" }
            }
        }
    }
}

#[derive(Props, Clone)]
#[props(no_eq)]
struct FilterToolbarProps {
    filters: FilterParams,
    name_choices: Vec<String>,
    actions: AppActions,
}

impl PartialEq for FilterToolbarProps {
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

impl Eq for FilterToolbarProps {}

#[component]
fn FilterToolbar(props: FilterToolbarProps) -> Element {
    let filters = props.filters.clone();
    let actions = props.actions;

    let search_term = filters.search_term.clone();
    let status_value = filters.status.map(RepoStatus::as_str).unwrap_or("");
    let kind_value = filters.kind.map(ActivityKind::as_str).unwrap_or("");
    let name_value = filters.name.clone().unwrap_or_default();
    let name_placeholder = match filters.kind {
        Some(kind) => format!("全部{}", kind.label()),
        None => "全部名称".to_string(),
    };

    rsx! {
        div { class: "flex flex-wrap items-center gap-2 rounded-lg border border-slate-200 bg-white p-3 shadow-sm",
            input {
                class: "min-w-[200px] flex-1 rounded border border-slate-300 px-2 py-1 text-xs",
                r#type: "search",
                placeholder: "搜索消息、详情、仓库或组织",
                value: "{search_term}",
                oninput: move |evt| {
                    let value = evt.value();
                    actions.update_filters(move |filters| filters.search_term = value);
                },
            }
            select {
                class: SELECT_CLASS,
                value: status_value,
                onchange: move |evt| {
                    let status = RepoStatus::parse(&evt.value());
                    actions.update_filters(move |filters| filters.status = status);
                },
                option { value: "", "全部状态" }
                for status in RepoStatus::FILTERABLE {
                    option {
                        key: "{status.as_str()}",
                        value: status.as_str(),
                        selected: filters.status == Some(status),
                        "{status.label()}"
                    }
                }
            }
            select {
                class: SELECT_CLASS,
                value: kind_value,
                onchange: move |evt| {
                    let kind = ActivityKind::parse(&evt.value());
                    actions.update_filters(move |filters| filters.set_kind(kind));
                },
                option { value: "", "全部类型" }
                for kind in [ActivityKind::Repository, ActivityKind::Organization] {
                    option {
                        key: "{kind.as_str()}",
                        value: kind.as_str(),
                        selected: filters.kind == Some(kind),
                        "{kind.label()}"
                    }
                }
            }
            select {
                class: SELECT_CLASS,
                value: "{name_value}",
                disabled: props.name_choices.is_empty(),
                onchange: move |evt| {
                    let value = evt.value();
                    let name = (!value.is_empty()).then_some(value);
                    actions.update_filters(move |filters| filters.name = name);
                },
                option { value: "", "{name_placeholder}" }
                for name in props.name_choices.iter() {
                    option {
                        key: "{name}",
                        value: "{name}",
                        selected: filters.name.as_deref() == Some(name.as_str()),
                        "{name}"
                    }
                }
            }
            if !filters.is_empty() {
                button {
                    class: "text-xs text-slate-500 underline hover:text-slate-700",
                    onclick: move |_| actions.clear_filters(),
                    "清除筛选"
                }
            }
        }
    }
}

#[derive(Props, Clone, PartialEq)]
struct ActivityRowProps {
    row_key: RowKey,
    event: MirrorEvent,
    state: RowState,
    actions: AppActions,
}

#[component]
fn ActivityRow(props: ActivityRowProps) -> Element {
    let actions = props.actions;
    let event = &props.event;
    let expanded = props.state.is_expanded();
    let time_label =
        format_timestamp(event.timestamp).unwrap_or_else(|_| event.timestamp.to_string());
    let toggle_key = props.row_key.clone();

    rsx! {
        div { id: props.row_key.dom_id(), class: "border-b border-slate-100 px-4 py-3",
            div { class: "flex items-start justify-between gap-3",
                div { class: "min-w-0 space-y-1",
                    div { class: "flex items-center gap-2",
                        span {
                            class: format!("rounded-full px-2 py-0.5 text-[11px] font-medium {}", event.status.badge_class()),
                            "{event.status.label()}"
                        }
                        if let Some(subject) = event.subject_label() {
                            span { class: "truncate text-xs font-medium text-slate-700", "{subject}" }
                        }
                    }
                    p { class: "text-sm text-slate-800", "{event.message}" }
                    p { class: "text-[11px] text-slate-400", "{time_label}" }
                }
                if event.has_details() {
                    button {
                        class: "shrink-0 text-[11px] text-sky-600 hover:text-sky-800",
                        onclick: move |_| actions.toggle_row(&toggle_key),
                        if expanded { "收起详情" } else { "展开详情" }
                    }
                }
            }
            if expanded {
                if let Some(details) = event.details.as_deref() {
                    pre { class: "mt-2 max-h-40 overflow-auto whitespace-pre-wrap rounded bg-slate-50 p-2 text-[11px] text-slate-600",
                        "{details}"
                    }
                }
            }
        }
    }
}

#[component]
fn ActivitySkeleton() -> Element {
    rsx! {
        div { class: "space-y-2 rounded-lg border border-slate-200 bg-white p-4",
            for index in 0..5 {
                div { key: "skeleton-{index}", class: "animate-pulse space-y-2 border-b border-slate-100 pb-3",
                    div { class: "h-3 w-24 rounded bg-slate-200" }
                    div { class: "h-3 w-3/4 rounded bg-slate-100" }
                    div { class: "h-2 w-32 rounded bg-slate-100" }
                }
            }
        }
    }
}

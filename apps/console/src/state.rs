use dioxus::prelude::*;
use time::OffsetDateTime;

use crate::activity::{
    ActivityHistory, ExpansionTable, FetchTicket, FilterParams, LivenessGuard, Measurer,
    PushOutcome, RowHeights, RowKey, RowState, Viewport,
};
use crate::models::{CleanupResult, MirrorEvent};

pub type AppSignal = dioxus_signals::Signal<AppState>;

/// 快照拉取的来源，决定失败时是否打扰用户。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOrigin {
    Initial,
    Manual,
    Background,
}

impl FetchOrigin {
    pub fn is_silent(self) -> bool {
        matches!(self, Self::Background)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActivityState {
    pub history: ActivityHistory,
    pub filters: FilterParams,
    pub expansion: ExpansionTable,
    pub heights: RowHeights,
    pub viewport: Viewport,
    pub is_initial_loading: bool,
    pub is_refreshing: bool,
    pub error: Option<String>,
    pub last_refreshed: Option<OffsetDateTime>,
}

impl ActivityState {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            history: ActivityHistory::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// 登记一次拉取。首次或手动拉取未完成时拒绝后台刷新并返回 `false`，
    /// 否则后台请求会顶替前台请求，前台的失败提示随之丢失。
    pub fn begin_fetch(&mut self, origin: FetchOrigin) -> bool {
        match origin {
            FetchOrigin::Initial => {
                self.is_initial_loading = true;
                self.error = None;
            }
            FetchOrigin::Manual => {
                self.is_refreshing = true;
                self.error = None;
            }
            FetchOrigin::Background => {
                return !self.is_fetching_in_foreground();
            }
        }
        true
    }

    pub fn is_fetching_in_foreground(&self) -> bool {
        self.is_initial_loading || self.is_refreshing
    }

    /// 应用快照；票据过期（视图已卸载或有更新的拉取）时丢弃并返回 `false`。
    pub fn finish_fetch(
        &mut self,
        ticket: &FetchTicket,
        events: Vec<MirrorEvent>,
        now: OffsetDateTime,
    ) -> bool {
        if !ticket.is_current() {
            return false;
        }

        self.history.apply_snapshot(events);
        self.expansion.retain(self.history.keys());
        self.heights.retain(self.history.keys());
        self.is_initial_loading = false;
        self.is_refreshing = false;
        self.error = None;
        self.last_refreshed = Some(now);
        true
    }

    /// 拉取失败时保留现有历史。返回需要提示给用户的信息，后台刷新返回 `None`。
    pub fn fail_fetch(
        &mut self,
        ticket: &FetchTicket,
        origin: FetchOrigin,
        message: String,
    ) -> Option<String> {
        if !ticket.is_current() {
            return None;
        }

        self.is_initial_loading = false;
        self.is_refreshing = false;
        if origin.is_silent() {
            return None;
        }
        self.error = Some(message.clone());
        Some(message)
    }

    pub fn apply_push(&mut self, event: MirrorEvent) -> PushOutcome {
        let outcome = self.history.apply_push(event);
        for key in self.history.last_evicted() {
            self.expansion.remove(key);
            self.heights.invalidate(key);
        }
        outcome
    }

    pub fn toggle_row(&mut self, key: &RowKey) -> RowState {
        let next = self.expansion.toggle(key);
        self.heights.invalidate(key);
        next
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.expansion.clear();
        self.heights.clear();
        self.viewport.scroll_top = 0.0;
    }

    pub fn reset(&mut self) {
        let capacity = self.history.capacity();
        let filters = std::mem::take(&mut self.filters);
        *self = Self::with_capacity(capacity);
        self.filters = filters;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CleanupPhase {
    #[default]
    Idle,
    Confirming,
    InFlight,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CleanupState {
    pub phase: CleanupPhase,
}

impl CleanupState {
    pub fn request(&mut self) -> bool {
        if self.phase == CleanupPhase::Idle {
            self.phase = CleanupPhase::Confirming;
            true
        } else {
            false
        }
    }

    pub fn dismiss(&mut self) {
        if self.phase == CleanupPhase::Confirming {
            self.phase = CleanupPhase::Idle;
        }
    }

    /// 只有确认中的请求可以发出，防止重复提交。
    pub fn confirm(&mut self) -> bool {
        if self.phase == CleanupPhase::Confirming {
            self.phase = CleanupPhase::InFlight;
            true
        } else {
            false
        }
    }

    pub fn settle(&mut self) {
        self.phase = CleanupPhase::Idle;
    }

    pub fn is_in_flight(&self) -> bool {
        self.phase == CleanupPhase::InFlight
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LiveStreamState {
    /// 订阅已有结果（连上、失败或因无用户而放弃）。
    pub attempted: bool,
    pub is_connected: bool,
    pub last_event_at: Option<OffsetDateTime>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperationState {
    pub last_message: Option<String>,
    pub error: Option<String>,
    pub context: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppState {
    pub user_id: Option<String>,
    /// `None` 表示尚未取得配置状态。
    pub mirror_configured: Option<bool>,
    pub activity: ActivityState,
    pub live_stream: LiveStreamState,
    pub cleanup: CleanupState,
    pub operation: OperationState,
}

impl AppState {
    pub fn new(user_id: Option<String>, max_activities: usize, filters: FilterParams) -> Self {
        let mut activity = ActivityState::with_capacity(max_activities);
        activity.filters = filters;
        Self {
            user_id,
            activity,
            ..Self::default()
        }
    }

    pub fn show_success(&mut self, context: impl Into<String>, message: String) {
        self.operation = OperationState {
            last_message: Some(message),
            error: None,
            context: Some(context.into()),
        };
    }

    pub fn show_error(&mut self, context: impl Into<String>, message: String) {
        self.operation = OperationState {
            last_message: None,
            error: Some(message),
            context: Some(context.into()),
        };
    }

    /// 首次加载中，或事件流尚无结果且没有任何历史时显示骨架屏。
    pub fn shows_skeleton(&self) -> bool {
        self.activity.is_initial_loading
            || (!self.live_stream.attempted && self.activity.history.is_empty())
    }

    /// 清理只在服务端确认成功后清空本地历史；失败时本地状态不变。
    /// 发起请求的视图已卸载时不触碰任何状态，当前视图的清理阶段由它自己的请求结束。
    pub fn finish_cleanup(
        &mut self,
        guard: &LivenessGuard,
        outcome: Result<CleanupResult, String>,
    ) -> bool {
        if !guard.is_alive() {
            return false;
        }
        self.cleanup.settle();

        match outcome {
            Ok(result) => {
                self.activity.clear_history();
                self.show_success(
                    "活动记录已清理",
                    format!(
                        "已删除 {} 个镜像任务、{} 条事件",
                        result.mirror_jobs_deleted, result.events_deleted
                    ),
                );
                true
            }
            Err(message) => {
                self.show_error("清理活动记录失败", message);
                false
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
pub struct AppActions {
    state: AppSignal,
}

impl AppActions {
    fn update<R>(&self, f: impl FnOnce(&mut AppState) -> R) -> R {
        let mut signal = self.state;
        let mut state = signal.write();
        f(&mut state)
    }

    pub fn set_mirror_configured(&self, configured: bool) {
        self.update(|state| state.mirror_configured = Some(configured));
    }

    pub fn begin_fetch(&self, origin: FetchOrigin) -> bool {
        self.update(|state| state.activity.begin_fetch(origin))
    }

    pub fn finish_fetch(&self, ticket: &FetchTicket, events: Vec<MirrorEvent>) {
        let count = events.len();
        let applied = self.update(|state| {
            state
                .activity
                .finish_fetch(ticket, events, OffsetDateTime::now_utc())
        });
        if applied {
            tracing::debug!(count, generation = ticket.generation(), "activity snapshot applied");
        } else {
            tracing::debug!(generation = ticket.generation(), "discarding stale activity snapshot");
        }
    }

    pub fn fail_fetch(&self, ticket: &FetchTicket, origin: FetchOrigin, message: String) {
        tracing::warn!(?origin, %message, "activity snapshot fetch failed");
        let surfaced = self.update(|state| state.activity.fail_fetch(ticket, origin, message));
        if surfaced.is_none() {
            tracing::debug!(?origin, "activity fetch failure kept silent");
        }
    }

    pub fn apply_push(&self, event: MirrorEvent) {
        let outcome = self.update(|state| {
            state.live_stream.last_event_at = Some(event.timestamp);
            state.activity.apply_push(event)
        });
        match outcome {
            PushOutcome::Updated(key) => tracing::debug!(%key, "live event merged"),
            PushOutcome::Inserted(key) => tracing::debug!(%key, "live event inserted"),
        }
    }

    pub fn update_filters(&self, f: impl FnOnce(&mut FilterParams)) {
        let filters = self.update(|state| {
            f(&mut state.activity.filters);
            state.activity.viewport.scroll_top = 0.0;
            state.activity.filters.clone()
        });
        crate::services::session::store_filters(&filters);
    }

    pub fn clear_filters(&self) {
        self.update_filters(|filters| *filters = FilterParams::default());
    }

    pub fn toggle_row(&self, key: &RowKey) {
        self.update(|state| state.activity.toggle_row(key));
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        if self.state.peek().activity.viewport != viewport {
            self.update(|state| state.activity.viewport = viewport);
        }
    }

    /// 行渲染完成后回填真实高度；没有变化时不写状态，避免测量与重绘互相触发。
    pub fn measure_rows(&self, measurer: &dyn Measurer, keys: &[RowKey]) {
        let measured = self
            .state
            .peek()
            .activity
            .heights
            .collect_measurements(measurer, keys);
        if measured.is_empty() {
            return;
        }
        self.update(|state| {
            for (key, height) in &measured {
                state.activity.heights.record(key, *height);
            }
        });
    }

    pub fn request_cleanup(&self) {
        self.update(|state| {
            if state.activity.history.is_empty() {
                state.show_error("无法清理", "当前没有可清理的活动记录".to_string());
            } else {
                state.cleanup.request();
            }
        });
    }

    pub fn dismiss_cleanup(&self) {
        self.update(|state| state.cleanup.dismiss());
    }

    pub fn confirm_cleanup(&self) -> bool {
        self.update(|state| state.cleanup.confirm())
    }

    pub fn finish_cleanup(&self, guard: &LivenessGuard, outcome: Result<CleanupResult, String>) {
        let cleared = self.update(|state| state.finish_cleanup(guard, outcome));
        tracing::info!(cleared, "activity cleanup settled");
    }

    pub fn set_live_connected(&self, connected: bool) {
        self.update(|state| {
            state.live_stream.attempted = true;
            state.live_stream.is_connected = connected;
            if connected {
                state.live_stream.error = None;
            }
        });
    }

    pub fn set_live_error(&self, message: Option<String>) {
        self.update(|state| {
            state.live_stream.attempted = true;
            state.live_stream.error = message;
            state.live_stream.is_connected = false;
        });
    }

    pub fn dismiss_live_error(&self) {
        self.update(|state| state.live_stream.error = None);
    }

    pub fn set_operation_success(&self, context: &str, message: String) {
        self.update(|state| state.show_success(context, message));
    }

    pub fn set_operation_error(&self, context: &str, message: String) {
        self.update(|state| state.show_error(context, message));
    }

    pub fn clear_operation_status(&self) {
        self.update(|state| state.operation = OperationState::default());
    }

    pub fn dismiss_activity_error(&self) {
        self.update(|state| state.activity.error = None);
    }

    /// 视图卸载时调用；应用整体销毁时信号可能已被回收，此时直接跳过。
    pub fn reset_activity(&self) {
        let mut signal = self.state;
        if let Ok(mut state) = signal.try_write() {
            state.activity.reset();
            state.cleanup = CleanupState::default();
            state.live_stream = LiveStreamState::default();
        };
    }
}

pub fn use_app_state() -> AppSignal {
    use_context::<AppSignal>()
}

pub fn use_app_actions() -> AppActions {
    let state = use_app_state();
    AppActions { state }
}

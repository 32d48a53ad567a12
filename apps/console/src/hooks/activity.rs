use dioxus::prelude::*;

use crate::activity::ViewLifecycle;
use crate::hooks::backend::fetch_activities;
use crate::state::{use_app_actions, use_app_state, AppActions, FetchOrigin};

/// 首次挂载以及切换用户时拉取活动快照，返回手动/定时刷新共用的回调。
pub fn use_activity_loader(lifecycle: ViewLifecycle) -> Callback<FetchOrigin> {
    let actions = use_app_actions();
    let state = use_app_state();

    let user_id = state.read().user_id.clone();

    let initial = lifecycle.clone();
    use_future(use_reactive!(|user_id| {
        let lifecycle = initial.clone();
        async move {
            let Some(user_id) = user_id else {
                tracing::info!("activity loader idle: no user session");
                return;
            };
            run_fetch(actions, &lifecycle, user_id, FetchOrigin::Initial).await;
        }
    }));

    use_callback(move |origin: FetchOrigin| {
        let Some(user_id) = state.peek().user_id.clone() else {
            tracing::debug!(?origin, "skipping activity refresh without user");
            return;
        };
        let lifecycle = lifecycle.clone();
        spawn(async move {
            run_fetch(actions, &lifecycle, user_id, origin).await;
        });
    })
}

async fn run_fetch(
    actions: AppActions,
    lifecycle: &ViewLifecycle,
    user_id: String,
    origin: FetchOrigin,
) {
    if !actions.begin_fetch(origin) {
        tracing::debug!(?origin, "foreground fetch pending, skipping refresh");
        return;
    }
    let ticket = lifecycle.begin_fetch();

    match fetch_activities(&user_id).await {
        Ok(events) => actions.finish_fetch(&ticket, events),
        Err(err) => actions.fail_fetch(&ticket, origin, err.to_string()),
    }
}

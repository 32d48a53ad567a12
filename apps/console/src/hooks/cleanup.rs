use dioxus::prelude::*;
use thiserror::Error;

use crate::activity::ViewLifecycle;
use crate::hooks::backend::{cleanup_activities, BackendError};
use crate::state::{use_app_actions, use_app_state};

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("缺少当前用户，无法清理活动记录")]
    MissingUser,
    #[error("已有清理请求正在进行")]
    AlreadyInFlight,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// 返回确认清理的回调。请求发出后按钮保持禁用，直到服务端返回结果。
pub fn use_cleanup(lifecycle: ViewLifecycle) -> Callback<()> {
    let actions = use_app_actions();
    let state = use_app_state();

    use_callback(move |()| {
        let snapshot = state.peek();
        let user_id = snapshot.user_id.clone();
        let history_len = snapshot.activity.history.len();
        drop(snapshot);

        let Some(user_id) = user_id else {
            actions.dismiss_cleanup();
            actions.set_operation_error("清理活动记录失败", CleanupError::MissingUser.to_string());
            return;
        };

        if !actions.confirm_cleanup() {
            tracing::debug!(reason = %CleanupError::AlreadyInFlight, "cleanup request rejected");
            return;
        }

        // 清理一旦发出就要等到服务端结果，不随视图卸载取消
        let guard = lifecycle.guard();
        spawn_forever(async move {
            let outcome = cleanup_activities(&user_id, history_len)
                .await
                .map_err(|err| CleanupError::from(err).to_string());
            if let Err(message) = &outcome {
                tracing::warn!(%message, "activity cleanup failed");
            }
            actions.finish_cleanup(&guard, outcome);
        });
    })
}

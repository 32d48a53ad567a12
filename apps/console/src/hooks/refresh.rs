use dioxus::prelude::*;
use gloo_timers::future::TimeoutFuture;

use crate::hooks::backend::fetch_mirror_configured;
use crate::state::{use_app_actions, use_app_state, FetchOrigin};
use crate::APP_CONFIG;

/// 镜像配置完整且设置了刷新间隔时，定时在后台重新拉取快照。
/// 后台刷新失败只记录日志，不弹出提示。
pub fn use_live_refresh(refresh: Callback<FetchOrigin>) {
    let actions = use_app_actions();
    let state = use_app_state();

    let snapshot = state.read();
    let user_id = snapshot.user_id.clone();
    let configured = snapshot.mirror_configured.unwrap_or(false);
    drop(snapshot);

    let interval = APP_CONFIG.get().and_then(|config| config.refresh_interval);

    use_future(use_reactive!(|user_id| async move {
        let Some(user_id) = user_id else {
            return;
        };
        match fetch_mirror_configured(&user_id).await {
            Ok(configured) => actions.set_mirror_configured(configured),
            Err(err) => {
                tracing::warn!(%err, "failed to load mirror configuration status");
                actions.set_mirror_configured(false);
            }
        }
    }));

    use_future(use_reactive!(|(configured, interval)| async move {
        let Some(period) = interval.filter(|_| configured) else {
            tracing::debug!(configured, ?interval, "periodic activity refresh disabled");
            return;
        };

        let millis = period.as_millis().min(u32::MAX as u128) as u32;
        tracing::info!(millis, "periodic activity refresh registered");
        loop {
            TimeoutFuture::new(millis).await;
            refresh.call(FetchOrigin::Background);
        }
    }));
}

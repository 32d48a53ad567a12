use dioxus::prelude::*;

use crate::activity::ViewLifecycle;
use crate::state::{use_app_actions, use_app_state};

#[cfg(target_arch = "wasm32")]
use {
    crate::models::MirrorEvent,
    crate::services::sse::{SseCallbacks, SseClient, SseConnectOptions},
    crate::APP_CONFIG,
    futures::{channel::mpsc, StreamExt},
    tracing::warn,
};

#[cfg(target_arch = "wasm32")]
enum StreamSignal {
    Open,
    Event(MirrorEvent),
    Error(String),
}

/// 订阅当前用户的事件流。回调只负责入队，推送在同一个任务里按到达顺序逐条应用。
#[cfg(target_arch = "wasm32")]
pub fn use_live_stream(lifecycle: ViewLifecycle) {
    let actions = use_app_actions();
    let state = use_app_state();

    let user_id = state.read().user_id.clone();

    use_future(use_reactive!(|user_id| {
        let lifecycle = lifecycle.clone();
        async move {
            let Some(config) = APP_CONFIG.get() else {
                actions.set_live_error(Some("缺少控制台配置".into()));
                return;
            };
            let Some(user_id) = user_id else {
                actions.set_live_connected(false);
                return;
            };

            let (tx, mut rx) = mpsc::unbounded::<StreamSignal>();
            let on_open = tx.clone();
            let on_event = tx.clone();
            let callbacks = SseCallbacks::new(
                move || {
                    let _ = on_open.unbounded_send(StreamSignal::Open);
                },
                move |event| {
                    let _ = on_event.unbounded_send(StreamSignal::Event(event));
                },
                move |message| {
                    let _ = tx.unbounded_send(StreamSignal::Error(message));
                },
            );
            let options = SseConnectOptions {
                heartbeat_timeout_ms: config.sse_timeout.as_millis() as u64,
                ..SseConnectOptions::default()
            };

            let url = config.event_stream_url(&user_id);
            let _handle = match SseClient::connect(&url, callbacks, options) {
                Ok(handle) => handle,
                Err(err) => {
                    warn!(%err, "failed to open activity stream");
                    actions.set_live_error(Some(err.to_string()));
                    return;
                }
            };

            while let Some(signal) = rx.next().await {
                if !lifecycle.is_alive() {
                    break;
                }
                match signal {
                    StreamSignal::Open => actions.set_live_connected(true),
                    StreamSignal::Event(event) => actions.apply_push(event),
                    StreamSignal::Error(message) => {
                        warn!(%message, "activity stream interrupted");
                        actions.set_live_connected(false);
                    }
                }
            }
        }
    }));
}

#[cfg(not(target_arch = "wasm32"))]
use crate::fixtures::activity::sample_live_event;
#[cfg(not(target_arch = "wasm32"))]
use gloo_timers::future::TimeoutFuture;

#[cfg(not(target_arch = "wasm32"))]
pub fn use_live_stream(lifecycle: ViewLifecycle) {
    let actions = use_app_actions();
    let state = use_app_state();

    let user_id = state.read().user_id.clone();

    use_future(use_reactive!(|user_id| {
        let lifecycle = lifecycle.clone();
        async move {
            tracing::info!("live stream watcher: user={:?}", user_id);
            if user_id.is_none() {
                actions.set_live_connected(false);
                return;
            }

            TimeoutFuture::new(0).await;
            actions.set_live_connected(true);

            for seq in 0u64..6 {
                TimeoutFuture::new(1_200).await;
                if !lifecycle.is_alive() {
                    break;
                }
                actions.apply_push(sample_live_event(seq));
            }
        }
    }));
}

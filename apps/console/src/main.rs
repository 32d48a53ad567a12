#![allow(non_snake_case)]

mod activity;
mod api;
mod config;
mod fixtures;
mod hooks;
mod models;
mod services;
mod state;
mod ui;

use api::{ClientError, MirrorClient};
use config::AppConfig;
use dioxus::prelude::*;
use dioxus_router::prelude::*;
use once_cell::sync::OnceCell;
use services::session;
use state::{use_app_state, AppState};
use tracing::{error, info};
use ui::activity::ActivityLog;
use ui::notifications::NotificationCenter;

pub(crate) static APP_CONFIG: OnceCell<AppConfig> = OnceCell::new();
pub(crate) static API_CLIENT: OnceCell<MirrorClient> = OnceCell::new();

fn main() {
    console_error_panic_hook::set_once();
    let config = AppConfig::from_env();
    init_logging(config.profile.log_level());
    bootstrap_infrastructure(config);
    launch(App);
}

fn init_logging(level: tracing::Level) {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = dioxus_logger::init(level);
    });
}

fn bootstrap_infrastructure(config: AppConfig) {
    let client = MirrorClient::new(&config);
    let _ = APP_CONFIG.set(config);

    match client {
        Ok(client) => {
            let _ = API_CLIENT.set(client);
            info!("mirror api client initialized");
        }
        Err(err) => {
            report_client_error("初始化镜像服务客户端失败", &err);
        }
    }
}

fn report_client_error(context: &str, err: &ClientError) {
    error!(%context, ?err, status = ?err.status(), "api bootstrap error");
}

#[component]
fn App() -> Element {
    let app_state = use_signal(|| {
        let config = APP_CONFIG.get().cloned().unwrap_or_default();
        AppState::new(
            session::current_user_id(config.default_user_id.as_deref()),
            config.max_activities,
            session::load_filters(),
        )
    });

    use_context_provider(|| app_state);

    rsx! {
        div { class: "relative",
            Router::<Route> {}
            NotificationCenter {}
        }
    }
}

#[derive(Clone, Routable, Debug, PartialEq)]
enum Route {
    #[layout(Shell)]
    #[route("/")]
    Dashboard {},
    #[route("/activity")]
    Activity {},
}

#[component]
fn Shell() -> Element {
    rsx! {
        div { class: "app-shell space-y-4 p-4",
            nav { class: "flex gap-4 text-sm",
                Link { class: "text-slate-700 hover:text-slate-900", to: Route::Dashboard {}, "概览" }
                Link { class: "text-slate-700 hover:text-slate-900", to: Route::Activity {}, "实时活动" }
            }
            Outlet::<Route> {}
        }
    }
}

#[component]
fn Dashboard() -> Element {
    let snapshot = use_app_state().read().clone();

    let api_endpoint = APP_CONFIG
        .get()
        .map(|c| c.api_base_url.clone())
        .unwrap_or_else(|| "未配置 API 地址".to_string());
    let user_label = snapshot
        .user_id
        .clone()
        .unwrap_or_else(|| "未登录".to_string());
    let configured_label = match snapshot.mirror_configured {
        Some(true) => "已完成",
        Some(false) => "未完成",
        None => "未知",
    };

    rsx! {
        section { class: "rounded-lg border border-slate-200 bg-white p-4 shadow-sm space-y-1",
            h1 { class: "text-xl font-semibold text-slate-900", "镜像控制台" }
            p { class: "text-sm text-slate-600", "API: {api_endpoint}" }
            p { class: "text-sm text-slate-600", "当前用户: {user_label}" }
            p { class: "text-sm text-slate-600", "镜像配置: {configured_label}" }
            Link {
                class: "inline-block pt-2 text-sm text-sky-600 hover:text-sky-800",
                to: Route::Activity {},
                "查看实时活动 →"
            }
        }
    }
}

#[component]
fn Activity() -> Element {
    rsx! { ActivityLog {} }
}

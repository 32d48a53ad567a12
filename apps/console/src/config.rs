use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_API_BASE_URL: &str = "http://localhost:4321/api";
const DEFAULT_SSE_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
const DEFAULT_MAX_ACTIVITIES: usize = 1_000;
const DEFAULT_LIST_OVERSCAN: usize = 5;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppProfile {
    Dev,
    Prod,
}

impl AppProfile {
    pub fn from_env(value: Option<String>) -> Self {
        match value.as_deref() {
            Some("prod") | Some("production") => Self::Prod,
            _ => Self::Dev,
        }
    }

    pub fn log_level(self) -> tracing::Level {
        match self {
            Self::Dev => tracing::Level::DEBUG,
            Self::Prod => tracing::Level::INFO,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_base_url: String,
    pub stream_base_url: Option<String>,
    pub default_user_id: Option<String>,
    pub profile: AppProfile,
    pub sse_timeout: Duration,
    pub request_timeout: Duration,
    /// `None` 表示关闭后台定时刷新。
    pub refresh_interval: Option<Duration>,
    pub max_activities: usize,
    pub list_overscan: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            stream_base_url: None,
            default_user_id: None,
            profile: AppProfile::Dev,
            sse_timeout: Duration::from_millis(DEFAULT_SSE_TIMEOUT_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            refresh_interval: Some(Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS)),
            max_activities: DEFAULT_MAX_ACTIVITIES,
            list_overscan: DEFAULT_LIST_OVERSCAN,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        #[cfg(not(target_arch = "wasm32"))]
        crate::config::load_dotenv();

        Self::from_lookup(read_env)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("MIRROR_API_BASE_URL") {
            config.api_base_url = url;
        }

        if let Some(stream_url) = lookup("MIRROR_STREAM_BASE_URL") {
            config.stream_base_url = Some(stream_url);
        }

        if let Some(user) = lookup("MIRROR_USER_ID") {
            config.default_user_id = Some(user);
        }

        config.profile = AppProfile::from_env(lookup("MIRROR_PROFILE"));

        if let Some(ms) = lookup("MIRROR_SSE_TIMEOUT_MS").and_then(|value| value.parse::<u64>().ok())
        {
            config.sse_timeout = Duration::from_millis(ms.max(1_000));
        }

        if let Some(secs) =
            lookup("MIRROR_REQUEST_TIMEOUT_SECS").and_then(|value| value.parse::<u64>().ok())
        {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }

        if let Some(secs) =
            lookup("MIRROR_REFRESH_INTERVAL_SECS").and_then(|value| value.parse::<u64>().ok())
        {
            config.refresh_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(cap) =
            lookup("MIRROR_MAX_ACTIVITIES").and_then(|value| value.parse::<usize>().ok())
        {
            config.max_activities = cap.max(1);
        }

        if let Some(overscan) =
            lookup("MIRROR_LIST_OVERSCAN").and_then(|value| value.parse::<usize>().ok())
        {
            config.list_overscan = overscan;
        }

        config
    }

    pub fn stream_endpoint(&self) -> String {
        self.stream_base_url
            .clone()
            .unwrap_or_else(|| self.api_base_url.clone())
    }

    pub fn event_stream_url(&self, user_id: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("userId", user_id)
            .finish();
        format!(
            "{}/sse?{}",
            self.stream_endpoint().trim_end_matches('/'),
            query
        )
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .or_else(|| option_env_from_build(key).map(|s| s.to_string()))
        .filter(|value| !value.trim().is_empty())
}

fn option_env_from_build(key: &str) -> Option<&'static str> {
    match key {
        "MIRROR_API_BASE_URL" => option_env!("MIRROR_API_BASE_URL"),
        "MIRROR_STREAM_BASE_URL" => option_env!("MIRROR_STREAM_BASE_URL"),
        "MIRROR_USER_ID" => option_env!("MIRROR_USER_ID"),
        "MIRROR_PROFILE" => option_env!("MIRROR_PROFILE"),
        "MIRROR_SSE_TIMEOUT_MS" => option_env!("MIRROR_SSE_TIMEOUT_MS"),
        "MIRROR_REQUEST_TIMEOUT_SECS" => option_env!("MIRROR_REQUEST_TIMEOUT_SECS"),
        "MIRROR_REFRESH_INTERVAL_SECS" => option_env!("MIRROR_REFRESH_INTERVAL_SECS"),
        "MIRROR_MAX_ACTIVITIES" => option_env!("MIRROR_MAX_ACTIVITIES"),
        "MIRROR_LIST_OVERSCAN" => option_env!("MIRROR_LIST_OVERSCAN"),
        _ => None,
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn load_dotenv() {
    if let Err(err) = dotenvy::dotenv() {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            tracing::warn!("failed to load .env: {err}");
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[inline]
pub fn load_dotenv() {}

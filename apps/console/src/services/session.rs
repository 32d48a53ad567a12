use serde::{Deserialize, Serialize};

use crate::activity::FilterParams;

const SESSION_KEY: &str = "mirror-console.session";
const FILTERS_KEY: &str = "mirror-console.activity-filters";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// 当前登录用户：优先读取浏览器本地会话，缺失时回退到配置中的默认用户。
pub fn current_user_id(fallback: Option<&str>) -> Option<String> {
    load_session()
        .map(|session| session.user_id)
        .filter(|id| !id.trim().is_empty())
        .or_else(|| fallback.map(str::to_string))
}

pub fn load_filters() -> FilterParams {
    read(FILTERS_KEY).unwrap_or_default()
}

pub fn store_filters(params: &FilterParams) {
    write(FILTERS_KEY, params);
}

fn load_session() -> Option<UserSession> {
    read(SESSION_KEY)
}

#[cfg(target_arch = "wasm32")]
fn read<T: for<'de> Deserialize<'de>>(key: &str) -> Option<T> {
    use gloo_storage::{LocalStorage, Storage};

    match LocalStorage::get(key) {
        Ok(value) => Some(value),
        Err(gloo_storage::errors::StorageError::KeyNotFound(_)) => None,
        Err(err) => {
            tracing::warn!(%key, %err, "failed to read local storage");
            None
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn write<T: Serialize>(key: &str, value: &T) {
    use gloo_storage::{LocalStorage, Storage};

    if let Err(err) = LocalStorage::set(key, value) {
        tracing::warn!(%key, %err, "failed to write local storage");
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn read<T: for<'de> Deserialize<'de>>(_key: &str) -> Option<T> {
    None
}

#[cfg(not(target_arch = "wasm32"))]
fn write<T: Serialize>(_key: &str, _value: &T) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_user_is_used_without_stored_session() {
        assert_eq!(current_user_id(Some("u-1")).as_deref(), Some("u-1"));
        assert_eq!(current_user_id(None), None);
    }

    #[test]
    fn session_payload_is_camel_case() {
        let session: UserSession =
            serde_json::from_str(r#"{"userId":"abc","username":"octo"}"#).unwrap();
        assert_eq!(session.user_id, "abc");
        assert_eq!(session.username.as_deref(), Some("octo"));
    }
}

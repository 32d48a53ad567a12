use thiserror::Error;

use crate::api::ClientError;
use crate::models::{CleanupResult, MirrorEvent};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("API 客户端未初始化")]
    ClientUnavailable,
    #[error("{}", .0.user_message())]
    Client(#[from] ClientError),
}

#[cfg(target_arch = "wasm32")]
mod remote {
    use super::BackendError;
    use crate::api::MirrorClient;
    use crate::models::{CleanupResult, MirrorEvent};
    use crate::API_CLIENT;

    fn client() -> Result<MirrorClient, BackendError> {
        API_CLIENT.get().cloned().ok_or(BackendError::ClientUnavailable)
    }

    pub async fn activities(user_id: &str) -> Result<Vec<MirrorEvent>, BackendError> {
        Ok(client()?.get_activities(user_id).await?)
    }

    pub async fn cleanup(user_id: &str, _history_len: usize) -> Result<CleanupResult, BackendError> {
        Ok(client()?.cleanup_activities(user_id).await?)
    }

    pub async fn mirror_configured(user_id: &str) -> Result<bool, BackendError> {
        Ok(client()?.get_config(user_id).await?.is_fully_configured())
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod remote {
    use super::BackendError;
    use crate::fixtures::activity::{sample_activity_snapshot, sample_cleanup_result};
    use crate::models::{CleanupResult, MirrorEvent};
    use gloo_timers::future::TimeoutFuture;

    pub async fn activities(user_id: &str) -> Result<Vec<MirrorEvent>, BackendError> {
        tracing::debug!(%user_id, "serving sample activity snapshot");
        TimeoutFuture::new(150).await;
        Ok(sample_activity_snapshot())
    }

    pub async fn cleanup(user_id: &str, history_len: usize) -> Result<CleanupResult, BackendError> {
        tracing::debug!(%user_id, "simulating activity cleanup");
        TimeoutFuture::new(300).await;
        Ok(sample_cleanup_result(history_len))
    }

    pub async fn mirror_configured(_user_id: &str) -> Result<bool, BackendError> {
        Ok(true)
    }
}

pub async fn fetch_activities(user_id: &str) -> Result<Vec<MirrorEvent>, BackendError> {
    remote::activities(user_id).await
}

pub async fn cleanup_activities(
    user_id: &str,
    history_len: usize,
) -> Result<CleanupResult, BackendError> {
    remote::cleanup(user_id, history_len).await
}

pub async fn fetch_mirror_configured(user_id: &str) -> Result<bool, BackendError> {
    remote::mirror_configured(user_id).await
}

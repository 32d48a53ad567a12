use anyhow::Context;
use reqwest::{header, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::config::AppConfig;
use crate::models::{
    ActivitiesResponse, CleanupRequest, CleanupResponse, CleanupResult, MirrorConfigView,
    MirrorEvent,
};

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Clone)]
pub struct MirrorClient {
    inner: reqwest::Client,
    base_url: String,
}

impl MirrorClient {
    pub fn new(config: &AppConfig) -> ClientResult<Self> {
        let base_url = normalize_base_url(&config.api_base_url);

        #[allow(unused_mut)]
        let mut builder = reqwest::Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        {
            builder = builder.timeout(config.request_timeout);
        }
        let client = builder.build().context("failed to build reqwest client")?;

        Ok(Self {
            inner: client,
            base_url,
        })
    }

    pub async fn get_activities(&self, user_id: &str) -> ClientResult<Vec<MirrorEvent>> {
        let builder = self
            .request(Method::GET, "activities")
            .query(&[("userId", user_id)]);
        let body: ActivitiesResponse = self.send(builder).await?;

        if body.success {
            Ok(body.activities)
        } else {
            Err(ClientError::Api(
                body.message
                    .unwrap_or_else(|| "failed to fetch activities".to_string()),
            ))
        }
    }

    pub async fn cleanup_activities(&self, user_id: &str) -> ClientResult<CleanupResult> {
        let builder = self
            .request(Method::POST, "activities/cleanup")
            .json(&CleanupRequest { user_id });

        match self.send::<CleanupResponse>(builder).await? {
            CleanupResponse::Completed {
                success: true,
                result,
            } => Ok(result),
            CleanupResponse::Completed { success: false, .. } => {
                Err(ClientError::Api("cleanup was not confirmed by the server".into()))
            }
            CleanupResponse::Failed { error } => Err(ClientError::Api(error)),
        }
    }

    pub async fn get_config(&self, user_id: &str) -> ClientResult<MirrorConfigView> {
        let builder = self
            .request(Method::GET, "config")
            .query(&[("userId", user_id)]);
        self.send(builder).await
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.inner
            .request(method, self.join_path(path))
            .header(header::ACCEPT, "application/json")
    }

    fn join_path(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<T>(&self, builder: reqwest::RequestBuilder) -> ClientResult<T>
    where
        T: DeserializeOwned,
    {
        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        decode_body(status, &bytes)
    }
}

fn normalize_base_url(input: &str) -> String {
    input.trim_end_matches('/').to_string()
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn decode_body<T>(status: StatusCode, bytes: &[u8]) -> ClientResult<T>
where
    T: DeserializeOwned,
{
    if bytes.is_empty() {
        return Err(ClientError::EmptyResponse(status));
    }

    if status.is_success() {
        return serde_json::from_slice(bytes).map_err(ClientError::from);
    }

    match serde_json::from_slice::<ErrorBody>(bytes) {
        Ok(ErrorBody {
            error: Some(message),
            ..
        })
        | Ok(ErrorBody {
            message: Some(message),
            ..
        }) => Err(ClientError::Status { status, message }),
        _ => Err(ClientError::UnexpectedStatus {
            status,
            body: bytes.to_vec(),
        }),
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Api(String),
    #[error("{status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("empty response body: {0}")]
    EmptyResponse(StatusCode),
    #[error("unexpected status {status}: {body:?}")]
    UnexpectedStatus { status: StatusCode, body: Vec<u8> },
    #[error(transparent)]
    Setup(#[from] anyhow::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::EmptyResponse(status) => Some(*status),
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 面向用户的简短描述。
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) => "无法连接服务器，请检查网络后重试".to_string(),
            Self::Decode(_) => "服务器返回了无法解析的数据".to_string(),
            Self::Api(message) | Self::Status { message, .. } => message.clone(),
            Self::EmptyResponse(status) | Self::UnexpectedStatus { status, .. } => {
                http_status_advice(status.as_u16()).to_string()
            }
            Self::Setup(err) => err.to_string(),
        }
    }
}

fn http_status_advice(status: u16) -> &'static str {
    match status {
        401 => "401 未授权：登录状态已失效，请重新登录。",
        403 => "403 权限不足：当前账号无权访问活动记录。",
        404 => "404 未找到：请确认 API 地址配置正确。",
        429 => "429 频率受限：请稍候重试。",
        500..=599 => "服务器内部错误，请稍后重试。",
        _ => "请求失败，请稍后重试。",
    }
}

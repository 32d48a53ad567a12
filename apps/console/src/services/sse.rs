use thiserror::Error;

use crate::models::MirrorEvent;

#[derive(Clone, Copy, Debug)]
pub struct SseConnectOptions {
    pub heartbeat_timeout_ms: u64,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
}

impl Default for SseConnectOptions {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: 30_000,
            retry_base_ms: 1_000,
            retry_max_ms: 10_000,
        }
    }
}

impl SseConnectOptions {
    /// 下一次重连的等待时间与更新后的退避值。
    pub fn next_backoff(&self, current_ms: u64) -> (u64, u64) {
        let ceiling = self.retry_max_ms.max(1_000);
        let delay = current_ms.max(self.retry_base_ms.max(500)).min(ceiling);
        (delay, (delay * 2).min(ceiling))
    }
}

pub struct SseCallbacks {
    pub on_open: Box<dyn Fn() + 'static>,
    pub on_event: Box<dyn Fn(MirrorEvent) + 'static>,
    pub on_error: Box<dyn Fn(String) + 'static>,
}

impl SseCallbacks {
    pub fn new(
        on_open: impl Fn() + 'static,
        on_event: impl Fn(MirrorEvent) + 'static,
        on_error: impl Fn(String) + 'static,
    ) -> Self {
        Self {
            on_open: Box::new(on_open),
            on_event: Box::new(on_event),
            on_error: Box::new(on_error),
        }
    }
}

#[derive(Debug, Error)]
pub enum SseError {
    #[error("事件流初始化失败: {0}")]
    EventSourceInit(String),
    #[error("事件流在当前平台未实现: {0}")]
    Unsupported(String),
}

/// 解析一条推送消息。心跳和空消息返回 `Ok(None)`，格式不符返回错误。
pub fn parse_event_payload(data: &str) -> Result<Option<MirrorEvent>, serde_json::Error> {
    let trimmed = data.trim();
    if trimmed.is_empty() || trimmed == "ping" || trimmed == "null" {
        return Ok(None);
    }
    serde_json::from_str(trimmed).map(Some)
}

pub struct SseHandle {
    #[cfg(target_arch = "wasm32")]
    inner: std::rc::Rc<wasm::SseInner>,
}

impl SseHandle {
    pub fn close(&self) {
        #[cfg(target_arch = "wasm32")]
        self.inner.close();
    }
}

impl Drop for SseHandle {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct SseClient;

impl SseClient {
    pub fn connect(
        url: &str,
        callbacks: SseCallbacks,
        options: SseConnectOptions,
    ) -> Result<SseHandle, SseError> {
        #[cfg(target_arch = "wasm32")]
        {
            let inner = wasm::SseInner::new(url, callbacks, options)?;
            inner.connect();
            Ok(SseHandle { inner })
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = (url, callbacks, options);
            Err(SseError::Unsupported(
                "仅 wasm32 目标支持 EventSource".into(),
            ))
        }
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm {
    use super::{parse_event_payload, SseCallbacks, SseConnectOptions, SseError};
    use gloo_timers::callback::{Interval, Timeout};
    use js_sys::Date;
    use std::cell::{Cell, RefCell};
    use std::rc::{Rc, Weak};
    use wasm_bindgen::{closure::Closure, JsCast};
    use web_sys::{Event, EventSource, MessageEvent};

    /// 一次 EventSource 连接及其回调。回调只持有 `Weak`，连接销毁时一并释放。
    struct Connection {
        source: EventSource,
        _on_open: Closure<dyn FnMut(Event)>,
        _on_error: Closure<dyn FnMut(Event)>,
        _on_message: Closure<dyn FnMut(MessageEvent)>,
        heartbeat: Option<Interval>,
    }

    impl Drop for Connection {
        fn drop(&mut self) {
            self.source.set_onopen(None);
            self.source.set_onerror(None);
            self.source.set_onmessage(None);
            self.source.close();
            if let Some(interval) = self.heartbeat.take() {
                interval.cancel();
            }
        }
    }

    pub struct SseInner {
        url: String,
        callbacks: SseCallbacks,
        options: SseConnectOptions,
        connection: RefCell<Option<Connection>>,
        // 在自身回调里断开的连接先放到这里，等下一次连接或关闭时再释放
        retired: RefCell<Option<Connection>>,
        reconnect_timer: RefCell<Option<Timeout>>,
        last_event_ms: Cell<f64>,
        backoff_ms: Cell<u64>,
        closed: Cell<bool>,
    }

    impl SseInner {
        pub fn new(
            url: &str,
            callbacks: SseCallbacks,
            options: SseConnectOptions,
        ) -> Result<Rc<Self>, SseError> {
            if url.trim().is_empty() {
                return Err(SseError::EventSourceInit("URL 为空".into()));
            }

            Ok(Rc::new(Self {
                url: url.to_string(),
                callbacks,
                options,
                connection: RefCell::new(None),
                retired: RefCell::new(None),
                reconnect_timer: RefCell::new(None),
                last_event_ms: Cell::new(Date::now()),
                backoff_ms: Cell::new(options.retry_base_ms.max(500)),
                closed: Cell::new(false),
            }))
        }

        pub fn connect(self: &Rc<Self>) {
            if self.closed.get() {
                return;
            }
            self.retired.replace(None);

            match EventSource::new(&self.url) {
                Ok(source) => {
                    self.last_event_ms.set(Date::now());
                    let connection = self.attach(source);
                    self.connection.replace(Some(connection));
                }
                Err(err) => {
                    let reason = describe(&err);
                    (self.callbacks.on_error)(format!("事件流连接失败: {reason}"));
                    self.schedule_reconnect();
                }
            }
        }

        pub fn close(&self) {
            self.closed.set(true);
            self.connection.replace(None);
            self.retired.replace(None);
            if let Some(timer) = self.reconnect_timer.borrow_mut().take() {
                timer.cancel();
            }
        }

        fn attach(self: &Rc<Self>, source: EventSource) -> Connection {
            let weak = Rc::downgrade(self);
            let on_open = Closure::<dyn FnMut(Event)>::new(move |_evt: Event| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_open();
                }
            });
            source.set_onopen(Some(on_open.as_ref().unchecked_ref()));

            let weak = Rc::downgrade(self);
            let on_error = Closure::<dyn FnMut(Event)>::new(move |_evt: Event| {
                if let Some(inner) = weak.upgrade() {
                    inner.drop_connection("事件流连接中断，准备重试");
                }
            });
            source.set_onerror(Some(on_error.as_ref().unchecked_ref()));

            let weak = Rc::downgrade(self);
            let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |evt: MessageEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_message(evt);
                }
            });
            source.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

            Connection {
                source,
                _on_open: on_open,
                _on_error: on_error,
                _on_message: on_message,
                heartbeat: None,
            }
        }

        fn handle_open(self: &Rc<Self>) {
            self.backoff_ms.set(self.options.retry_base_ms.max(500));
            self.last_event_ms.set(Date::now());
            let heartbeat = self.heartbeat();
            if let Some(connection) = self.connection.borrow_mut().as_mut() {
                connection.heartbeat = Some(heartbeat);
            }
            (self.callbacks.on_open)();
        }

        fn handle_message(&self, evt: MessageEvent) {
            if self.closed.get() {
                return;
            }
            self.last_event_ms.set(Date::now());

            let Some(data) = evt.data().as_string() else {
                tracing::warn!("ignoring non-text event stream payload");
                return;
            };

            match parse_event_payload(&data) {
                Ok(Some(event)) => (self.callbacks.on_event)(event),
                Ok(None) => {}
                Err(err) => tracing::warn!(%err, "dropping malformed mirror event"),
            }
        }

        /// 由连接自己的回调触发，因此不能在这里释放回调本身。
        fn drop_connection(self: &Rc<Self>, reason: &str) {
            if self.closed.get() {
                return;
            }
            (self.callbacks.on_error)(reason.to_string());
            let current = self.connection.borrow_mut().take();
            if let Some(connection) = current {
                connection.source.close();
                self.retired.replace(Some(connection));
            }
            self.schedule_reconnect();
        }

        fn schedule_reconnect(self: &Rc<Self>) {
            if self.closed.get() {
                return;
            }

            let (delay, next) = self.options.next_backoff(self.backoff_ms.get());
            self.backoff_ms.set(next);
            tracing::debug!(delay, "scheduling event stream reconnect");

            let weak = Rc::downgrade(self);
            let timer = Timeout::new(delay as u32, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.connect();
                }
            });
            if let Some(previous) = self.reconnect_timer.replace(Some(timer)) {
                previous.cancel();
            }
        }

        fn heartbeat(self: &Rc<Self>) -> Interval {
            let timeout_ms = self.options.heartbeat_timeout_ms.max(5_000);
            let weak = Rc::downgrade(self);
            Interval::new((timeout_ms / 2) as u32, move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let elapsed = Date::now() - inner.last_event_ms.get();
                if elapsed > timeout_ms as f64 {
                    inner.drop_connection("事件流心跳超时，尝试重新连接");
                }
            })
        }
    }

    fn describe(value: &wasm_bindgen::JsValue) -> String {
        if let Some(text) = value.as_string() {
            return text;
        }
        js_sys::JSON::stringify(value)
            .ok()
            .and_then(|js| js.as_string())
            .unwrap_or_else(|| "未知错误".into())
    }
}

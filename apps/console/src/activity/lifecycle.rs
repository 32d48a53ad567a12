use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Default)]
struct LifecycleInner {
    cancelled: Cell<bool>,
    generation: Cell<u64>,
}

/// 活动视图的生命周期令牌。视图卸载时调用 [`ViewLifecycle::cancel`]，
/// 之后所有尚未完成的异步操作在返回时都会被丢弃。
#[derive(Clone, Debug, Default)]
pub struct ViewLifecycle {
    inner: Rc<LifecycleInner>,
}

impl PartialEq for ViewLifecycle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl ViewLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.set(true);
    }

    pub fn is_alive(&self) -> bool {
        !self.inner.cancelled.get()
    }

    /// 为一次快照拉取登记新的代号，之前发出的拉取随即过期（后发请求优先）。
    pub fn begin_fetch(&self) -> FetchTicket {
        let generation = self.inner.generation.get() + 1;
        self.inner.generation.set(generation);
        FetchTicket {
            lifecycle: self.clone(),
            generation,
        }
    }

    pub fn guard(&self) -> LivenessGuard {
        LivenessGuard {
            lifecycle: self.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FetchTicket {
    lifecycle: ViewLifecycle,
    generation: u64,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 视图仍存活，且期间没有发出更新的拉取。
    pub fn is_current(&self) -> bool {
        self.lifecycle.is_alive() && self.lifecycle.inner.generation.get() == self.generation
    }
}

/// 不参与代号竞争的操作（例如清理）只关心视图是否仍存活。
#[derive(Clone, Debug)]
pub struct LivenessGuard {
    lifecycle: ViewLifecycle,
}

impl LivenessGuard {
    pub fn is_alive(&self) -> bool {
        self.lifecycle.is_alive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_fetch_supersedes_older_one() {
        let lifecycle = ViewLifecycle::new();
        let first = lifecycle.begin_fetch();
        let second = lifecycle.begin_fetch();
        assert!(!first.is_current());
        assert!(second.is_current());
        assert!(second.generation() > first.generation());
    }

    #[test]
    fn cancel_discards_every_pending_completion() {
        let lifecycle = ViewLifecycle::new();
        let ticket = lifecycle.begin_fetch();
        let guard = lifecycle.guard();
        lifecycle.cancel();
        assert!(!ticket.is_current());
        assert!(!guard.is_alive());
    }

    #[test]
    fn separate_views_do_not_share_state() {
        let first = ViewLifecycle::new();
        let second = ViewLifecycle::new();
        let ticket = second.begin_fetch();
        first.cancel();
        assert!(ticket.is_current());
        assert_ne!(first, second);
        assert_eq!(first, first.clone());
    }
}

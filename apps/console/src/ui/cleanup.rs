use dioxus::prelude::*;

use crate::state::{AppActions, CleanupPhase};

#[derive(Props, Clone)]
#[props(no_eq)]
pub struct CleanupButtonProps {
    pub phase: CleanupPhase,
    pub disabled: bool,
    pub actions: AppActions,
}

impl PartialEq for CleanupButtonProps {
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

impl Eq for CleanupButtonProps {}

#[component]
pub fn CleanupButton(props: CleanupButtonProps) -> Element {
    let actions = props.actions;
    let in_flight = props.phase == CleanupPhase::InFlight;

    rsx! {
        button {
            class: "rounded border border-red-200 bg-white px-3 py-1 text-xs text-red-600 hover:bg-red-50 disabled:cursor-not-allowed disabled:opacity-50",
            disabled: props.disabled || in_flight,
            onclick: move |_| actions.request_cleanup(),
            if in_flight { "清理中…" } else { "清理记录" }
        }
    }
}

#[derive(Props, Clone)]
#[props(no_eq)]
pub struct CleanupDialogProps {
    pub phase: CleanupPhase,
    pub entry_count: usize,
    pub on_confirm: Callback<()>,
    pub actions: AppActions,
}

impl PartialEq for CleanupDialogProps {
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

impl Eq for CleanupDialogProps {}

/// 清理确认框。请求发出后保持打开并禁用按钮，直到服务端返回。
#[component]
pub fn CleanupDialog(props: CleanupDialogProps) -> Element {
    if props.phase == CleanupPhase::Idle {
        return rsx! { Fragment {} };
    }

    let actions = props.actions;
    let on_confirm = props.on_confirm;
    let in_flight = props.phase == CleanupPhase::InFlight;
    let count = props.entry_count;

    rsx! {
        div { class: "fixed inset-0 z-40 flex items-center justify-center bg-slate-900/40",
            div { class: "w-96 space-y-4 rounded-lg bg-white p-6 shadow-xl",
                h2 { class: "text-base font-semibold text-slate-900", "确认清理活动记录" }
                p { class: "text-sm text-slate-600",
                    "将删除服务器上的全部镜像任务与事件记录（当前显示 {count} 条），该操作无法撤销。"
                }
                div { class: "flex justify-end gap-2",
                    button {
                        class: "rounded border border-slate-300 bg-white px-3 py-1 text-xs text-slate-700 hover:bg-slate-100 disabled:opacity-50",
                        disabled: in_flight,
                        onclick: move |_| actions.dismiss_cleanup(),
                        "取消"
                    }
                    button {
                        class: "rounded bg-red-600 px-3 py-1 text-xs font-semibold text-white hover:bg-red-500 disabled:cursor-not-allowed disabled:opacity-50",
                        disabled: in_flight,
                        onclick: move |_| on_confirm.call(()),
                        if in_flight { "正在清理…" } else { "确认清理" }
                    }
                }
            }
        }
    }
}

//! 运行状态机
//!
//! `Init → Authenticating → Paging → Done`，任何致命事件进入 `Aborted`。
//! [`transition`] 是 (状态, 事件) 的纯函数，终止态吸收所有事件。

use std::fmt;

/// 中止原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// 无法打开起始页
    NavigationFailed(String),
    /// 登录失败
    AuthenticationFailed(String),
    /// 翻页失败（控件缺失、等待超时等）
    PaginationFailed(String),
    /// 页面读取失败
    ExtractionFailed(String),
    /// 上传失败且策略为立即中止
    UploadFailed(String),
    /// 当前状态不接受该事件
    UnexpectedEvent(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::NavigationFailed(r) => write!(f, "打开起始页失败: {}", r),
            AbortReason::AuthenticationFailed(r) => write!(f, "登录失败: {}", r),
            AbortReason::PaginationFailed(r) => write!(f, "翻页失败: {}", r),
            AbortReason::ExtractionFailed(r) => write!(f, "数据抽取失败: {}", r),
            AbortReason::UploadFailed(r) => write!(f, "上传失败: {}", r),
            AbortReason::UnexpectedEvent(r) => write!(f, "非法状态转换: {}", r),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Init,
    Authenticating,
    Paging,
    Done,
    Aborted(AbortReason),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Init => f.write_str("Init"),
            RunState::Authenticating => f.write_str("Authenticating"),
            RunState::Paging => f.write_str("Paging"),
            RunState::Done => f.write_str("Done"),
            RunState::Aborted(reason) => write!(f, "Aborted ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// 已导航到起始页
    Started,
    StartFailed(String),
    AuthSucceeded,
    AuthFailed(String),
    /// 翻到了新页面
    PageAdvanced,
    /// 自然结束（位置未变、循环、达到上限）
    PagingTerminated,
    PaginationFailed(String),
    ExtractionFailed(String),
    /// 上传失败，`abort` 表示策略要求中止
    UploadFailed { reason: String, abort: bool },
}

pub fn transition(state: &RunState, event: RunEvent) -> RunState {
    use RunEvent as E;
    use RunState as S;

    match (state, event) {
        (S::Done, _) => S::Done,
        (S::Aborted(reason), _) => S::Aborted(reason.clone()),

        (S::Init, E::Started) => S::Authenticating,
        (S::Init, E::StartFailed(r)) => S::Aborted(AbortReason::NavigationFailed(r)),

        (S::Authenticating, E::AuthSucceeded) => S::Paging,
        (S::Authenticating, E::AuthFailed(r)) => S::Aborted(AbortReason::AuthenticationFailed(r)),

        (S::Paging, E::PageAdvanced) => S::Paging,
        (S::Paging, E::PagingTerminated) => S::Done,
        (S::Paging, E::PaginationFailed(r)) => S::Aborted(AbortReason::PaginationFailed(r)),
        (S::Paging, E::ExtractionFailed(r)) => S::Aborted(AbortReason::ExtractionFailed(r)),
        (S::Paging, E::UploadFailed { abort: false, .. }) => S::Paging,
        (S::Paging, E::UploadFailed { reason, abort: true }) => {
            S::Aborted(AbortReason::UploadFailed(reason))
        }

        (s, e) => S::Aborted(AbortReason::UnexpectedEvent(format!("{} 收到 {:?}", s, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_done() {
        let mut state = RunState::Init;
        for event in [
            RunEvent::Started,
            RunEvent::AuthSucceeded,
            RunEvent::PageAdvanced,
            RunEvent::PageAdvanced,
            RunEvent::PagingTerminated,
        ] {
            state = transition(&state, event);
        }
        assert_eq!(state, RunState::Done);
    }

    #[test]
    fn auth_failure_aborts() {
        let state = transition(&RunState::Authenticating, RunEvent::AuthFailed("no field".into()));
        assert_eq!(
            state,
            RunState::Aborted(AbortReason::AuthenticationFailed("no field".into()))
        );
    }

    #[test]
    fn missing_pagination_control_aborts() {
        let state = transition(&RunState::Paging, RunEvent::PaginationFailed("gone".into()));
        assert!(matches!(
            state,
            RunState::Aborted(AbortReason::PaginationFailed(_))
        ));
    }

    #[test]
    fn upload_failure_follows_policy() {
        let keep = transition(
            &RunState::Paging,
            RunEvent::UploadFailed {
                reason: "500".into(),
                abort: false,
            },
        );
        assert_eq!(keep, RunState::Paging);

        let stop = transition(
            &RunState::Paging,
            RunEvent::UploadFailed {
                reason: "500".into(),
                abort: true,
            },
        );
        assert_eq!(stop, RunState::Aborted(AbortReason::UploadFailed("500".into())));
    }

    #[test]
    fn terminal_states_absorb_events() {
        assert_eq!(transition(&RunState::Done, RunEvent::Started), RunState::Done);
        let aborted = RunState::Aborted(AbortReason::PaginationFailed("x".into()));
        assert_eq!(transition(&aborted, RunEvent::PageAdvanced), aborted);
    }

    #[test]
    fn out_of_order_event_is_rejected() {
        assert!(matches!(
            transition(&RunState::Init, RunEvent::PageAdvanced),
            RunState::Aborted(AbortReason::UnexpectedEvent(_))
        ));
    }
}

//! 에러 타입 정의
//!
//! 모든 에러는 감지된 지점에서 로그로 남기고 처리한다. 연결 태스크 밖으로 전파되지 않는다.

use thiserror::Error;

/// 프로토콜 에러 (잘못된 JSON, `type` 누락, 페이로드 형식 불일치)
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("envelope is not a JSON object")]
    NotAnObject,

    #[error("envelope has no string `type` field")]
    MissingType,

    #[error("`data` of `{0}` is not an object")]
    DataNotObject(String),

    #[error("invalid `{kind}` payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 라운드 상태 전이 거부 사유
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoundError {
    #[error("only the host may do this")]
    NotHost,

    #[error("not enough players: {have} < {need}")]
    NotEnoughPlayers { have: usize, need: usize },

    #[error("a round is already active")]
    AlreadyActive,

    #[error("no active round")]
    NotActive,

    #[error("unknown game type `{0}`")]
    UnknownGame(String),

    #[error("sender is no longer a member")]
    UnknownMember,

    #[error(transparent)]
    Action(#[from] ActionError),
}

/// 게임 액션 (선택/수집/타격) 처리 실패
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("no live entity `{0}`")]
    UnknownEntity(String),

    #[error("entity `{0}` is already resolved")]
    AlreadyResolved(String),

    #[error("two cards are already face up")]
    SelectionPending,

    #[error("the same card was selected twice")]
    SameCard,

    #[error("action does not apply to `{0}`")]
    NotApplicable(&'static str),
}

/// 재접속 핸드셰이크 실패
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconnectError {
    #[error("reconnection queue is full")]
    QueueFull,

    #[error("timed out waiting for reconnection verdict")]
    Timeout,

    #[error("no member named `{0}`")]
    NoMatch(String),

    #[error("reconnection handler has stopped")]
    HandlerGone,
}

/// 방 참여 실패
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttachError {
    #[error("room `{0}` was closed")]
    RoomClosed(String),
}

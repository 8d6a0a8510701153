//! 라운드 상태와 게임 규칙 인터페이스
//!
//! 라운드 엔진은 카운트다운, 스폰 주기, 점수, 순위를 공통으로 처리하고
//! 게임별 규칙(스폰/매치/수집 판정)은 `GameRules` 구현이 맡는다.

use crate::error::ActionError;
use crate::protocol::ServerMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RoundStatus {
    Waiting,
    Active,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    TimeUp,
    ClosedByHost,
    AllMatched,
}

/// 카드 선택 대상. 위치가 있으면 위치로, 없으면 무늬/숫자로 찾는다
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pick {
    pub suit: String,
    pub value: String,
    #[serde(default)]
    pub position_id: Option<usize>,
}

/// 디코딩이 끝난 게임 액션
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameAction {
    Select(Pick),
    SelectPair([Pick; 2]),
    Collect(String),
    Hit(String),
}

/// 지연 실행 작업 종류
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    /// 엔티티 만료 (자연 만료 또는 처리 후 정리)
    Expire(String),
    /// 맞지 않은 카드 다시 뒤집기
    Revert(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub delay: Duration,
    pub kind: JobKind,
}

/// 액션 성공 시 행위자에게 줄 점수
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Award {
    pub points: u32,
}

/// 게임 규칙 호출 한 번의 출력 (브로드캐스트할 이벤트와 예약할 작업)
#[derive(Debug)]
pub struct RoundCtx {
    pub now: Instant,
    events: Vec<ServerMessage>,
    jobs: Vec<Job>,
}

impl RoundCtx {
    pub fn new(now: Instant) -> Self {
        Self {
            now,
            events: Vec::new(),
            jobs: Vec::new(),
        }
    }

    pub fn emit(&mut self, message: ServerMessage) {
        self.events.push(message);
    }

    pub fn schedule(&mut self, delay: Duration, kind: JobKind) {
        self.jobs.push(Job { delay, kind });
    }

    pub fn into_parts(self) -> (Vec<ServerMessage>, Vec<Job>) {
        (self.events, self.jobs)
    }
}

/// 게임별 규칙. 방 잠금 안에서만 호출된다
pub trait GameRules: Send + 'static {
    fn game_type(&self) -> &'static str;

    fn duration_secs(&self) -> u32;

    /// 스폰 주기. `None`이면 스폰 틱을 돌리지 않는다 (카드를 미리 깔아두는 게임)
    fn spawn_interval(&self) -> Option<Duration> {
        None
    }

    /// 정규화된 설정 (라운드 시작 이벤트에 실림)
    fn settings(&self) -> Value;

    /// 현재 엔티티 배치
    fn snapshot(&self) -> Value;

    fn on_spawn_tick(&mut self, _ctx: &mut RoundCtx) {}

    fn on_job(&mut self, job: JobKind, ctx: &mut RoundCtx);

    fn handle_action(
        &mut self,
        action: GameAction,
        actor: &str,
        ctx: &mut RoundCtx,
    ) -> Result<Option<Award>, ActionError>;

    /// 더 진행할 것이 없으면 true (모든 카드 매치 등)
    fn is_complete(&self) -> bool {
        false
    }

    /// 라운드 범위 엔티티 상태 비우기
    fn clear(&mut self);
}

/// 진행 중이거나 끝난 라운드
pub struct Round {
    pub game: Box<dyn GameRules>,
    pub status: RoundStatus,
    pub time_left: u32,
    /// 이 라운드의 모든 타이머가 묶인 토큰 (방 정지 토큰의 자식)
    pub token: CancellationToken,
}

impl Round {
    pub fn new(game: Box<dyn GameRules>, token: CancellationToken) -> Self {
        let time_left = game.duration_secs();
        Self {
            game,
            status: RoundStatus::Active,
            time_left,
            token,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RoundStatus::Active
    }

    pub fn game_type(&self) -> &'static str {
        self.game.game_type()
    }
}

impl std::fmt::Debug for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Round")
            .field("game", &self.game.game_type())
            .field("status", &self.status)
            .field("time_left", &self.time_left)
            .finish()
    }
}

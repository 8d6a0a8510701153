//! 서버 → 클라이언트 메시지 정의
//!
//! 모든 메시지는 `{"type": ..., "data": {...}}` 형식으로 직렬화된다.

use crate::engine::ranking::Standing;
use crate::engine::EndReason;
use crate::games::memory::Card;
use crate::games::red_envelope::EnvelopeView;
use crate::games::whack_mole::MoleView;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// 서버 → 클라이언트 메시지
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    // Connection
    Connected {
        session_id: Uuid,
        member_id: Uuid,
        room_id: String,
        is_host: bool,
    },
    Waiting {
        message: String,
    },
    GameState {
        game_type: String,
        time_left: u32,
        snapshot: Value,
    },

    // Membership
    PlayerJoined {
        player: PlayerInfo,
        total_players: usize,
    },
    PlayerLeft {
        nickname: String,
        total_players: usize,
    },
    HostChanged {
        nickname: String,
    },
    PlayerListUpdate {
        players: Vec<PlayerInfo>,
        player_count: usize,
    },

    // Platform
    PlatformNotification {
        message: String,
        game_type: Option<String>,
        room_id: String,
    },
    PlatformGameStarted {
        game_type: String,
        room_id: String,
        message: String,
    },

    // Round lifecycle
    GameStarted {
        game_type: String,
        time_left: u32,
        settings: Value,
        layout: Value,
    },
    TimeUpdate {
        time_left: u32,
    },
    GameEnded {
        game_type: String,
        reason: EndReason,
        rankings: Vec<Standing>,
    },
    /// 호스트가 라운드를 닫았을 때 `gameEnded` 뒤에 보낸다
    GameClosed {
        message: String,
    },

    // Memory cards
    CardFlipped {
        card: Card,
        player: String,
    },
    CardsFlipped {
        cards: Vec<Card>,
        player: String,
    },
    CardsMatched {
        cards: Vec<Card>,
        player: String,
    },
    CardsFlippedBack {
        cards: Vec<Card>,
    },

    // Red envelopes
    NewEnvelope {
        envelope: EnvelopeView,
    },
    EnvelopeCollected {
        envelope_id: String,
        value: u32,
        player: String,
    },
    EnvelopeRemoved {
        envelope_id: String,
    },

    // Whack-a-mole
    MoleSpawned {
        mole: MoleView,
    },
    MoleHit {
        mole_id: String,
        position: usize,
        player: String,
    },
    MoleHidden {
        mole_id: String,
        position: usize,
    },

    // Scores
    ScoreUpdate {
        player_id: String,
        nickname: String,
        score: u32,
    },
    RankingUpdate {
        rankings: Vec<Standing>,
    },
}

impl ServerMessage {
    /// 로그용 메시지 타입 이름
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Waiting { .. } => "waiting",
            Self::GameState { .. } => "gameState",
            Self::PlayerJoined { .. } => "playerJoined",
            Self::PlayerLeft { .. } => "playerLeft",
            Self::HostChanged { .. } => "hostChanged",
            Self::PlayerListUpdate { .. } => "playerListUpdate",
            Self::PlatformNotification { .. } => "platformNotification",
            Self::PlatformGameStarted { .. } => "platformGameStarted",
            Self::GameStarted { .. } => "gameStarted",
            Self::TimeUpdate { .. } => "timeUpdate",
            Self::GameEnded { .. } => "gameEnded",
            Self::GameClosed { .. } => "gameClosed",
            Self::CardFlipped { .. } => "cardFlipped",
            Self::CardsFlipped { .. } => "cardsFlipped",
            Self::CardsMatched { .. } => "cardsMatched",
            Self::CardsFlippedBack { .. } => "cardsFlippedBack",
            Self::NewEnvelope { .. } => "newEnvelope",
            Self::EnvelopeCollected { .. } => "envelopeCollected",
            Self::EnvelopeRemoved { .. } => "envelopeRemoved",
            Self::MoleSpawned { .. } => "moleSpawned",
            Self::MoleHit { .. } => "moleHit",
            Self::MoleHidden { .. } => "moleHidden",
            Self::ScoreUpdate { .. } => "scoreUpdate",
            Self::RankingUpdate { .. } => "rankingUpdate",
        }
    }
}

/// 플레이어 정보 (브로드캐스트 및 HTTP 응답)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub nickname: String,
    pub id: String,
    pub is_host: bool,
    pub score: u32,
    pub avatar: String,
}

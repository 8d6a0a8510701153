//! 플랫폼 메시지 (참여, 공지, 게임 시작/종료, 점수 보고)

use super::dispatcher::{Dispatcher, HandlerCtx};
use crate::engine::SettingsMap;
use crate::error::RoundError;
use crate::games::memory;
use crate::protocol::ServerMessage;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyPlayers {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub game_type: Option<String>,
}

/// `hostStartGame`. `gameType` 외의 필드는 모두 게임 설정으로 넘긴다
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGame {
    #[serde(default = "default_game_type")]
    pub game_type: String,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameWithNotification {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "default_game_type")]
    pub game_type: String,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

/// 클라이언트 점수 보고 (반영하지 않음)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreClaim {
    #[serde(default)]
    pub score: Option<Value>,
    #[serde(default)]
    pub total_score: Option<Value>,
}

fn default_game_type() -> String {
    memory::GAME_TYPE.to_string()
}

/// 플랫폼 메시지 중 레지스트리로 가는 것들 등록
pub fn register(dispatcher: &Dispatcher) {
    dispatcher.register("hostStartGame", handle_start_game);
    dispatcher.register("startGameWithNotification", handle_start_with_notification);
    dispatcher.register("scoreUpdate", handle_score_claim);
    dispatcher.register("redEnvelopeScoreUpdate", handle_score_claim);
}

pub async fn handle_join(ctx: HandlerCtx) {
    ctx.room.greet(ctx.sender).await;
}

pub async fn handle_notify(ctx: HandlerCtx, message: NotifyPlayers) {
    let notification = ServerMessage::PlatformNotification {
        message: message.message,
        game_type: message.game_type,
        room_id: ctx.room.id().to_string(),
    };
    if let Err(err) = ctx.room.notify(ctx.sender, vec![notification]).await {
        log_refusal(&ctx, "notifyPlatformPlayers", &err);
    }
}

pub async fn handle_close_game(ctx: HandlerCtx) {
    if let Err(err) = ctx.room.close_round(ctx.sender).await {
        log_refusal(&ctx, "hostCloseGame", &err);
    }
}

async fn handle_start_game(ctx: HandlerCtx, message: StartGame) {
    if let Err(err) = start_game(&ctx, &message.game_type, message.settings).await {
        log_refusal(&ctx, "hostStartGame", &err);
    }
}

async fn handle_start_with_notification(ctx: HandlerCtx, message: StartGameWithNotification) {
    let room_id = ctx.room.id().to_string();
    let text = message
        .message
        .unwrap_or_else(|| format!("Starting {}", message.game_type));
    let notices = vec![
        ServerMessage::PlatformNotification {
            message: text.clone(),
            game_type: Some(message.game_type.clone()),
            room_id: room_id.clone(),
        },
        ServerMessage::PlatformGameStarted {
            game_type: message.game_type.clone(),
            room_id,
            message: text,
        },
    ];

    let result = match ctx.room.notify(ctx.sender, notices).await {
        Ok(()) => start_game(&ctx, &message.game_type, message.settings).await,
        Err(err) => Err(err),
    };
    if let Err(err) = result {
        log_refusal(&ctx, "startGameWithNotification", &err);
    }
}

async fn handle_score_claim(ctx: HandlerCtx, claim: ScoreClaim) {
    let claimed = claim
        .total_score
        .or(claim.score)
        .and_then(|value| value.as_f64())
        .map(|value| value.max(0.0).round() as u64);
    ctx.room.echo_score(ctx.sender, claimed).await;
}

async fn start_game(
    ctx: &HandlerCtx,
    game_type: &str,
    settings: Map<String, Value>,
) -> Result<(), RoundError> {
    let settings = SettingsMap::new(settings);
    let game = ctx.state.catalog.create(game_type, &settings)?;
    ctx.room
        .start_round(ctx.sender, game, ctx.state.config.room.min_players_to_start)
        .await
}

fn log_refusal(ctx: &HandlerCtx, kind: &str, err: &RoundError) {
    match err {
        RoundError::NotHost => {
            tracing::warn!(room_id = %ctx.room.id(), member_id = %ctx.sender, kind = %kind, "Host-only action refused");
        }
        _ => {
            tracing::info!(room_id = %ctx.room.id(), member_id = %ctx.sender, kind = %kind, reason = %err, "Action ignored");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::protocol::ClientEnvelope;
    use crate::room::tests::Client;
    use crate::room::Attached;
    use crate::state::AppState;
    use std::sync::Arc;

    struct Lobby {
        state: Arc<AppState>,
        host: (Client, Attached),
        player: (Client, Attached),
    }

    impl Lobby {
        async fn new() -> Self {
            let state = Arc::new(AppState::new(Config::default()));
            let host = Client::new();
            let player = Client::new();
            let (_, h) = state.rooms.join("party", host.request("host", true)).await.expect("join");
            let (_, p) = state.rooms.join("party", player.request("amy", false)).await.expect("join");
            let mut lobby = Self {
                state,
                host: (host, h),
                player: (player, p),
            };
            lobby.host.0.drain();
            lobby.player.0.drain();
            lobby
        }

        async fn send(&self, from: &Attached, text: &str) {
            let ctx = HandlerCtx {
                state: self.state.clone(),
                room: self.state.rooms.get("party").expect("room"),
                sender: from.member_id,
            };
            let envelope = ClientEnvelope::parse(text).expect("envelope");
            self.state.dispatcher.dispatch(ctx, envelope).await;
        }

        async fn round_active(&self) -> bool {
            let room = self.state.rooms.get("party").expect("room");
            room.info().await.game_started
        }
    }

    #[tokio::test]
    async fn host_start_routes_by_game_type() {
        let mut lobby = Lobby::new().await;
        let host = lobby.host.1;
        lobby
            .send(&host, r#"{"type":"hostStartGame","data":{"gameType":"whackmole","duration":30}}"#)
            .await;

        let frames = lobby.player.0.drain();
        assert_eq!(frames[0]["type"], "gameStarted");
        assert_eq!(frames[0]["data"]["gameType"], "whackmole");
        assert_eq!(frames[0]["data"]["timeLeft"], 30);
        assert_eq!(frames[0]["data"]["layout"]["holes"].as_array().map(Vec::len), Some(9));
    }

    #[tokio::test]
    async fn legacy_game_settings_are_merged() {
        let mut lobby = Lobby::new().await;
        let host = lobby.host.1;
        lobby
            .send(
                &host,
                r#"{"type":"hostStartGame","data":{"gameType":"memory","gameSettings":{"numPairs":3}}}"#,
            )
            .await;

        let frames = lobby.player.0.drain();
        assert_eq!(frames[0]["data"]["settings"]["numPairs"], 3);
        assert_eq!(frames[0]["data"]["layout"]["cards"].as_array().map(Vec::len), Some(6));
    }

    #[tokio::test]
    async fn non_host_start_and_unknown_game_are_refused() {
        let mut lobby = Lobby::new().await;
        let (host, player) = (lobby.host.1, lobby.player.1);

        lobby.send(&player, r#"{"type":"hostStartGame","data":{"gameType":"memory"}}"#).await;
        lobby.send(&host, r#"{"type":"hostStartGame","data":{"gameType":"chess"}}"#).await;

        assert!(!lobby.round_active().await);
        assert!(lobby.player.0.drain().is_empty());
    }

    #[tokio::test]
    async fn start_with_notification_announces_first() {
        let mut lobby = Lobby::new().await;
        let host = lobby.host.1;
        lobby
            .send(
                &host,
                r#"{"type":"startGameWithNotification","data":{"gameType":"redenvelope","message":"Go!"}}"#,
            )
            .await;

        let kinds = lobby.player.0.drain_kinds();
        assert_eq!(kinds, vec!["platformNotification", "platformGameStarted", "gameStarted"]);
    }

    #[tokio::test]
    async fn score_claim_from_player_changes_nothing() {
        let mut lobby = Lobby::new().await;
        let (host, player) = (lobby.host.1, lobby.player.1);
        lobby.send(&host, r#"{"type":"hostStartGame","data":{"gameType":"memory"}}"#).await;
        lobby.host.0.drain();
        lobby.player.0.drain();

        lobby.send(&player, r#"{"type":"scoreUpdate","data":{"score":500}}"#).await;
        lobby
            .send(&player, r#"{"type":"redEnvelopeScoreUpdate","data":{"data":{"totalScore":70}}}"#)
            .await;

        assert!(lobby.host.0.drain().is_empty());
        let frames = lobby.player.0.drain();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f["type"] == "scoreUpdate" && f["data"]["score"] == 0));

        let room = lobby.state.rooms.get("party").expect("room");
        assert!(room.members().await.iter().all(|m| m.score == 0));
    }

    #[tokio::test]
    async fn close_game_ends_round_for_host_only() {
        let mut lobby = Lobby::new().await;
        let (host, player) = (lobby.host.1, lobby.player.1);
        lobby.send(&host, r#"{"type":"hostStartGame","data":{"gameType":"memory"}}"#).await;

        lobby.send(&player, r#"{"type":"hostCloseGame"}"#).await;
        assert!(lobby.round_active().await);

        lobby.send(&host, r#"{"type":"hostCloseGame"}"#).await;
        assert!(!lobby.round_active().await);
        let kinds = lobby.player.0.drain_kinds();
        assert_eq!(kinds[kinds.len() - 2..], ["gameEnded", "gameClosed"]);
        let host_kinds = lobby.host.0.drain_kinds();
        assert_eq!(host_kinds.last().map(String::as_str), Some("gameEnded"));
    }

    #[tokio::test]
    async fn notify_reaches_everyone() {
        let mut lobby = Lobby::new().await;
        let host = lobby.host.1;
        lobby
            .send(&host, r#"{"type":"notifyPlatformPlayers","data":{"message":"Get ready","gameType":"memory"}}"#)
            .await;

        for client in [&mut lobby.host.0, &mut lobby.player.0] {
            let frames = client.drain();
            assert_eq!(frames[0]["type"], "platformNotification");
            assert_eq!(frames[0]["data"]["message"], "Get ready");
            assert_eq!(frames[0]["data"]["roomId"], "party");
        }
    }

    #[tokio::test]
    async fn join_message_replies_with_round_state() {
        let mut lobby = Lobby::new().await;
        let (host, player) = (lobby.host.1, lobby.player.1);
        lobby.send(&host, r#"{"type":"hostStartGame","data":{"gameType":"memory","numPairs":2}}"#).await;
        lobby.player.0.drain();

        lobby.send(&player, r#"{"type":"join"}"#).await;
        let frames = lobby.player.0.drain();
        assert_eq!(frames[0]["type"], "gameState");
        assert_eq!(frames[0]["data"]["snapshot"]["cards"].as_array().map(Vec::len), Some(4));
        assert_eq!(frames[1]["type"], "playerListUpdate");
    }
}

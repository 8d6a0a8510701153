//! 게임 카탈로그와 게임별 메시지 등록

pub mod memory;
pub mod red_envelope;
pub mod whack_mole;

use crate::engine::{GameAction, GameRules, Pick, SettingsMap};
use crate::error::RoundError;
use crate::handlers::dispatcher::{Dispatcher, HandlerCtx};
use serde::Deserialize;
use std::collections::BTreeMap;

/// 설정으로 새 게임 규칙 인스턴스를 만드는 함수
pub type GameFactory = fn(&SettingsMap) -> Box<dyn GameRules>;

/// `gameType` → 게임 생성 함수
pub struct GameCatalog {
    factories: BTreeMap<&'static str, GameFactory>,
}

impl GameCatalog {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// 기본 게임 세 종류가 등록된 카탈로그
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        catalog.register(memory::GAME_TYPE, memory::create);
        catalog.register(red_envelope::GAME_TYPE, red_envelope::create);
        catalog.register(whack_mole::GAME_TYPE, whack_mole::create);
        catalog
    }

    pub fn register(&mut self, game_type: &'static str, factory: GameFactory) {
        if self.factories.insert(game_type, factory).is_some() {
            tracing::warn!(game_type = %game_type, "Game factory overwritten");
        }
    }

    pub fn create(
        &self,
        game_type: &str,
        settings: &SettingsMap,
    ) -> Result<Box<dyn GameRules>, RoundError> {
        let factory = self
            .factories
            .get(game_type)
            .ok_or_else(|| RoundError::UnknownGame(game_type.to_string()))?;
        Ok(factory(settings))
    }

    pub fn game_types(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

#[derive(Debug, Deserialize)]
struct TwoCards {
    cards: [Pick; 2],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectEnvelope {
    envelope_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoleHit {
    mole_id: String,
}

/// 게임별 인바운드 메시지 등록
pub fn register_actions(dispatcher: &Dispatcher) {
    dispatcher.register("cardClick", |ctx, pick: Pick| play(ctx, GameAction::Select(pick)));
    dispatcher.register("flipCard", |ctx, pick: Pick| play(ctx, GameAction::Select(pick)));
    dispatcher.register("twoCardsClick", |ctx, pair: TwoCards| {
        play(ctx, GameAction::SelectPair(pair.cards))
    });
    dispatcher.register("collectEnvelope", |ctx, msg: CollectEnvelope| {
        play(ctx, GameAction::Collect(msg.envelope_id))
    });
    dispatcher.register("moleHit", |ctx, msg: MoleHit| play(ctx, GameAction::Hit(msg.mole_id)));
}

async fn play(ctx: HandlerCtx, action: GameAction) {
    if let Err(err) = ctx.room.apply_action(ctx.sender, action).await {
        tracing::debug!(
            room_id = %ctx.room.id(),
            member_id = %ctx.sender,
            reason = %err,
            "Game action ignored"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::protocol::ClientEnvelope;
    use crate::room::tests::Client;
    use crate::state::AppState;
    use std::sync::Arc;

    #[test]
    fn builtin_catalog_knows_three_games() {
        let catalog = GameCatalog::builtin();
        assert_eq!(catalog.game_types(), vec!["memory", "redenvelope", "whackmole"]);

        let game = catalog.create("whackmole", &SettingsMap::default()).expect("game");
        assert_eq!(game.game_type(), "whackmole");
        assert_eq!(game.duration_secs(), 60);

        let err = catalog.create("poker", &SettingsMap::default()).err();
        assert_eq!(err, Some(RoundError::UnknownGame("poker".to_string())));
    }

    #[tokio::test]
    async fn card_click_is_routed_to_the_active_round() {
        let state = Arc::new(AppState::new(Config::default()));
        let (host, mut amy) = (Client::new(), Client::new());
        let (room, h) = state.rooms.join("cards", host.request("host", true)).await.expect("join");
        let (_, a) = state.rooms.join("cards", amy.request("amy", false)).await.expect("join");

        let dispatch = |sender, text: &str| {
            let ctx = HandlerCtx {
                state: state.clone(),
                room: room.clone(),
                sender,
            };
            let envelope = ClientEnvelope::parse(text).expect("envelope");
            let state = state.clone();
            async move { state.dispatcher.dispatch(ctx, envelope).await }
        };

        dispatch(h.member_id, r#"{"type":"hostStartGame","data":{"gameType":"memory","numPairs":2}}"#).await;
        let frames = amy.drain();
        let first = &frames[0]["data"]["layout"]["cards"][0];
        let click = serde_json::json!({
            "type": "cardClick",
            "data": { "suit": first["suit"], "value": first["value"], "positionId": first["positionId"] }
        });

        dispatch(a.member_id, &click.to_string()).await;
        assert_eq!(amy.drain_kinds(), vec!["cardFlipped"]);
    }
}

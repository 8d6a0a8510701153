//! 카드 짝 맞추기 게임
//!
//! 카드는 라운드 시작 시 미리 깔리고, 두 장이 뒤집히면 무늬/숫자로 판정한다.
//! 뒤집힌 카드는 방 전체가 공유하므로 두 번째 카드를 뒤집은 사람이 점수를 얻는다.

use crate::engine::{Award, GameAction, GameRules, JobKind, Pick, RoundCtx, SettingsMap};
use crate::error::ActionError;
use crate::protocol::ServerMessage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

pub const GAME_TYPE: &str = "memory";

const SUITS: [&str; 4] = ["heart", "diamond", "club", "spade"];
const VALUES: [&str; 13] = [
    "A", "2", "3", "4", "5", "6", "7", "8", "9", "10", "J", "Q", "K",
];
const FLIP_BACK_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub position_id: usize,
    pub suit: &'static str,
    pub value: &'static str,
    pub is_flipped: bool,
    pub is_matched: bool,
}

impl Card {
    fn same_face(&self, other: &Card) -> bool {
        self.suit == other.suit && self.value == other.value
    }

    fn matches_pick(&self, pick: &Pick) -> bool {
        self.suit == pick.suit && self.value == pick.value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySettings {
    pub num_pairs: usize,
    pub duration_secs: u32,
    pub match_points: u32,
}

impl MemorySettings {
    pub fn from_settings(settings: &SettingsMap) -> Self {
        let max_pairs = (SUITS.len() * VALUES.len()) as u64;
        Self {
            num_pairs: settings.number(&["numPairs", "pairs"], 8, 1..=max_pairs) as usize,
            duration_secs: settings.number_u32(&["gameTime", "duration"], 60, 5..=3600),
            match_points: settings.number_u32(&["matchPoints"], 10, 1..=1000),
        }
    }
}

pub struct MemoryGame {
    settings: MemorySettings,
    cards: Vec<Card>,
    /// 현재 뒤집혀 판정을 기다리는 카드 인덱스 (최대 2장)
    face_up: Vec<usize>,
}

impl MemoryGame {
    pub fn new(settings: MemorySettings, rng: &mut StdRng) -> Self {
        Self {
            settings,
            cards: deal(settings.num_pairs, rng),
            face_up: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    fn find(&self, pick: &Pick, skip: Option<usize>) -> Result<usize, ActionError> {
        if let Some(position) = pick.position_id {
            let card = self
                .cards
                .get(position)
                .filter(|card| card.matches_pick(pick))
                .ok_or_else(|| ActionError::UnknownEntity(card_id(position)))?;
            if card.is_flipped || card.is_matched || skip == Some(position) {
                return Err(ActionError::AlreadyResolved(card_id(position)));
            }
            return Ok(position);
        }

        self.cards
            .iter()
            .position(|card| {
                card.matches_pick(pick)
                    && !card.is_flipped
                    && !card.is_matched
                    && skip != Some(card.position_id)
            })
            .ok_or_else(|| ActionError::UnknownEntity(format!("{} {}", pick.suit, pick.value)))
    }

    fn select(&mut self, pick: Pick, actor: &str, ctx: &mut RoundCtx) -> Result<Option<Award>, ActionError> {
        if self.face_up.len() >= 2 {
            return Err(ActionError::SelectionPending);
        }
        let index = self.find(&pick, None)?;
        self.cards[index].is_flipped = true;
        self.face_up.push(index);

        if self.face_up.len() == 1 {
            ctx.emit(ServerMessage::CardFlipped {
                card: self.cards[index].clone(),
                player: actor.to_string(),
            });
            return Ok(None);
        }

        ctx.emit(ServerMessage::CardsFlipped {
            cards: self.face_up_cards(),
            player: actor.to_string(),
        });
        Ok(self.resolve(actor, ctx))
    }

    fn select_pair(
        &mut self,
        [first, second]: [Pick; 2],
        actor: &str,
        ctx: &mut RoundCtx,
    ) -> Result<Option<Award>, ActionError> {
        if !self.face_up.is_empty() {
            return Err(ActionError::SelectionPending);
        }
        if first.position_id.is_some() && first.position_id == second.position_id {
            return Err(ActionError::SameCard);
        }
        let a = self.find(&first, None)?;
        let b = self.find(&second, Some(a))?;

        for index in [a, b] {
            self.cards[index].is_flipped = true;
            self.face_up.push(index);
        }
        ctx.emit(ServerMessage::CardsFlipped {
            cards: self.face_up_cards(),
            player: actor.to_string(),
        });
        Ok(self.resolve(actor, ctx))
    }

    /// 두 장이 뒤집힌 상태에서 짝 판정
    fn resolve(&mut self, actor: &str, ctx: &mut RoundCtx) -> Option<Award> {
        let (a, b) = (self.face_up[0], self.face_up[1]);
        if self.cards[a].same_face(&self.cards[b]) {
            self.cards[a].is_matched = true;
            self.cards[b].is_matched = true;
            let cards = self.face_up_cards();
            self.face_up.clear();
            ctx.emit(ServerMessage::CardsMatched {
                cards,
                player: actor.to_string(),
            });
            return Some(Award {
                points: self.settings.match_points,
            });
        }

        ctx.schedule(FLIP_BACK_DELAY, JobKind::Revert(vec![card_id(a), card_id(b)]));
        None
    }

    fn face_up_cards(&self) -> Vec<Card> {
        self.face_up.iter().map(|&i| self.cards[i].clone()).collect()
    }
}

impl GameRules for MemoryGame {
    fn game_type(&self) -> &'static str {
        GAME_TYPE
    }

    fn duration_secs(&self) -> u32 {
        self.settings.duration_secs
    }

    fn settings(&self) -> Value {
        json!({
            "numPairs": self.settings.num_pairs,
            "gameTime": self.settings.duration_secs,
            "matchPoints": self.settings.match_points,
        })
    }

    fn snapshot(&self) -> Value {
        let flipped: Vec<usize> = self.face_up.clone();
        json!({ "cards": self.cards, "flippedCards": flipped })
    }

    fn on_job(&mut self, job: JobKind, ctx: &mut RoundCtx) {
        let JobKind::Revert(ids) = job else {
            return;
        };
        // 그 사이 라운드가 초기화됐으면 무시
        let current: Vec<String> = self.face_up.iter().map(|&i| card_id(i)).collect();
        if current != ids {
            return;
        }
        for &index in &self.face_up {
            self.cards[index].is_flipped = false;
        }
        let cards = self.face_up_cards();
        self.face_up.clear();
        ctx.emit(ServerMessage::CardsFlippedBack { cards });
    }

    fn handle_action(
        &mut self,
        action: GameAction,
        actor: &str,
        ctx: &mut RoundCtx,
    ) -> Result<Option<Award>, ActionError> {
        match action {
            GameAction::Select(pick) => self.select(pick, actor, ctx),
            GameAction::SelectPair(picks) => self.select_pair(picks, actor, ctx),
            GameAction::Collect(_) | GameAction::Hit(_) => Err(ActionError::NotApplicable(GAME_TYPE)),
        }
    }

    fn is_complete(&self) -> bool {
        !self.cards.is_empty() && self.cards.iter().all(|card| card.is_matched)
    }

    fn clear(&mut self) {
        self.cards.clear();
        self.face_up.clear();
    }
}

pub fn create(settings: &SettingsMap) -> Box<dyn GameRules> {
    let mut rng = StdRng::from_entropy();
    Box::new(MemoryGame::new(MemorySettings::from_settings(settings), &mut rng))
}

fn card_id(position: usize) -> String {
    format!("card_{position}")
}

/// 무늬 × 숫자 순서로 `num_pairs`개의 얼굴을 골라 두 장씩 섞어 깐다
fn deal(num_pairs: usize, rng: &mut StdRng) -> Vec<Card> {
    let faces = SUITS
        .iter()
        .flat_map(|suit| VALUES.iter().map(move |value| (*suit, *value)))
        .take(num_pairs);

    let mut deck: Vec<(&'static str, &'static str)> = faces.flat_map(|face| [face, face]).collect();
    deck.shuffle(rng);

    deck.into_iter()
        .enumerate()
        .map(|(position_id, (suit, value))| Card {
            position_id,
            suit,
            value,
            is_flipped: false,
            is_matched: false,
        })
        .collect()
}

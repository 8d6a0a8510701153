//! 떨어지는 세뱃돈 봉투 줍기 게임

use crate::engine::board::{EntityBoard, Tier, ValueDistribution};
use crate::engine::{Award, GameAction, GameRules, JobKind, RoundCtx, SettingsMap};
use crate::error::ActionError;
use crate::protocol::ServerMessage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const GAME_TYPE: &str = "redenvelope";

/// 만료 타이머를 놓친 봉투를 치우기 전 수명 이후의 유예
const SWEEP_GRACE: Duration = Duration::from_secs(5);

const TIERS: [Tier; 3] = [
    Tier { name: "small", weight: 0.70, min: 1, max: 5 },
    Tier { name: "medium", weight: 0.25, min: 6, max: 15 },
    Tier { name: "large", weight: 0.05, min: 16, max: 50 },
];

/// 클라이언트에 보내는 봉투 모양
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeView {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub value: u32,
    pub size: &'static str,
    pub speed: f64,
    pub spawn_time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedEnvelopeSettings {
    pub duration_secs: u32,
    pub spawn_interval: Duration,
    pub lifetime: Duration,
    pub max_envelopes: usize,
}

impl RedEnvelopeSettings {
    pub fn from_settings(settings: &SettingsMap) -> Self {
        Self {
            duration_secs: settings.number_u32(&["duration", "gameTime"], 60, 5..=3600),
            spawn_interval: Duration::from_millis(settings.number(
                &["spawnInterval"],
                1500,
                100..=60_000,
            )),
            lifetime: Duration::from_millis(settings.number(
                &["envelopeLifetime"],
                5000,
                500..=60_000,
            )),
            max_envelopes: settings.number(&["maxEnvelopes", "envelopeCount"], 10, 1..=100) as usize,
        }
    }
}

pub struct RedEnvelopeGame {
    settings: RedEnvelopeSettings,
    board: EntityBoard<EnvelopeView>,
    values: ValueDistribution,
    rng: StdRng,
}

impl RedEnvelopeGame {
    pub fn new(settings: RedEnvelopeSettings, rng: StdRng) -> Self {
        Self {
            settings,
            board: EntityBoard::unslotted("envelope", settings.max_envelopes),
            values: ValueDistribution::new(TIERS.to_vec()),
            rng,
        }
    }

    #[cfg(test)]
    pub fn live(&self) -> usize {
        self.board.len()
    }

    fn remove_stale(&mut self, ctx: &mut RoundCtx) {
        for entity in self.board.sweep(ctx.now, SWEEP_GRACE) {
            ctx.emit(ServerMessage::EnvelopeRemoved { envelope_id: entity.id });
        }
    }
}

impl GameRules for RedEnvelopeGame {
    fn game_type(&self) -> &'static str {
        GAME_TYPE
    }

    fn duration_secs(&self) -> u32 {
        self.settings.duration_secs
    }

    fn spawn_interval(&self) -> Option<Duration> {
        Some(self.settings.spawn_interval)
    }

    fn settings(&self) -> Value {
        json!({
            "duration": self.settings.duration_secs,
            "spawnInterval": self.settings.spawn_interval.as_millis() as u64,
            "envelopeLifetime": self.settings.lifetime.as_millis() as u64,
            "maxEnvelopes": self.settings.max_envelopes,
            "tiers": self.values.tiers(),
        })
    }

    fn snapshot(&self) -> Value {
        let envelopes: Vec<&EnvelopeView> = self.board.iter().map(|e| &e.data).collect();
        json!({ "envelopes": envelopes })
    }

    fn on_spawn_tick(&mut self, ctx: &mut RoundCtx) {
        self.remove_stale(ctx);
        if self.board.is_full() {
            tracing::trace!(live = self.board.len(), "Envelope board full, skipping spawn");
            return;
        }

        let (tier, value) = self.values.draw(&mut self.rng);
        let x = self.rng.gen_range(0.0..100.0);
        let speed = match tier.name {
            "large" => self.rng.gen_range(1.0..2.0),
            "medium" => self.rng.gen_range(1.5..2.5),
            _ => self.rng.gen_range(2.0..3.5),
        };
        let lifetime = self.settings.lifetime;

        let Some(entity) = self.board.spawn(&mut self.rng, ctx.now, value, lifetime, |id, _| {
            EnvelopeView {
                id: id.to_string(),
                x,
                y: -10.0,
                value,
                size: tier.name,
                speed,
                spawn_time: epoch_millis(),
            }
        }) else {
            return;
        };

        let id = entity.id.clone();
        let envelope = entity.data.clone();
        ctx.emit(ServerMessage::NewEnvelope { envelope });
        ctx.schedule(lifetime, JobKind::Expire(id));
    }

    fn on_job(&mut self, job: JobKind, ctx: &mut RoundCtx) {
        if let JobKind::Expire(id) = job {
            // 이미 주운 봉투는 보드에 없다
            if self.board.remove(&id).is_some() {
                ctx.emit(ServerMessage::EnvelopeRemoved { envelope_id: id });
            }
        }
    }

    fn handle_action(
        &mut self,
        action: GameAction,
        actor: &str,
        ctx: &mut RoundCtx,
    ) -> Result<Option<Award>, ActionError> {
        let GameAction::Collect(id) = action else {
            return Err(ActionError::NotApplicable(GAME_TYPE));
        };

        let entity = self
            .board
            .remove(&id)
            .ok_or_else(|| ActionError::UnknownEntity(id.clone()))?;

        ctx.emit(ServerMessage::EnvelopeCollected {
            envelope_id: entity.id,
            value: entity.value,
            player: actor.to_string(),
        });
        Ok(Some(Award { points: entity.value }))
    }

    fn clear(&mut self) {
        self.board.clear();
    }
}

pub fn create(settings: &SettingsMap) -> Box<dyn GameRules> {
    Box::new(RedEnvelopeGame::new(
        RedEnvelopeSettings::from_settings(settings),
        StdRng::from_entropy(),
    ))
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

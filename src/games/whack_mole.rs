//! 두더지 잡기 게임
//!
//! 구멍은 화면 비율 좌표의 격자에 고정되어 있고, 두더지는 빈 구멍에만 나온다.

use crate::engine::board::EntityBoard;
use crate::engine::{Award, GameAction, GameRules, JobKind, RoundCtx, SettingsMap};
use crate::error::ActionError;
use crate::protocol::ServerMessage;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const GAME_TYPE: &str = "whackmole";

/// 맞은 두더지가 사라지기 전까지 보이는 시간
const HIT_LINGER: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hole {
    pub id: usize,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoleView {
    pub id: String,
    pub position: usize,
    pub spawn_time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhackMoleSettings {
    pub duration_secs: u32,
    pub spawn_interval: Duration,
    pub lifetime: Duration,
    pub hole_count: usize,
    pub max_moles: usize,
    pub hit_points: u32,
}

impl WhackMoleSettings {
    pub fn from_settings(settings: &SettingsMap) -> Self {
        let hole_count = settings.number(&["moleCount", "totalMoles"], 9, 1..=25) as usize;
        Self {
            duration_secs: settings.number_u32(&["duration", "gameTime"], 60, 5..=3600),
            spawn_interval: Duration::from_millis(settings.number(
                &["moleSpawnInterval", "spawnInterval"],
                1000,
                100..=60_000,
            )),
            lifetime: Duration::from_millis(settings.number(
                &["moleLifetime"],
                2000,
                200..=60_000,
            )),
            hole_count,
            max_moles: settings.number(&["maxMoles"], hole_count as u64, 1..=hole_count as u64)
                as usize,
            hit_points: 1,
        }
    }
}

pub struct WhackMoleGame {
    settings: WhackMoleSettings,
    holes: Vec<Hole>,
    board: EntityBoard<MoleView>,
    rng: StdRng,
}

impl WhackMoleGame {
    pub fn new(settings: WhackMoleSettings, rng: StdRng) -> Self {
        Self {
            settings,
            holes: layout(settings.hole_count),
            board: EntityBoard::with_slots("mole", settings.hole_count, settings.max_moles),
            rng,
        }
    }

    #[cfg(test)]
    pub fn live(&self) -> usize {
        self.board.len()
    }

    fn hide(&mut self, id: &str, ctx: &mut RoundCtx) {
        if let Some(mole) = self.board.remove(id) {
            ctx.emit(ServerMessage::MoleHidden {
                mole_id: mole.id,
                position: mole.data.position,
            });
        }
    }
}

impl GameRules for WhackMoleGame {
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
            "moleSpawnInterval": self.settings.spawn_interval.as_millis() as u64,
            "moleLifetime": self.settings.lifetime.as_millis() as u64,
            "moleCount": self.settings.hole_count,
            "maxMoles": self.settings.max_moles,
        })
    }

    fn snapshot(&self) -> Value {
        let moles: Vec<&MoleView> = self.board.iter().map(|e| &e.data).collect();
        json!({ "holes": self.holes, "moles": moles })
    }

    fn on_spawn_tick(&mut self, ctx: &mut RoundCtx) {
        let grace = self.settings.lifetime + HIT_LINGER;
        for mole in self.board.sweep(ctx.now, grace) {
            ctx.emit(ServerMessage::MoleHidden {
                mole_id: mole.id,
                position: mole.data.position,
            });
        }

        let lifetime = self.settings.lifetime;
        let Some(mole) = self.board.spawn(
            &mut self.rng,
            ctx.now,
            self.settings.hit_points,
            lifetime,
            |id, slot| MoleView {
                id: id.to_string(),
                position: slot.unwrap_or_default(),
                spawn_time: epoch_millis(),
            },
        ) else {
            tracing::trace!("No free hole, skipping mole spawn");
            return;
        };

        let id = mole.id.clone();
        ctx.emit(ServerMessage::MoleSpawned {
            mole: mole.data.clone(),
        });
        ctx.schedule(lifetime, JobKind::Expire(id));
    }

    fn on_job(&mut self, job: JobKind, ctx: &mut RoundCtx) {
        if let JobKind::Expire(id) = job {
            self.hide(&id, ctx);
        }
    }

    fn handle_action(
        &mut self,
        action: GameAction,
        actor: &str,
        ctx: &mut RoundCtx,
    ) -> Result<Option<Award>, ActionError> {
        let GameAction::Hit(id) = action else {
            return Err(ActionError::NotApplicable(GAME_TYPE));
        };

        let mole = self
            .board
            .get_mut(&id)
            .ok_or_else(|| ActionError::UnknownEntity(id.clone()))?;
        if mole.resolved {
            return Err(ActionError::AlreadyResolved(id));
        }
        mole.resolved = true;
        let points = mole.value;

        ctx.emit(ServerMessage::MoleHit {
            mole_id: id.clone(),
            position: mole.data.position,
            player: actor.to_string(),
        });
        ctx.schedule(HIT_LINGER, JobKind::Expire(id));
        Ok(Some(Award { points }))
    }

    fn clear(&mut self) {
        self.board.clear();
    }
}

pub fn create(settings: &SettingsMap) -> Box<dyn GameRules> {
    Box::new(WhackMoleGame::new(
        WhackMoleSettings::from_settings(settings),
        StdRng::from_entropy(),
    ))
}

/// 가로 15~85%, 세로 20~80% 안에 정사각형에 가까운 격자로 구멍을 배치
fn layout(count: usize) -> Vec<Hole> {
    let cols = (count as f64).sqrt().ceil().max(1.0) as usize;
    let rows = count.div_ceil(cols).max(1);
    let step = |span: f64, n: usize| if n > 1 { span / (n - 1) as f64 } else { 0.0 };
    let (dx, dy) = (step(70.0, cols), step(60.0, rows));
    let (x0, y0) = (
        if cols > 1 { 15.0 } else { 50.0 },
        if rows > 1 { 20.0 } else { 50.0 },
    );

    (0..count)
        .map(|id| Hole {
            id,
            x: x0 + (id % cols) as f64 * dx,
            y: y0 + (id / cols) as f64 * dy,
        })
        .collect()
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn game(hole_count: usize, max_moles: usize) -> WhackMoleGame {
        WhackMoleGame::new(
            WhackMoleSettings {
                duration_secs: 60,
                spawn_interval: Duration::from_secs(1),
                lifetime: Duration::from_secs(2),
                hole_count,
                max_moles,
                hit_points: 1,
            },
            StdRng::seed_from_u64(77),
        )
    }

    fn spawn(game: &mut WhackMoleGame) -> Vec<ServerMessage> {
        let mut ctx = RoundCtx::new(Instant::now());
        game.on_spawn_tick(&mut ctx);
        ctx.into_parts().0
    }

    fn mole_of(events: &[ServerMessage]) -> MoleView {
        events
            .iter()
            .find_map(|event| match event {
                ServerMessage::MoleSpawned { mole } => Some(mole.clone()),
                _ => None,
            })
            .expect("moleSpawned event")
    }

    #[test]
    fn default_layout_is_three_by_three() {
        let holes = layout(9);
        assert_eq!(holes.len(), 9);
        assert_eq!((holes[0].x, holes[0].y), (15.0, 20.0));
        assert_eq!((holes[8].x, holes[8].y), (85.0, 80.0));
        for hole in &holes {
            assert!((15.0..=85.0).contains(&hole.x));
            assert!((20.0..=80.0).contains(&hole.y));
        }
    }

    #[test]
    fn moles_never_share_a_hole() {
        let mut game = game(4, 4);
        let mut positions = Vec::new();
        for _ in 0..4 {
            positions.push(mole_of(&spawn(&mut game)).position);
        }
        positions.sort_unstable();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn spawn_at_max_moles_emits_nothing() {
        let mut game = game(9, 2);
        spawn(&mut game);
        spawn(&mut game);
        assert!(spawn(&mut game).is_empty());
        assert_eq!(game.live(), 2);
    }

    #[test]
    fn hit_scores_once_then_hides_after_linger() {
        let mut game = game(9, 9);
        let mole = mole_of(&spawn(&mut game));

        let mut ctx = RoundCtx::new(Instant::now());
        let award = game
            .handle_action(GameAction::Hit(mole.id.clone()), "amy", &mut ctx)
            .expect("hit");
        assert_eq!(award, Some(Award { points: 1 }));
        let (events, jobs) = ctx.into_parts();
        assert_eq!(events[0].kind(), "moleHit");
        assert_eq!(jobs[0].delay, HIT_LINGER);

        let mut ctx = RoundCtx::new(Instant::now());
        let err = game
            .handle_action(GameAction::Hit(mole.id.clone()), "bob", &mut ctx)
            .unwrap_err();
        assert_eq!(err, ActionError::AlreadyResolved(mole.id.clone()));

        let mut ctx = RoundCtx::new(Instant::now());
        game.on_job(jobs[0].kind.clone(), &mut ctx);
        let (events, _) = ctx.into_parts();
        assert_eq!(events[0].kind(), "moleHidden");
        assert_eq!(game.live(), 0);

        // 원래 수명 만료 작업은 아무 일도 하지 않는다
        let mut ctx = RoundCtx::new(Instant::now());
        game.on_job(JobKind::Expire(mole.id), &mut ctx);
        assert!(ctx.into_parts().0.is_empty());
    }

    #[test]
    fn hit_on_missing_mole_is_rejected() {
        let mut game = game(9, 9);
        let mut ctx = RoundCtx::new(Instant::now());
        let err = game
            .handle_action(GameAction::Hit("mole_404".to_string()), "amy", &mut ctx)
            .unwrap_err();
        assert_eq!(err, ActionError::UnknownEntity("mole_404".to_string()));
    }

    #[test]
    fn max_moles_is_capped_by_hole_count() {
        let raw = json!({ "moleCount": 4, "maxMoles": 12 });
        let Value::Object(map) = raw else { unreachable!() };
        let settings = WhackMoleSettings::from_settings(&SettingsMap::new(map));
        assert_eq!(settings.hole_count, 4);
        assert_eq!(settings.max_moles, 4);
    }
}

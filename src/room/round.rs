//! 방 안에서 라운드 진행
//!
//! 상태 전이는 `RoomState`의 동기 메서드가 맡고, `Room`의 비동기 메서드는 잠금을 잡고
//! 전이를 호출한 뒤 필요한 타이머를 라운드 토큰에 묶어 띄운다.

use super::{Audience, MemberId, Room, RoomState};
use crate::engine::ranking::{self, ScoreEntry, Standing};
use crate::engine::timer;
use crate::engine::{EndReason, GameAction, GameRules, Job, JobKind, Round, RoundCtx, RoundStatus};
use crate::error::RoundError;
use crate::protocol::ServerMessage;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

impl Room {
    /// 호스트의 라운드 시작
    pub async fn start_round(
        self: &Arc<Self>,
        sender: MemberId,
        game: Box<dyn GameRules>,
        min_players: usize,
    ) -> Result<(), RoundError> {
        let mut state = self.state.lock().await;
        let token = self.stop.child_token();
        let result = state.start_round(sender, game, min_players, token.clone());
        state.flush();

        let spawn_interval = result?;
        self.spawn_countdown(token.clone());
        if let Some(period) = spawn_interval {
            self.spawn_spawner(period, token);
        }
        Ok(())
    }

    /// 호스트의 라운드 종료
    pub async fn close_round(&self, sender: MemberId) -> Result<(), RoundError> {
        let mut state = self.state.lock().await;
        let result = state.close_round(sender);
        state.flush();
        result
    }

    /// 게임 액션 처리 (선택, 수집, 타격)
    pub async fn apply_action(
        self: &Arc<Self>,
        sender: MemberId,
        action: GameAction,
    ) -> Result<(), RoundError> {
        let mut state = self.state.lock().await;
        let result = state.apply_action(sender, action).map(|jobs| {
            // 이 액션으로 라운드가 끝났으면 토큰이 없다
            if let Some(token) = state.round_token() {
                self.schedule_jobs(&token, jobs);
            }
        });
        state.flush();
        result
    }

    /// 호스트 전용 공지
    pub async fn notify(
        &self,
        sender: MemberId,
        messages: Vec<ServerMessage>,
    ) -> Result<(), RoundError> {
        let mut state = self.state.lock().await;
        if !state.is_host(sender) {
            return Err(RoundError::NotHost);
        }
        state.push_all(messages);
        state.flush();
        Ok(())
    }

    fn spawn_countdown(self: &Arc<Self>, token: CancellationToken) {
        let room = Arc::clone(self);
        let round_token = token.clone();
        timer::spawn_ticker(COUNTDOWN_PERIOD, token, move || {
            let room = Arc::clone(&room);
            let token = round_token.clone();
            async move { room.countdown_tick(&token).await }
        });
    }

    fn spawn_spawner(self: &Arc<Self>, period: Duration, token: CancellationToken) {
        let room = Arc::clone(self);
        let round_token = token.clone();
        timer::spawn_ticker(period, token, move || {
            let room = Arc::clone(&room);
            let token = round_token.clone();
            async move { room.spawn_tick(&token).await }
        });
    }

    async fn countdown_tick(&self, token: &CancellationToken) -> ControlFlow<()> {
        let mut state = self.state.lock().await;
        // 잠금을 기다리는 사이 라운드가 끝났을 수 있다
        if token.is_cancelled() {
            return ControlFlow::Break(());
        }
        let flow = state.countdown_tick();
        state.flush();
        flow
    }

    async fn spawn_tick(self: &Arc<Self>, token: &CancellationToken) -> ControlFlow<()> {
        let mut state = self.state.lock().await;
        if token.is_cancelled() {
            return ControlFlow::Break(());
        }
        let Some(jobs) = state.spawn_tick() else {
            return ControlFlow::Break(());
        };
        self.schedule_jobs(token, jobs);
        state.flush();
        ControlFlow::Continue(())
    }

    fn schedule_jobs(self: &Arc<Self>, token: &CancellationToken, jobs: Vec<Job>) {
        for job in jobs {
            let room = Arc::clone(self);
            let job_token = token.clone();
            timer::spawn_after(job.delay, token.clone(), move || async move {
                room.run_job(&job_token, job.kind).await;
            });
        }
    }

    async fn run_job(self: &Arc<Self>, token: &CancellationToken, kind: JobKind) {
        let mut state = self.state.lock().await;
        if token.is_cancelled() {
            return;
        }
        let jobs = state.run_job(kind);
        self.schedule_jobs(token, jobs);
        state.flush();
    }
}

impl RoomState {
    fn active_round(&mut self) -> Option<&mut Round> {
        self.round.as_mut().filter(|round| round.is_active())
    }

    fn round_token(&self) -> Option<CancellationToken> {
        self.round
            .as_ref()
            .filter(|round| round.is_active())
            .map(|round| round.token.clone())
    }

    /// 시작 검증 후 라운드 생성. 성공하면 스폰 주기를 반환
    pub(crate) fn start_round(
        &mut self,
        sender: MemberId,
        game: Box<dyn GameRules>,
        min_players: usize,
        token: CancellationToken,
    ) -> Result<Option<Duration>, RoundError> {
        if !self.is_host(sender) {
            return Err(RoundError::NotHost);
        }
        if self.total_players < min_players {
            self.push(
                Audience::Host,
                ServerMessage::Waiting {
                    message: format!("Waiting for players ({}/{min_players})", self.total_players),
                },
            );
            return Err(RoundError::NotEnoughPlayers {
                have: self.total_players,
                need: min_players,
            });
        }
        if self.round_active() {
            return Err(RoundError::AlreadyActive);
        }

        for player in &mut self.players {
            player.score = 0;
            player.hits = 0;
        }

        let round = Round::new(game, token);
        let spawn_interval = round.game.spawn_interval();
        let started = ServerMessage::GameStarted {
            game_type: round.game_type().to_string(),
            time_left: round.time_left,
            settings: round.game.settings(),
            layout: round.game.snapshot(),
        };
        tracing::info!(
            room_id = %self.room_id,
            game_type = round.game_type(),
            duration = round.time_left,
            players = self.players.len(),
            "Round started"
        );
        self.round = Some(round);
        self.push(Audience::All, started);
        Ok(spawn_interval)
    }

    pub(crate) fn close_round(&mut self, sender: MemberId) -> Result<(), RoundError> {
        if !self.is_host(sender) {
            return Err(RoundError::NotHost);
        }
        if !self.finish_round(EndReason::ClosedByHost) {
            return Err(RoundError::NotActive);
        }
        // 닫은 호스트는 이미 알고 있다
        self.push(
            Audience::Players,
            ServerMessage::GameClosed {
                message: "The host closed the game".to_string(),
            },
        );
        Ok(())
    }

    /// 1초 카운트다운. 0이 되면 라운드 종료
    pub(crate) fn countdown_tick(&mut self) -> ControlFlow<()> {
        let Some(round) = self.active_round() else {
            return ControlFlow::Break(());
        };
        round.time_left = round.time_left.saturating_sub(1);
        let time_left = round.time_left;

        self.push(Audience::All, ServerMessage::TimeUpdate { time_left });
        if time_left == 0 {
            self.finish_round(EndReason::TimeUp);
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    /// 스폰 틱. 라운드가 끝났으면 None
    pub(crate) fn spawn_tick(&mut self) -> Option<Vec<Job>> {
        let round = self.active_round()?;
        let mut ctx = RoundCtx::new(Instant::now());
        round.game.on_spawn_tick(&mut ctx);
        let (events, jobs) = ctx.into_parts();
        self.push_all(events);
        Some(jobs)
    }

    pub(crate) fn run_job(&mut self, kind: JobKind) -> Vec<Job> {
        let Some(round) = self.active_round() else {
            return Vec::new();
        };
        let mut ctx = RoundCtx::new(Instant::now());
        round.game.on_job(kind, &mut ctx);
        let (events, jobs) = ctx.into_parts();
        self.push_all(events);
        jobs
    }

    /// 액션 판정 후 점수 반영. 호스트는 판정만 되고 점수는 없다
    pub(crate) fn apply_action(
        &mut self,
        sender: MemberId,
        action: GameAction,
    ) -> Result<Vec<Job>, RoundError> {
        let (nickname, is_host) = self
            .member(sender)
            .map(|member| (member.nickname.clone(), member.is_host))
            .ok_or(RoundError::UnknownMember)?;
        let round = self.active_round().ok_or(RoundError::NotActive)?;

        let mut ctx = RoundCtx::new(Instant::now());
        let award = round.game.handle_action(action, &nickname, &mut ctx)?;
        let complete = round.game.is_complete();
        let (events, jobs) = ctx.into_parts();
        self.push_all(events);

        if let (Some(award), false) = (award, is_host) {
            self.credit(sender, award.points);
        }

        if complete {
            self.finish_round(EndReason::AllMatched);
        }
        Ok(jobs)
    }

    fn credit(&mut self, member_id: MemberId, points: u32) {
        let Some(member) = self.member_mut(member_id) else {
            return;
        };
        member.score = member.score.saturating_add(points);
        member.hits += 1;
        let update = ServerMessage::ScoreUpdate {
            player_id: member.id.to_string(),
            nickname: member.nickname.clone(),
            score: member.score,
        };

        self.push(Audience::All, update);
        let rankings = self.standings();
        self.push(Audience::All, ServerMessage::RankingUpdate { rankings });
    }

    /// 라운드 종료 처리. 진행 중인 라운드가 없으면 false
    pub(crate) fn finish_round(&mut self, reason: EndReason) -> bool {
        let Some(round) = self.active_round() else {
            tracing::debug!(room_id = %self.room_id, reason = ?reason, "No active round to end");
            return false;
        };
        round.status = RoundStatus::Ended;
        round.token.cancel();
        round.game.clear();
        let game_type = round.game_type().to_string();

        let rankings = self.standings();
        tracing::info!(
            room_id = %self.room_id,
            game_type = %game_type,
            reason = ?reason,
            "Round ended"
        );
        self.push(
            Audience::All,
            ServerMessage::GameEnded {
                game_type,
                reason,
                rankings,
            },
        );
        true
    }

    /// 호스트를 뺀 현재 순위
    pub(crate) fn standings(&self) -> Vec<Standing> {
        ranking::rank(self.players.iter().map(|player| ScoreEntry {
            nickname: player.nickname.clone(),
            score: player.score,
            hits: player.hits,
        }))
    }
}

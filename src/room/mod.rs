//! 방 (멤버 관리, 호스트 선출, 재접속)
//!
//! 방의 모든 상태는 `RoomState` 하나에 모여 있고 방 잠금 하나로 보호된다.
//! 재접속 요청은 방마다 하나 있는 재접속 태스크가 한 번에 하나씩 처리한다.

pub mod broadcast;
pub mod member;
pub mod registry;
pub mod round;

pub use broadcast::Audience;
pub use member::{Attached, ConnectionHandle, JoinRequest, Member, MemberId, Outbound};
pub use registry::RoomRegistry;

use crate::config::RoomConfig;
use crate::engine::{Round, RoundStatus};
use crate::error::{AttachError, ReconnectError};
use crate::protocol::{PlayerInfo, ServerMessage};
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 재접속 요청. 응답 채널로 교체된 멤버 정보를 돌려받는다
struct ReconnectRequest {
    request: JoinRequest,
    reply: oneshot::Sender<Option<Attached>>,
}

pub struct Room {
    id: String,
    state: Mutex<RoomState>,
    /// 방 정지 신호. 라운드 토큰은 모두 이 토큰의 자식이다
    stop: CancellationToken,
    reconnect_tx: mpsc::Sender<ReconnectRequest>,
    reconnect_timeout: Duration,
}

/// 방 잠금 안의 상태
pub struct RoomState {
    room_id: String,
    host: Option<Member>,
    /// 현재 호스트가 `isHost`로 들어와 자리를 차지했는지
    host_claimed: bool,
    /// 참여 순서대로
    players: Vec<Member>,
    total_players: usize,
    round: Option<Round>,
    outbox: Vec<(Audience, ServerMessage)>,
}

/// HTTP 조회용 방 요약
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: String,
    pub total_players: usize,
    pub waiting_for_players: bool,
    pub game_started: bool,
    pub game_ended: bool,
    pub game_type: Option<String>,
}

impl Room {
    /// 방 생성 및 재접속 태스크 시작
    pub fn new(id: impl Into<String>, config: &RoomConfig) -> Arc<Self> {
        let id = id.into();
        let (reconnect_tx, reconnect_rx) = mpsc::channel(config.reconnect_queue_size.max(1));
        let room = Arc::new(Self {
            state: Mutex::new(RoomState::new(&id)),
            id,
            stop: CancellationToken::new(),
            reconnect_tx,
            reconnect_timeout: config.reconnect_timeout(),
        });

        tokio::spawn(run_reconnect_handler(
            Arc::downgrade(&room),
            reconnect_rx,
            room.stop.clone(),
        ));

        tracing::info!(room_id = %room.id, "Room created");
        room
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// 방 참여. 라운드 진행 중이면 먼저 같은 닉네임의 멤버로 재접속을 시도한다
    pub async fn attach(&self, request: JoinRequest) -> Result<Attached, AttachError> {
        let round_active = {
            let state = self.state.lock().await;
            if self.is_closed() {
                return Err(AttachError::RoomClosed(self.id.clone()));
            }
            state.round_active()
        };

        if round_active {
            match self.reconnect(request.clone()).await {
                Ok(attached) => return Ok(attached),
                Err(err) => {
                    tracing::info!(
                        room_id = %self.id,
                        nickname = %request.nickname,
                        reason = %err,
                        "Reconnection failed, joining as new member"
                    );
                }
            }
        }

        let mut state = self.state.lock().await;
        if self.is_closed() {
            return Err(AttachError::RoomClosed(self.id.clone()));
        }
        let attached = state.join(request);
        state.flush();
        Ok(attached)
    }

    async fn reconnect(&self, request: JoinRequest) -> Result<Attached, ReconnectError> {
        let nickname = request.nickname.clone();
        let (reply, verdict) = oneshot::channel();

        self.reconnect_tx
            .try_send(ReconnectRequest { request, reply })
            .map_err(|err| match err {
                TrySendError::Full(_) => {
                    tracing::warn!(room_id = %self.id, nickname = %nickname, "Reconnection queue full");
                    ReconnectError::QueueFull
                }
                TrySendError::Closed(_) => ReconnectError::HandlerGone,
            })?;

        match tokio::time::timeout(self.reconnect_timeout, verdict).await {
            Err(_) => Err(ReconnectError::Timeout),
            Ok(Err(_)) => Err(ReconnectError::HandlerGone),
            Ok(Ok(None)) => Err(ReconnectError::NoMatch(nickname)),
            Ok(Ok(Some(attached))) => Ok(attached),
        }
    }

    async fn handle_reconnect(&self, req: ReconnectRequest) {
        // 호출자가 이미 타임아웃으로 새 참여를 진행했다
        if req.reply.is_closed() {
            return;
        }

        let mut state = self.state.lock().await;
        // 잠금을 기다리는 사이에 타임아웃이 났을 수 있다
        if req.reply.is_closed() {
            tracing::debug!(room_id = %self.id, nickname = %req.request.nickname, "Reconnection abandoned by caller");
            return;
        }
        let outcome = if self.is_closed() {
            None
        } else {
            state.swap_connection(&req.request)
        };
        state.flush();

        if let Some(attached) = outcome {
            tracing::info!(
                room_id = %self.id,
                nickname = %req.request.nickname,
                is_host = attached.is_host,
                "Member reconnected"
            );
        }
        let _ = req.reply.send(outcome);
    }

    /// 멤버 제거. 방이 비면 정지 신호를 보내고 true 반환
    ///
    /// 재접속으로 이미 교체된 연결(`conn_id` 불일치)이면 아무것도 하지 않는다.
    pub async fn detach(&self, member_id: MemberId, conn_id: Uuid) -> bool {
        let mut state = self.state.lock().await;
        if !state.leave(member_id, conn_id) {
            return false;
        }

        let emptied = state.total_players == 0;
        if emptied {
            if let Some(round) = state.round.as_mut() {
                round.status = RoundStatus::Ended;
                round.game.clear();
            }
            self.stop.cancel();
            tracing::info!(room_id = %self.id, "Room is empty, stopping");
        }
        state.flush();
        emptied
    }

    /// 빈 방이면 닫고 true 반환 (정리 스케줄러용)
    pub async fn close_if_empty(&self) -> bool {
        let state = self.state.lock().await;
        if state.total_players > 0 {
            return false;
        }
        self.stop.cancel();
        true
    }

    pub async fn info(&self) -> RoomInfo {
        self.state.lock().await.info()
    }

    /// 호스트를 맨 앞에 둔 멤버 목록
    pub async fn members(&self) -> Vec<PlayerInfo> {
        let state = self.state.lock().await;
        state
            .host
            .iter()
            .chain(state.players.iter())
            .map(Member::info)
            .collect()
    }

    /// `join` 메시지 응답: 대기 중이면 `waiting`, 진행 중이면 현재 라운드 상태
    pub async fn greet(&self, member_id: MemberId) {
        let mut state = self.state.lock().await;
        let message = match state.round.as_ref().filter(|round| round.is_active()) {
            Some(round) => ServerMessage::GameState {
                game_type: round.game_type().to_string(),
                time_left: round.time_left,
                snapshot: round.game.snapshot(),
            },
            None => ServerMessage::Waiting {
                message: "Waiting for the host to start the game".to_string(),
            },
        };
        state.push(Audience::Member(member_id), message);
        state.push_player_list();
        state.flush();
    }

    /// 클라이언트가 보낸 점수는 반영하지 않고 서버 점수를 다시 알려준다
    pub async fn echo_score(&self, member_id: MemberId, claimed: Option<u64>) {
        let mut state = self.state.lock().await;
        let Some(member) = state.member(member_id) else {
            return;
        };
        if claimed.is_some_and(|claimed| claimed != u64::from(member.score)) {
            tracing::debug!(
                room_id = %self.id,
                nickname = %member.nickname,
                claimed = ?claimed,
                score = member.score,
                "Ignoring client score claim"
            );
        }
        let message = ServerMessage::ScoreUpdate {
            player_id: member.id.to_string(),
            nickname: member.nickname.clone(),
            score: member.score,
        };
        state.push(Audience::Member(member_id), message);
        state.flush();
    }
}

async fn run_reconnect_handler(
    room: Weak<Room>,
    mut requests: mpsc::Receiver<ReconnectRequest>,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            request = requests.recv() => {
                let (Some(request), Some(room)) = (request, room.upgrade()) else {
                    break;
                };
                room.handle_reconnect(request).await;
            }
        }
    }
    tracing::debug!("Reconnection handler stopped");
}

impl RoomState {
    pub fn new(room_id: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            host: None,
            host_claimed: false,
            players: Vec::new(),
            total_players: 0,
            round: None,
            outbox: Vec::new(),
        }
    }

    pub fn round_active(&self) -> bool {
        self.round.as_ref().is_some_and(Round::is_active)
    }

    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.host
            .iter()
            .chain(self.players.iter())
            .find(|member| member.id == id)
    }

    fn member_mut(&mut self, id: MemberId) -> Option<&mut Member> {
        self.host
            .iter_mut()
            .chain(self.players.iter_mut())
            .find(|member| member.id == id)
    }

    pub fn is_host(&self, id: MemberId) -> bool {
        self.host.as_ref().is_some_and(|host| host.id == id)
    }

    /// 새 멤버 추가
    ///
    /// 호스트가 없으면 호스트가 된다. `isHost`로 들어오면 먼저 들어와 있던 비지정 호스트를
    /// 일반 멤버로 내리고 자리를 넘겨받는다. 지정 호스트끼리는 먼저 들어온 쪽이 유지된다.
    pub fn join(&mut self, request: JoinRequest) -> Attached {
        let wants_host = request.wants_host;
        let takes_over = wants_host && self.host.is_some() && !self.host_claimed;
        let becomes_host = self.host.is_none() || takes_over;
        if wants_host && !becomes_host {
            tracing::warn!(
                room_id = %self.room_id,
                nickname = %request.nickname,
                "Room already has a host, joining as player"
            );
        }

        let member = Member {
            id: Uuid::new_v4(),
            nickname: request.nickname,
            avatar: request.avatar,
            is_host: becomes_host,
            score: 0,
            hits: 0,
            conn: request.conn,
        };
        let attached = Attached {
            member_id: member.id,
            is_host: becomes_host,
            reconnected: false,
        };

        self.push(
            Audience::Member(member.id),
            ServerMessage::Connected {
                session_id: member.conn.id,
                member_id: member.id,
                room_id: self.room_id.clone(),
                is_host: becomes_host,
            },
        );

        if becomes_host {
            let nickname = member.nickname.clone();
            let previous = self.host.replace(member);
            self.host_claimed = wants_host;
            if let Some(mut previous) = previous {
                previous.is_host = false;
                tracing::info!(
                    room_id = %self.room_id,
                    nickname = %nickname,
                    previous = %previous.nickname,
                    "Host slot claimed, previous host demoted"
                );
                // 가장 오래 있던 멤버이므로 승계 순서 맨 앞
                self.players.insert(0, previous);
                self.push(Audience::All, ServerMessage::HostChanged { nickname });
            } else {
                tracing::info!(room_id = %self.room_id, nickname = %nickname, "Host joined");
            }
        } else {
            let player = member.info();
            tracing::info!(room_id = %self.room_id, nickname = %member.nickname, "Player joined");
            self.players.push(member);
            self.push(
                Audience::All,
                ServerMessage::PlayerJoined {
                    player,
                    total_players: self.players.len(),
                },
            );
        }
        self.total_players += 1;
        self.push_player_list();
        attached
    }

    /// 같은 닉네임의 멤버에 새 연결을 끼운다. 점수와 호스트 여부는 유지
    fn swap_connection(&mut self, request: &JoinRequest) -> Option<Attached> {
        let room_id = self.room_id.clone();
        let member = self
            .host
            .iter_mut()
            .chain(self.players.iter_mut())
            .find(|member| member.nickname == request.nickname)?;

        let stale = std::mem::replace(&mut member.conn, request.conn.clone());
        stale.close();

        let attached = Attached {
            member_id: member.id,
            is_host: member.is_host,
            reconnected: true,
        };
        let connected = ServerMessage::Connected {
            session_id: member.conn.id,
            member_id: member.id,
            room_id,
            is_host: member.is_host,
        };

        self.push(Audience::Member(attached.member_id), connected);
        self.push_player_list();
        Some(attached)
    }

    /// 멤버 제거 및 호스트 승계. 제거했으면 true
    fn leave(&mut self, member_id: MemberId, conn_id: Uuid) -> bool {
        let departed = if self
            .host
            .as_ref()
            .is_some_and(|host| host.id == member_id && host.conn.id == conn_id)
        {
            self.host.take()
        } else {
            self.players
                .iter()
                .position(|p| p.id == member_id && p.conn.id == conn_id)
                .map(|index| self.players.remove(index))
        };

        let Some(departed) = departed else {
            tracing::debug!(room_id = %self.room_id, member_id = %member_id, "Stale detach ignored");
            return false;
        };

        self.total_players -= 1;
        tracing::info!(
            room_id = %self.room_id,
            nickname = %departed.nickname,
            remaining = self.total_players,
            "Member left"
        );

        if self.total_players == 0 {
            return true;
        }

        self.push(
            Audience::All,
            ServerMessage::PlayerLeft {
                nickname: departed.nickname.clone(),
                total_players: self.total_players,
            },
        );

        if departed.is_host && !self.players.is_empty() {
            let mut promoted = self.players.remove(0);
            promoted.is_host = true;
            tracing::info!(room_id = %self.room_id, nickname = %promoted.nickname, "Player promoted to host");
            let nickname = promoted.nickname.clone();
            self.host = Some(promoted);
            self.host_claimed = false;
            self.push(Audience::All, ServerMessage::HostChanged { nickname });
        }

        self.push_player_list();
        true
    }

    fn push_player_list(&mut self) {
        let players: Vec<PlayerInfo> = self.players.iter().map(Member::info).collect();
        let player_count = players.len();
        self.push(
            Audience::All,
            ServerMessage::PlayerListUpdate {
                players,
                player_count,
            },
        );
    }

    fn info(&self) -> RoomInfo {
        let status = self
            .round
            .as_ref()
            .map_or(RoundStatus::Waiting, |round| round.status);
        RoomInfo {
            room_id: self.room_id.clone(),
            total_players: self.total_players,
            waiting_for_players: status != RoundStatus::Active,
            game_started: status == RoundStatus::Active,
            game_ended: status == RoundStatus::Ended,
            game_type: self.round.as_ref().map(|round| round.game_type().to_string()),
        }
    }
}

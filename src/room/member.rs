//! 방 멤버와 연결 핸들

use crate::protocol::PlayerInfo;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

pub type MemberId = Uuid;

/// 송신 태스크로 보내는 명령
#[derive(Debug, Clone)]
pub enum Outbound {
    /// 직렬화가 끝난 텍스트 프레임
    Frame(Arc<str>),
    /// 재접속으로 교체된 연결 닫기
    Close,
}

/// 연결 하나의 송신 채널. 송신 태스크 하나가 순서대로 소켓에 쓴다
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: Uuid,
    tx: UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    pub fn new() -> (Self, UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    /// 송신 태스크가 이미 끝났으면 false
    pub fn send(&self, frame: Arc<str>) -> bool {
        self.tx.send(Outbound::Frame(frame)).is_ok()
    }

    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}

#[derive(Debug)]
pub struct Member {
    pub id: MemberId,
    pub nickname: String,
    pub avatar: String,
    pub is_host: bool,
    pub score: u32,
    /// 매치/수집/타격 횟수 (동점 처리용)
    pub hits: u32,
    pub conn: ConnectionHandle,
}

impl Member {
    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            nickname: self.nickname.clone(),
            id: self.id.to_string(),
            is_host: self.is_host,
            score: self.score,
            avatar: self.avatar.clone(),
        }
    }
}

/// 새 연결의 참여 요청
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub nickname: String,
    pub avatar: String,
    pub wants_host: bool,
    pub conn: ConnectionHandle,
}

/// 참여 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attached {
    pub member_id: MemberId,
    pub is_host: bool,
    pub reconnected: bool,
}

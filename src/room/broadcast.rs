//! 방 브로드캐스트
//!
//! 방 상태를 바꾸는 코드는 메시지를 outbox에 쌓기만 하고, 잠금을 풀기 전에 `flush`가
//! 메시지마다 한 번 직렬화해서 대상 연결의 송신 채널에 넣는다. 실제 소켓 쓰기는
//! 연결별 송신 태스크가 하므로 느린 연결이 방 전체를 막지 않는다.

use super::member::{Member, MemberId};
use super::RoomState;
use crate::protocol::ServerMessage;
use std::sync::Arc;

/// 메시지를 받을 대상
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    All,
    Host,
    Players,
    Member(MemberId),
}

impl RoomState {
    pub(crate) fn push(&mut self, audience: Audience, message: ServerMessage) {
        self.outbox.push((audience, message));
    }

    pub(crate) fn push_all<I>(&mut self, messages: I)
    where
        I: IntoIterator<Item = ServerMessage>,
    {
        for message in messages {
            self.push(Audience::All, message);
        }
    }

    /// outbox 비우기. 방 잠금을 쥔 채로 호출한다
    pub(crate) fn flush(&mut self) {
        for (audience, message) in std::mem::take(&mut self.outbox) {
            let frame: Arc<str> = match serde_json::to_string(&message) {
                Ok(json) => json.into(),
                Err(err) => {
                    tracing::error!(room_id = %self.room_id, kind = message.kind(), error = %err, "Failed to encode message");
                    continue;
                }
            };

            for member in self.recipients(audience) {
                if !member.conn.send(frame.clone()) {
                    tracing::warn!(
                        room_id = %self.room_id,
                        nickname = %member.nickname,
                        kind = message.kind(),
                        "Connection writer gone, frame dropped"
                    );
                }
            }
        }
    }

    fn recipients(&self, audience: Audience) -> Vec<&Member> {
        let host = self.host.iter();
        match audience {
            Audience::All => host.chain(self.players.iter()).collect(),
            Audience::Host => host.collect(),
            Audience::Players => self.players.iter().collect(),
            Audience::Member(id) => host
                .chain(self.players.iter())
                .filter(|member| member.id == id)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::member::{ConnectionHandle, JoinRequest, Outbound};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn request(nickname: &str) -> (JoinRequest, UnboundedReceiver<Outbound>) {
        let (conn, rx) = ConnectionHandle::new();
        (
            JoinRequest {
                nickname: nickname.to_string(),
                avatar: "cat".to_string(),
                wants_host: false,
                conn,
            },
            rx,
        )
    }

    fn frames(rx: &mut UnboundedReceiver<Outbound>) -> Vec<String> {
        let mut kinds = Vec::new();
        while let Ok(Outbound::Frame(frame)) = rx.try_recv() {
            let value: serde_json::Value = serde_json::from_str(&frame).expect("json frame");
            kinds.push(value["type"].as_str().unwrap_or_default().to_string());
        }
        kinds
    }

    #[test]
    fn audiences_select_the_right_connections() {
        let mut state = RoomState::new("lobby");
        let (host, mut host_rx) = request("host");
        let (amy, mut amy_rx) = request("amy");
        state.join(host);
        let amy = state.join(amy);
        state.flush();
        frames(&mut host_rx);
        frames(&mut amy_rx);

        state.push(Audience::Host, ServerMessage::Waiting { message: "h".into() });
        state.push(Audience::Players, ServerMessage::TimeUpdate { time_left: 3 });
        state.push(Audience::Member(amy.member_id), ServerMessage::HostChanged { nickname: "x".into() });
        state.push(Audience::All, ServerMessage::TimeUpdate { time_left: 2 });
        state.flush();

        assert_eq!(frames(&mut host_rx), vec!["waiting", "timeUpdate"]);
        assert_eq!(frames(&mut amy_rx), vec!["timeUpdate", "hostChanged", "timeUpdate"]);
    }

    #[test]
    fn closed_connection_does_not_stop_broadcast() {
        let mut state = RoomState::new("lobby");
        let (host, host_rx) = request("host");
        let (amy, mut amy_rx) = request("amy");
        state.join(host);
        state.join(amy);
        drop(host_rx);

        state.push(Audience::All, ServerMessage::TimeUpdate { time_left: 1 });
        state.flush();

        assert!(frames(&mut amy_rx).contains(&"timeUpdate".to_string()));
    }
}

//! WebSocket 연결 핸들러

use super::dispatcher::HandlerCtx;
use crate::protocol::ClientEnvelope;
use crate::room::{ConnectionHandle, JoinRequest, Outbound};
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::sync::Arc;

pub const AVATARS: [&str; 8] = ["cat", "dog", "rabbit", "bear", "fox", "panda", "lion", "tiger"];

const DEFAULT_ROOM: &str = "default";
const DEFAULT_NICKNAME: &str = "Anonymous";

/// `/ws` 쿼리 파라미터
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub room_id: Option<String>,
    pub nickname: Option<String>,
    pub is_host: Option<String>,
}

impl ConnectParams {
    pub fn room_id(&self) -> String {
        non_empty(self.room_id.as_deref()).unwrap_or(DEFAULT_ROOM).to_string()
    }

    pub fn nickname(&self) -> String {
        non_empty(self.nickname.as_deref())
            .unwrap_or(DEFAULT_NICKNAME)
            .to_string()
    }

    pub fn wants_host(&self) -> bool {
        self.is_host.as_deref() == Some("true")
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn random_avatar() -> String {
    AVATARS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(AVATARS[0])
        .to_string()
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, params: ConnectParams) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (conn, mut rx) = ConnectionHandle::new();
    let conn_id = conn.id;

    // 송신 태스크 (이 연결의 유일한 writer)
    let send_task = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Frame(frame) => {
                    if ws_sender.send(Message::Text(frame.to_string())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let room_id = params.room_id();
    let request = JoinRequest {
        nickname: params.nickname(),
        avatar: random_avatar(),
        wants_host: params.wants_host(),
        conn,
    };
    let nickname = request.nickname.clone();

    let (room, attached) = match state.rooms.join(&room_id, request).await {
        Ok(joined) => joined,
        Err(err) => {
            tracing::warn!(room_id = %room_id, nickname = %nickname, error = %err, "Failed to join room");
            send_task.abort();
            return;
        }
    };

    tracing::info!(
        room_id = %room_id,
        nickname = %nickname,
        is_host = attached.is_host,
        reconnected = attached.reconnected,
        "New connection established"
    );

    let ctx = HandlerCtx {
        state: state.clone(),
        room: room.clone(),
        sender: attached.member_id,
    };

    // 수신 처리
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match ClientEnvelope::parse(&text) {
                Ok(envelope) => state.dispatcher.dispatch(ctx.clone(), envelope).await,
                Err(err) => {
                    tracing::warn!(room_id = %room_id, nickname = %nickname, error = %err, "Dropping malformed frame");
                }
            },
            Ok(Message::Close(_)) => break,
            Err(err) => {
                tracing::debug!(room_id = %room_id, nickname = %nickname, error = %err, "Socket read failed");
                break;
            }
            _ => {}
        }
    }

    // 연결 해제
    state.rooms.leave(&room, attached.member_id, conn_id).await;
    send_task.abort();
    tracing::info!(room_id = %room_id, nickname = %nickname, "Connection closed");
}

//! 조회용 HTTP 엔드포인트. 레지스트리 상태를 읽기만 한다

use crate::room::RoomInfo;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, Json},
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub async fn index_handler() -> Html<&'static str> {
    Html("<h1>Party Rooms Server</h1><p>WebSocket endpoint: /ws?roomId=&nickname=&isHost=</p>")
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "server": "party-rooms-rs",
        "rooms": state.rooms.len(),
        "games": state.catalog.game_types(),
        "timestamp": SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }))
}

pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<Value> {
    let rooms = state.rooms.list();
    Json(json!({ "count": rooms.len(), "rooms": rooms }))
}

pub async fn room_info(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomInfo>, StatusCode> {
    let room = state.rooms.get(&room_id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(room.info().await))
}

pub async fn room_players(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Json<Value> {
    let players = match state.rooms.get(&room_id) {
        Some(room) => room.members().await,
        None => Vec::new(),
    };
    Json(json!({ "players": players }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::room::tests::Client;

    async fn state_with_room() -> (Arc<AppState>, Client, Client) {
        let state = Arc::new(AppState::new(Config::default()));
        let (host, amy) = (Client::new(), Client::new());
        state.rooms.join("party", host.request("host", true)).await.expect("join");
        state.rooms.join("party", amy.request("amy", false)).await.expect("join");
        (state, host, amy)
    }

    #[tokio::test]
    async fn lists_live_rooms() {
        let (state, _host, _amy) = state_with_room().await;
        let Json(body) = list_rooms(State(state)).await;
        assert_eq!(body, json!({ "count": 1, "rooms": ["party"] }));
    }

    #[tokio::test]
    async fn room_info_reflects_membership() {
        let (state, _host, _amy) = state_with_room().await;
        let Json(info) = room_info(State(state.clone()), Path("party".to_string()))
            .await
            .expect("room exists");
        assert_eq!(info.total_players, 2);
        assert!(info.waiting_for_players);
        assert!(!info.game_started);

        let missing = room_info(State(state), Path("nope".to_string())).await;
        assert_eq!(missing.err(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn players_lists_host_first_and_unknown_room_is_empty() {
        let (state, _host, _amy) = state_with_room().await;
        let Json(body) = room_players(State(state.clone()), Path("party".to_string())).await;
        assert_eq!(body["players"][0]["nickname"], "host");
        assert_eq!(body["players"][0]["isHost"], true);
        assert_eq!(body["players"][1]["nickname"], "amy");

        let Json(body) = room_players(State(state.clone()), Path("nope".to_string())).await;
        assert_eq!(body, json!({ "players": [] }));
        // 조회가 방을 만들지 않는다
        assert_eq!(state.rooms.len(), 1);
    }
}

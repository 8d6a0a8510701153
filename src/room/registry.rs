//! 방 레지스트리 (room_id -> Room)

use super::{Attached, JoinRequest, MemberId, Room};
use crate::config::RoomConfig;
use crate::error::AttachError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// 닫힌 방과 경합할 때 다시 시도하는 횟수
const ATTACH_ATTEMPTS: usize = 3;

pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
    config: RoomConfig,
}

impl RoomRegistry {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: DashMap::new(),
            config,
        }
    }

    /// 방 조회 또는 생성. 닫힌 방이 남아 있으면 새 방으로 교체한다
    pub fn get_or_create(&self, room_id: &str) -> Arc<Room> {
        match self.rooms.entry(room_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_closed() {
                    tracing::debug!(room_id = %room_id, "Replacing closed room");
                    entry.insert(Room::new(room_id, &self.config));
                }
                entry.get().clone()
            }
            Entry::Vacant(entry) => entry.insert(Room::new(room_id, &self.config)).clone(),
        }
    }

    pub fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.get(room_id).map(|room| room.clone())
    }

    /// 같은 인스턴스일 때만 제거 (그 사이 새로 만들어진 방은 건드리지 않음)
    pub fn remove(&self, room: &Arc<Room>) -> bool {
        let removed = self
            .rooms
            .remove_if(room.id(), |_, current| Arc::ptr_eq(current, room))
            .is_some();
        if removed {
            tracing::info!(room_id = %room.id(), "Room deleted");
        }
        removed
    }

    /// 방 참여. 닫히는 중인 방을 만나면 새로 조회해서 다시 시도한다
    pub async fn join(
        &self,
        room_id: &str,
        request: JoinRequest,
    ) -> Result<(Arc<Room>, Attached), AttachError> {
        let mut last_err = AttachError::RoomClosed(room_id.to_string());
        for _ in 0..ATTACH_ATTEMPTS {
            let room = self.get_or_create(room_id);
            match room.attach(request.clone()).await {
                Ok(attached) => return Ok((room, attached)),
                Err(err) => {
                    tracing::debug!(room_id = %room_id, error = %err, "Attach raced with room close, retrying");
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    /// 멤버 제거. 방이 비면 레지스트리에서도 제거
    pub async fn leave(&self, room: &Arc<Room>, member_id: MemberId, conn_id: Uuid) {
        if room.detach(member_id, conn_id).await {
            self.remove(room);
        }
    }

    /// 현재 방 ID 목록 (정렬됨)
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.rooms.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// 빈 방 정리. 잠금을 쥔 채 await하지 않도록 목록을 먼저 복사한다
    pub async fn sweep(&self) -> usize {
        let rooms: Vec<Arc<Room>> = self.rooms.iter().map(|entry| entry.value().clone()).collect();
        let mut deleted = 0;
        for room in rooms {
            if room.close_if_empty().await && self.remove(&room) {
                deleted += 1;
            }
        }
        if deleted > 0 {
            tracing::info!(deleted_rooms = deleted, "Cleanup completed");
        }
        deleted
    }
}

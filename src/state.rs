//! 애플리케이션 상태 관리

use crate::config::Config;
use crate::games::{self, GameCatalog};
use crate::handlers::{platform, Dispatcher};
use crate::room::RoomRegistry;
use std::sync::Arc;

/// 전역 애플리케이션 상태
pub struct AppState {
    /// 방 정보 (room_id -> Room)
    pub rooms: RoomRegistry,
    /// 메시지 타입 -> 핸들러
    pub dispatcher: Dispatcher,
    /// gameType -> 게임 생성 함수
    pub catalog: GameCatalog,
    /// 설정
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let dispatcher = Dispatcher::new();
        platform::register(&dispatcher);
        games::register_actions(&dispatcher);

        Self {
            rooms: RoomRegistry::new(config.room.clone()),
            dispatcher,
            catalog: GameCatalog::builtin(),
            config: Arc::new(config),
        }
    }
}

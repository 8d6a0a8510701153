//! 환경 변수 기반 설정 관리

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// 서버 설정
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub room: RoomConfig,
    pub log_level: String,
}

/// 방 설정
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// 방마다 대기할 수 있는 재접속 요청 수
    pub reconnect_queue_size: usize,
    pub reconnect_timeout_ms: u64,
    /// 라운드 시작에 필요한 최소 인원 (호스트 포함)
    pub min_players_to_start: usize,
    pub sweep_interval_secs: u64,
}

impl RoomConfig {
    pub fn reconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.reconnect_timeout_ms)
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            reconnect_queue_size: 10,
            reconnect_timeout_ms: 5000,
            min_players_to_start: 1,
            sweep_interval_secs: 300,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            cors_origins: vec!["*".to_string()],
            room: RoomConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = RoomConfig::default();

        Self {
            port: parse_var("PORT", 8080),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            room: RoomConfig {
                reconnect_queue_size: parse_var(
                    "RECONNECT_QUEUE_SIZE",
                    defaults.reconnect_queue_size,
                )
                .max(1),
                reconnect_timeout_ms: parse_var(
                    "RECONNECT_TIMEOUT_MS",
                    defaults.reconnect_timeout_ms,
                ),
                min_players_to_start: parse_var(
                    "MIN_PLAYERS_TO_START",
                    defaults.min_players_to_start,
                ),
                sweep_interval_secs: parse_var(
                    "ROOM_SWEEP_INTERVAL_SECS",
                    defaults.sweep_interval_secs,
                )
                .max(1),
            },
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// CORS 허용 출처가 와일드카드인지
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

//! 라운드 엔진 (전송 계층과 무관한 부분)

pub mod board;
pub mod ranking;
pub mod round;
pub mod settings;
pub mod timer;

pub use round::{
    Award, EndReason, GameAction, GameRules, Job, JobKind, Pick, Round, RoundCtx, RoundStatus,
};
pub use settings::SettingsMap;

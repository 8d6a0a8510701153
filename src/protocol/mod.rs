//! 클라이언트-서버 프로토콜

pub mod envelope;
pub mod messages;

pub use envelope::ClientEnvelope;
pub use messages::{PlayerInfo, ServerMessage};

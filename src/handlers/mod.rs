//! 핸들러 모듈

pub mod api;
pub mod connection;
pub mod dispatcher;
pub mod platform;

pub use api::*;
pub use connection::ws_handler;
pub use dispatcher::Dispatcher;

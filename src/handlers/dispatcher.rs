//! 메시지 타입 → 핸들러 디스패처
//!
//! 게임별 메시지는 시작 시 각 게임 모듈이 등록한다. 등록되지 않은 타입은
//! 기본 플랫폼 메시지(join, notifyPlatformPlayers, hostCloseGame)로 처리하고,
//! 그것도 아니면 버린다.

use super::platform;
use crate::protocol::ClientEnvelope;
use crate::room::{MemberId, Room};
use crate::state::AppState;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;

/// 핸들러 호출 컨텍스트 (누가, 어느 방에서)
#[derive(Clone)]
pub struct HandlerCtx {
    pub state: Arc<AppState>,
    pub room: Arc<Room>,
    pub sender: MemberId,
}

type BoxedHandler = Arc<dyn Fn(HandlerCtx, ClientEnvelope) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default)]
pub struct Dispatcher {
    handlers: DashMap<String, BoxedHandler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 핸들러 등록. 페이로드는 `M`으로 디코딩되고, 실패하면 핸들러를 부르지 않는다
    ///
    /// 같은 타입을 다시 등록하면 나중 것이 이긴다.
    pub fn register<M, F, Fut>(&self, kind: &str, handler: F)
    where
        M: DeserializeOwned + Send + 'static,
        F: Fn(HandlerCtx, M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let erased: BoxedHandler = Arc::new(move |ctx: HandlerCtx, envelope: ClientEnvelope| {
            match envelope.decode::<M>() {
                Ok(message) => handler(ctx, message).boxed(),
                Err(err) => {
                    tracing::warn!(room_id = %ctx.room.id(), member_id = %ctx.sender, error = %err, "Dropping malformed message");
                    futures::future::ready(()).boxed()
                }
            }
        });

        if self.handlers.insert(kind.to_string(), erased).is_some() {
            tracing::warn!(kind = %kind, "Handler overwritten");
        }
    }

    pub async fn dispatch(&self, ctx: HandlerCtx, envelope: ClientEnvelope) {
        // 맵 잠금을 쥔 채 await하지 않도록 핸들러만 복사
        let handler = self.handlers.get(&envelope.kind).map(|h| Arc::clone(h.value()));
        if let Some(handler) = handler {
            handler(ctx, envelope).await;
            return;
        }

        match envelope.kind.as_str() {
            "join" => platform::handle_join(ctx).await,
            "notifyPlatformPlayers" => match envelope.decode() {
                Ok(message) => platform::handle_notify(ctx, message).await,
                Err(err) => tracing::warn!(error = %err, "Dropping malformed message"),
            },
            "hostCloseGame" => platform::handle_close_game(ctx).await,
            other => {
                tracing::debug!(kind = %other, room_id = %ctx.room.id(), "Unhandled message type dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::room::tests::Client;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Deserialize)]
    struct Ping {
        n: u32,
    }

    async fn ctx() -> HandlerCtx {
        let state = Arc::new(AppState::new(Config::default()));
        let client = Client::new();
        let (room, attached) = state
            .rooms
            .join("lobby", client.request("host", true))
            .await
            .expect("join");
        HandlerCtx {
            state,
            room,
            sender: attached.member_id,
        }
    }

    #[tokio::test]
    async fn registered_handler_receives_decoded_payload() {
        let dispatcher = Dispatcher::new();
        let seen = Arc::new(AtomicU32::new(0));
        let counter = seen.clone();
        dispatcher.register("ping", move |_ctx, ping: Ping| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(ping.n, Ordering::SeqCst);
            }
        });

        let ctx = ctx().await;
        let envelope = ClientEnvelope::parse(r#"{"type":"ping","data":{"n":3}}"#).expect("parse");
        dispatcher.dispatch(ctx.clone(), envelope).await;
        let flat = ClientEnvelope::parse(r#"{"type":"ping","n":4}"#).expect("parse");
        dispatcher.dispatch(ctx, flat).await;

        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn malformed_payload_skips_handler() {
        let dispatcher = Dispatcher::new();
        let seen = Arc::new(AtomicU32::new(0));
        let counter = seen.clone();
        dispatcher.register("ping", move |_ctx, _ping: Ping| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let envelope = ClientEnvelope::parse(r#"{"type":"ping","data":{"n":"three"}}"#).expect("parse");
        dispatcher.dispatch(ctx().await, envelope).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let dispatcher = Dispatcher::new();
        let seen = Arc::new(AtomicU32::new(0));
        for value in [1, 10] {
            let counter = seen.clone();
            dispatcher.register("ping", move |_ctx, _ping: Ping| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(value, Ordering::SeqCst);
                }
            });
        }

        let envelope = ClientEnvelope::parse(r#"{"type":"ping","n":0}"#).expect("parse");
        dispatcher.dispatch(ctx().await, envelope).await;
        assert_eq!(seen.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn unknown_type_is_dropped() {
        let dispatcher = Dispatcher::new();
        let seen = Arc::new(AtomicU32::new(0));
        let counter = seen.clone();
        dispatcher.register("ping", move |_ctx, _ping: Ping| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let envelope = ClientEnvelope::parse(r#"{"type":"doesNotExist","n":1}"#).expect("parse");
        dispatcher.dispatch(ctx().await, envelope).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }
}

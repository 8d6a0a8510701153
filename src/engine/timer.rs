//! 라운드 타이머
//!
//! 카운트다운, 스폰 주기, 엔티티 만료, 카드 되돌리기 모두 이 두 함수로 돌아간다.
//! 모든 타이머는 취소 토큰에 묶여 있어서 라운드 종료나 방 정리 시 함께 멈춘다.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// `period`마다 `on_tick` 실행. 콜백이 `Break`를 반환하거나 토큰이 취소되면 종료
///
/// 첫 틱은 시작 후 `period`가 지난 시점에 온다.
pub fn spawn_ticker<F, Fut>(
    period: Duration,
    token: CancellationToken,
    mut on_tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ControlFlow<()>> + Send + 'static,
{
    let period = period.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    if on_tick().await.is_break() {
                        break;
                    }
                }
            }
        }
    })
}

/// `delay` 후 한 번 실행. 그 전에 토큰이 취소되면 실행하지 않음
pub fn spawn_after<F, Fut>(delay: Duration, token: CancellationToken, job: F) -> JoinHandle<()>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(delay) => job().await,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn ticker_stops_when_callback_breaks() {
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = ticks.clone();
        let handle = spawn_ticker(Duration::from_secs(1), CancellationToken::new(), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        });

        handle.await.expect("ticker task");
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_first_tick_waits_one_period() {
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = ticks.clone();
        let token = CancellationToken::new();
        let _handle = spawn_ticker(Duration::from_secs(1), token.clone(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_ticker_observes_no_more_ticks() {
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = ticks.clone();
        let token = CancellationToken::new();
        let handle = spawn_ticker(Duration::from_secs(1), token.clone(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        token.cancel();
        handle.await.expect("ticker task");
        let seen = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
        assert_eq!(seen, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_job_is_skipped_after_cancel() {
        let fired = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();

        let counter = fired.clone();
        let skipped = spawn_after(Duration::from_secs(2), token.clone(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = fired.clone();
        let ran = spawn_after(Duration::from_secs(1), CancellationToken::new(), move || async move {
            counter.fetch_add(10, Ordering::SeqCst);
        });

        token.cancel();
        skipped.await.expect("job task");
        ran.await.expect("job task");
        assert_eq!(fired.load(Ordering::SeqCst), 10);
    }
}

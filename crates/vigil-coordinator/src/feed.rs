//! 전략 피드 어댑터.
//!
//! 외부 지표 엔진이 발행하는 Decision 레코드를 mpsc 채널로
//! 수신합니다. 코디네이터는 단일 소비자 태스크로 채널을 읽어
//! Decision 맵에 대한 단일 작성자 규율을 유지합니다.
//!
//! 재구독: `subscribe()`가 새 수신자를 만들면 이전 구독은
//! 무효화됩니다 (이전 송신자가 폐기되어 채널이 닫힘). 정체 감시가
//! 피드 재시작을 트리거할 때 이 경로를 사용합니다.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use vigil_core::Decision;

/// Decision 피드 추상화.
///
/// 실제 구현은 지표 엔진과의 연결(웹소켓, IPC 등)을 감싸지만,
/// 코디네이터는 구독 → 수신자 채널만 알면 됩니다.
#[async_trait]
pub trait DecisionFeed: Send + Sync {
    /// 새 구독 생성. 기존 구독은 무효화됩니다.
    async fn subscribe(&self) -> mpsc::Receiver<Decision>;
}

/// 채널 기반 피드.
///
/// 발행자는 `publish()`로 현재 구독자에게 Decision을 전달합니다.
/// 구독이 없거나 이전 구독이 무효화된 경우 발행은 버려집니다.
pub struct ChannelFeed {
    capacity: usize,
    current_tx: Mutex<Option<mpsc::Sender<Decision>>>,
}

impl ChannelFeed {
    /// 지정한 버퍼 용량으로 생성.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            current_tx: Mutex::new(None),
        }
    }

    /// 현재 구독자에게 Decision 발행.
    ///
    /// 전달 성공 시 true. 구독자가 없거나 채널이 가득 차 있으면
    /// false (피드는 최신 틱이 중요하므로 블로킹하지 않음).
    pub async fn publish(&self, decision: Decision) -> bool {
        let guard = self.current_tx.lock().await;
        match guard.as_ref() {
            Some(tx) => match tx.try_send(decision) {
                Ok(()) => true,
                Err(e) => {
                    debug!("Decision 발행 실패 (구독자 지연/종료): {}", e);
                    false
                }
            },
            None => false,
        }
    }
}

#[async_trait]
impl DecisionFeed for ChannelFeed {
    async fn subscribe(&self) -> mpsc::Receiver<Decision> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut guard = self.current_tx.lock().await;
        // 이전 송신자 폐기 → 이전 구독 채널 닫힘
        *guard = Some(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use vigil_core::{TrendBias, TrendReading};

    fn decision(symbol: &str) -> Decision {
        Decision::observation(
            symbol,
            TrendReading {
                htf_bias: TrendBias::Bullish,
                ltf_bias: TrendBias::Bullish,
                strength: 20.0,
                alignment_count: 2,
            },
            dec!(1),
        )
    }

    #[tokio::test]
    async fn test_publish_without_subscriber_is_dropped() {
        let feed = ChannelFeed::new(8);
        assert!(!feed.publish(decision("BTCUSDT")).await);
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let feed = ChannelFeed::new(8);
        let mut rx = feed.subscribe().await;

        assert!(feed.publish(decision("BTCUSDT")).await);
        let received = rx.recv().await.unwrap();
        assert_eq!(received.symbol, "BTCUSDT");
    }

    #[tokio::test]
    async fn test_resubscribe_invalidates_old_receiver() {
        let feed = ChannelFeed::new(8);
        let mut old_rx = feed.subscribe().await;
        let mut new_rx = feed.subscribe().await;

        // 이전 구독 채널은 닫힘
        assert!(old_rx.recv().await.is_none());

        assert!(feed.publish(decision("ETHUSDT")).await);
        assert_eq!(new_rx.recv().await.unwrap().symbol, "ETHUSDT");
    }
}

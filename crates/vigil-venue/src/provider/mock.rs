//! 테스트용 인메모리 Mock 베뉴.
//!
//! 코디네이터 통합 테스트에서 실제 베뉴 대신 사용합니다.
//! 스크립트된 포지션/주문/지갑 상태를 반환하고, 제출된 인텐트와
//! 취소/청산/보호 호출을 기록합니다. 호출 지점별 실패 주입과
//! 인위적 지연을 지원합니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use vigil_core::{
    ClosedPnlRecord, ExecutionRecord, OrderIntent, OrderInfo, PositionInfo, Side, WalletSnapshot,
};

use crate::error::VenueError;

use super::{ProtectionUpdate, ReconcileReport, VenueDataProvider, VenueOrderProvider};

/// 호출 지점별 실패 플래그.
#[derive(Debug, Default, Clone)]
pub struct FailFlags {
    pub positions: bool,
    pub orders: bool,
    pub executions: bool,
    pub wallet: bool,
    pub closed_pnl: bool,
    pub reconcile: bool,
    pub place: bool,
    pub cancel: bool,
    pub close: bool,
    pub protection: bool,
}

#[derive(Debug, Default)]
struct MockState {
    positions: Vec<PositionInfo>,
    orders: Vec<OrderInfo>,
    executions: Vec<ExecutionRecord>,
    wallet: Option<WalletSnapshot>,
    closed_pnl: Vec<ClosedPnlRecord>,
    fail: FailFlags,

    // 기록
    placed: Vec<OrderIntent>,
    cancelled: Vec<(String, String)>,
    closed: Vec<(String, Side, Decimal)>,
    protections: Vec<ProtectionUpdate>,
}

/// 인메모리 Mock 베뉴.
pub struct MockVenue {
    state: Mutex<MockState>,
    /// 주문 제출에 적용할 인위적 지연
    place_delay: Mutex<Option<Duration>>,
    order_seq: AtomicU64,
}

impl Default for MockVenue {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVenue {
    /// 빈 상태의 Mock 베뉴 생성.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            place_delay: Mutex::new(None),
            order_seq: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ==================== 상태 스크립팅 ====================

    /// 포지션 스냅샷 설정.
    pub fn set_positions(&self, positions: Vec<PositionInfo>) {
        self.lock().positions = positions;
    }

    /// 주문 스냅샷 설정.
    pub fn set_orders(&self, orders: Vec<OrderInfo>) {
        self.lock().orders = orders;
    }

    /// 체결 스냅샷 설정.
    pub fn set_executions(&self, executions: Vec<ExecutionRecord>) {
        self.lock().executions = executions;
    }

    /// 지갑 설정.
    pub fn set_wallet(&self, wallet: WalletSnapshot) {
        self.lock().wallet = Some(wallet);
    }

    /// 청산 손익 레코드 추가.
    pub fn push_closed_pnl(&self, record: ClosedPnlRecord) {
        self.lock().closed_pnl.push(record);
    }

    /// 실패 플래그 설정.
    pub fn set_fail(&self, fail: FailFlags) {
        self.lock().fail = fail;
    }

    /// 주문 제출 지연 설정.
    pub fn set_place_delay(&self, delay: Duration) {
        *self.place_delay.lock().unwrap_or_else(|e| e.into_inner()) = Some(delay);
    }

    // ==================== 기록 조회 ====================

    /// 제출된 인텐트 목록.
    pub fn placed_intents(&self) -> Vec<OrderIntent> {
        self.lock().placed.clone()
    }

    /// 취소 호출 목록 (symbol, order_id).
    pub fn cancelled_orders(&self) -> Vec<(String, String)> {
        self.lock().cancelled.clone()
    }

    /// 청산 호출 목록 (symbol, side, qty).
    pub fn closed_positions(&self) -> Vec<(String, Side, Decimal)> {
        self.lock().closed.clone()
    }

    /// 보호 설정 호출 목록.
    pub fn protection_calls(&self) -> Vec<ProtectionUpdate> {
        self.lock().protections.clone()
    }
}

#[async_trait]
impl VenueDataProvider for MockVenue {
    async fn fetch_positions(&self) -> Result<Vec<PositionInfo>, VenueError> {
        let state = self.lock();
        if state.fail.positions {
            return Err(VenueError::Network("mock: 포지션 조회 실패".to_string()));
        }
        Ok(state.positions.clone())
    }

    async fn fetch_open_orders(&self) -> Result<Vec<OrderInfo>, VenueError> {
        let state = self.lock();
        if state.fail.orders {
            return Err(VenueError::Network("mock: 주문 조회 실패".to_string()));
        }
        Ok(state.orders.clone())
    }

    async fn fetch_recent_executions(&self) -> Result<Vec<ExecutionRecord>, VenueError> {
        let state = self.lock();
        if state.fail.executions {
            return Err(VenueError::Network("mock: 체결 조회 실패".to_string()));
        }
        Ok(state.executions.clone())
    }

    async fn fetch_wallet(&self) -> Result<WalletSnapshot, VenueError> {
        let state = self.lock();
        if state.fail.wallet {
            return Err(VenueError::Network("mock: 지갑 조회 실패".to_string()));
        }
        state
            .wallet
            .clone()
            .ok_or_else(|| VenueError::Api {
                code: -1,
                message: "mock: 지갑 미설정".to_string(),
            })
    }

    async fn fetch_closed_pnl(
        &self,
        _lookback: Duration,
    ) -> Result<Vec<ClosedPnlRecord>, VenueError> {
        let state = self.lock();
        if state.fail.closed_pnl {
            return Err(VenueError::Network("mock: 손익 조회 실패".to_string()));
        }
        Ok(state.closed_pnl.clone())
    }

    async fn fetch_reconcile_report(&self) -> Result<ReconcileReport, VenueError> {
        let state = self.lock();
        if state.fail.reconcile {
            return Err(VenueError::Network("mock: 정합성 조회 실패".to_string()));
        }
        Ok(ReconcileReport {
            open_positions: state.positions.len(),
            open_orders: state.orders.len(),
            fetched_at: Utc::now(),
        })
    }

    fn venue_name(&self) -> &str {
        "MockVenue"
    }

    fn last_latency(&self) -> Option<Duration> {
        Some(Duration::from_millis(1))
    }
}

#[async_trait]
impl VenueOrderProvider for MockVenue {
    async fn place_order(&self, intent: &OrderIntent) -> Result<String, VenueError> {
        let delay = *self.place_delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if state.fail.place {
            return Err(VenueError::Api {
                code: 110007,
                message: "mock: 주문 거부".to_string(),
            });
        }
        state.placed.push(intent.clone());
        let seq = self.order_seq.fetch_add(1, Ordering::Relaxed);
        Ok(format!("mock-order-{}", seq))
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), VenueError> {
        let mut state = self.lock();
        if state.fail.cancel {
            return Err(VenueError::Api {
                code: 110001,
                message: "mock: 취소 실패".to_string(),
            });
        }
        state
            .cancelled
            .push((symbol.to_string(), order_id.to_string()));
        Ok(())
    }

    async fn close_position_market(
        &self,
        symbol: &str,
        side: Side,
        qty: Decimal,
    ) -> Result<String, VenueError> {
        let mut state = self.lock();
        if state.fail.close {
            return Err(VenueError::Api {
                code: 110017,
                message: "mock: 청산 실패".to_string(),
            });
        }
        state.closed.push((symbol.to_string(), side, qty));
        let seq = self.order_seq.fetch_add(1, Ordering::Relaxed);
        Ok(format!("mock-close-{}", seq))
    }

    async fn set_protection(&self, update: &ProtectionUpdate) -> Result<(), VenueError> {
        let mut state = self.lock();
        if state.fail.protection {
            return Err(VenueError::Api {
                code: 110043,
                message: "mock: 보호 설정 실패".to_string(),
            });
        }
        state.protections.push(update.clone());
        Ok(())
    }

    fn venue_name(&self) -> &str {
        "MockVenue"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use vigil_core::EntryKind;

    fn intent() -> OrderIntent {
        OrderIntent::new(
            "standard",
            "BTCUSDT",
            Side::Buy,
            EntryKind::Limit,
            dec!(50000),
            dec!(49000),
            None,
            dec!(0.1),
        )
    }

    #[tokio::test]
    async fn test_place_and_record() {
        let venue = MockVenue::new();
        let order_id = venue.place_order(&intent()).await.unwrap();
        assert!(order_id.starts_with("mock-order-"));
        assert_eq!(venue.placed_intents().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_injection() {
        let venue = MockVenue::new();
        venue.set_fail(FailFlags {
            positions: true,
            ..FailFlags::default()
        });

        assert!(venue.fetch_positions().await.is_err());
        // 다른 호출은 영향 없음
        assert!(venue.fetch_open_orders().await.is_ok());
    }

    #[tokio::test]
    async fn test_wallet_unset_is_api_error() {
        let venue = MockVenue::new();
        let err = venue.fetch_wallet().await.unwrap_err();
        assert!(matches!(err, VenueError::Api { .. }));
    }
}

//! 베뉴 중립 Provider trait.
//!
//! 조회(`VenueDataProvider`)와 주문 실행(`VenueOrderProvider`)을
//! 분리하여 관심사를 나눕니다. 코디네이터는 두 trait만 의존하므로
//! 실제 베뉴와 테스트용 Mock을 동일하게 다룰 수 있습니다.

pub mod bybit;
pub mod mock;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vigil_core::{
    ClosedPnlRecord, ExecutionRecord, OrderIntent, OrderInfo, PositionInfo, Side, WalletSnapshot,
};

use crate::error::VenueError;

pub use bybit::BybitVenue;
pub use mock::{FailFlags, MockVenue};

/// 베뉴 측 정합성 리포트.
///
/// 베뉴가 보고하는 오픈 주문/포지션 개수로, 로컬 미러와의
/// 불일치를 탐지하는 데 사용됩니다. 불일치는 시스템 이벤트로
/// 기록될 뿐 자동 치유하지 않습니다 - 다음 빠른 틱이 어차피
/// 권위 있는 상태를 다시 가져옵니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// 베뉴가 보고한 오픈 포지션 수
    pub open_positions: usize,
    /// 베뉴가 보고한 오픈 주문 수
    pub open_orders: usize,
    /// 조회 시각
    pub fetched_at: DateTime<Utc>,
}

/// 포지션 보호(손절/목표/트레일링) 갱신 요청.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectionUpdate {
    /// 심볼
    pub symbol: String,
    /// 포지션 인덱스 와이어 값
    pub position_idx: u8,
    /// 손절가 (None이면 유지)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    /// 목표가 (None이면 유지)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    /// 트레일링 간격 (None이면 유지)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailing_stop: Option<Decimal>,
    /// 트레일링 활성화 가격 (None이면 즉시)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_price: Option<Decimal>,
}

/// 베뉴 조회 trait.
///
/// 빠른 루프(포지션/주문/체결)와 느린 루프(지갑/손익/정합성)가
/// 사용하는 모든 읽기 호출을 제공합니다.
#[async_trait]
pub trait VenueDataProvider: Send + Sync {
    /// 오픈 포지션 조회.
    async fn fetch_positions(&self) -> Result<Vec<PositionInfo>, VenueError>;

    /// 오픈 주문 조회.
    async fn fetch_open_orders(&self) -> Result<Vec<OrderInfo>, VenueError>;

    /// 최근 체결 내역 조회.
    async fn fetch_recent_executions(&self) -> Result<Vec<ExecutionRecord>, VenueError>;

    /// 지갑 잔고 조회.
    async fn fetch_wallet(&self) -> Result<WalletSnapshot, VenueError>;

    /// 청산 손익 조회 (제한된 조회 구간).
    async fn fetch_closed_pnl(&self, lookback: Duration) -> Result<Vec<ClosedPnlRecord>, VenueError>;

    /// 베뉴 측 정합성 리포트 조회.
    async fn fetch_reconcile_report(&self) -> Result<ReconcileReport, VenueError>;

    /// 베뉴 이름.
    fn venue_name(&self) -> &str;

    /// 마지막 호출 왕복 지연.
    ///
    /// 진단 표시용이며, 아직 호출이 없으면 None.
    fn last_latency(&self) -> Option<Duration>;
}

/// 베뉴 주문 실행 trait.
#[async_trait]
pub trait VenueOrderProvider: Send + Sync {
    /// 인텐트 제출.
    ///
    /// 인텐트의 `order_link_id()`가 베뉴 클라이언트 주문 ID로
    /// 전달되어 멱등성을 보장합니다. 반환값은 베뉴 주문 ID.
    async fn place_order(&self, intent: &OrderIntent) -> Result<String, VenueError>;

    /// 주문 취소.
    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), VenueError>;

    /// 포지션 시장가 청산 (reduce-only).
    async fn close_position_market(
        &self,
        symbol: &str,
        side: Side,
        qty: Decimal,
    ) -> Result<String, VenueError>;

    /// 포지션 보호 설정 (손절/목표/트레일링).
    async fn set_protection(&self, update: &ProtectionUpdate) -> Result<(), VenueError>;

    /// 베뉴 이름.
    fn venue_name(&self) -> &str;
}

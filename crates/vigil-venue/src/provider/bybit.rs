//! Bybit VenueDataProvider + VenueOrderProvider 구현.
//!
//! `BybitClient`를 래핑하여 베뉴 중립 인터페이스를 제공합니다.
//! 와이어 행 → 도메인 변환에 실패한 행은 경고 로그와 함께
//! 스냅샷에서 제외됩니다 (예외로 전파하지 않음).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use vigil_core::{
    ClosedPnlRecord, EntryKind, ExecutionRecord, OrderIntent, OrderInfo, PositionInfo, Side,
    WalletSnapshot,
};

use crate::connector::bybit::BybitClient;
use crate::error::VenueError;

use super::{ProtectionUpdate, ReconcileReport, VenueDataProvider, VenueOrderProvider};

/// Bybit 베뉴 Provider.
pub struct BybitVenue {
    client: Arc<BybitClient>,
    name: &'static str,
}

impl BybitVenue {
    /// 새 Provider 생성.
    pub fn new(client: Arc<BybitClient>) -> Self {
        let name = if client.is_testnet() {
            "Bybit-Testnet"
        } else {
            "Bybit"
        };
        Self { client, name }
    }

    fn side_wire(side: Side) -> &'static str {
        match side {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }
}

#[async_trait]
impl VenueDataProvider for BybitVenue {
    async fn fetch_positions(&self) -> Result<Vec<PositionInfo>, VenueError> {
        let rows = self.client.get_positions().await?;
        let total = rows.len();
        let positions: Vec<PositionInfo> =
            rows.into_iter().filter_map(|row| row.into_domain()).collect();
        if positions.len() < total {
            warn!(
                dropped = total - positions.len(),
                "유효성 검증에 실패한 포지션 행 제외"
            );
        }
        Ok(positions)
    }

    async fn fetch_open_orders(&self) -> Result<Vec<OrderInfo>, VenueError> {
        let rows = self.client.get_open_orders().await?;
        let total = rows.len();
        let orders: Vec<OrderInfo> =
            rows.into_iter().filter_map(|row| row.into_domain()).collect();
        if orders.len() < total {
            warn!(
                dropped = total - orders.len(),
                "유효성 검증에 실패한 주문 행 제외"
            );
        }
        Ok(orders)
    }

    async fn fetch_recent_executions(&self) -> Result<Vec<ExecutionRecord>, VenueError> {
        let rows = self.client.get_executions(50).await?;
        Ok(rows.into_iter().filter_map(|row| row.into_domain()).collect())
    }

    async fn fetch_wallet(&self) -> Result<WalletSnapshot, VenueError> {
        let rows = self.client.get_wallet().await?;
        rows.into_iter()
            .find_map(|row| row.into_domain())
            .ok_or_else(|| VenueError::Parse("지갑 응답에 사용 가능한 계좌 없음".to_string()))
    }

    async fn fetch_closed_pnl(
        &self,
        lookback: Duration,
    ) -> Result<Vec<ClosedPnlRecord>, VenueError> {
        let start_ms = Utc::now().timestamp_millis() - lookback.as_millis() as i64;
        let rows = self.client.get_closed_pnl(start_ms).await?;
        Ok(rows.into_iter().filter_map(|row| row.into_domain()).collect())
    }

    async fn fetch_reconcile_report(&self) -> Result<ReconcileReport, VenueError> {
        // 베뉴가 보고하는 개수만 취합하는 경량 호출
        let positions = self.client.get_positions().await?;
        let orders = self.client.get_open_orders().await?;
        Ok(ReconcileReport {
            open_positions: positions.len(),
            open_orders: orders.len(),
            fetched_at: Utc::now(),
        })
    }

    fn venue_name(&self) -> &str {
        self.name
    }

    fn last_latency(&self) -> Option<Duration> {
        self.client.last_latency()
    }
}

#[async_trait]
impl VenueOrderProvider for BybitVenue {
    async fn place_order(&self, intent: &OrderIntent) -> Result<String, VenueError> {
        let mut body = serde_json::json!({
            "category": "linear",
            "symbol": intent.symbol,
            "side": Self::side_wire(intent.side),
            "qty": intent.qty.to_string(),
            "orderLinkId": intent.order_link_id(),
            "stopLoss": intent.stop_loss.to_string(),
            "timeInForce": "GTC",
        });

        match intent.entry_kind {
            EntryKind::Market => {
                body["orderType"] = "Market".into();
            }
            EntryKind::Limit => {
                body["orderType"] = "Limit".into();
                body["price"] = intent.entry.to_string().into();
            }
            EntryKind::LimitMaker => {
                body["orderType"] = "Limit".into();
                body["price"] = intent.entry.to_string().into();
                body["timeInForce"] = "PostOnly".into();
            }
            EntryKind::Conditional => {
                body["orderType"] = "Limit".into();
                body["price"] = intent.entry.to_string().into();
                if let Some(trigger) = intent.trigger_price {
                    body["triggerPrice"] = trigger.to_string().into();
                }
            }
        }

        if let Some(tp) = intent.take_profit {
            body["takeProfit"] = tp.to_string().into();
        }

        info!(
            symbol = %intent.symbol,
            side = %intent.side,
            entry_kind = %intent.entry_kind,
            qty = %intent.qty,
            link_id = %intent.order_link_id(),
            "베뉴 주문 제출"
        );

        let result = self.client.create_order(body).await?;
        Ok(result.order_id)
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), VenueError> {
        info!(symbol = %symbol, order_id = %order_id, "베뉴 주문 취소");
        self.client.cancel_order(symbol, order_id).await
    }

    async fn close_position_market(
        &self,
        symbol: &str,
        side: Side,
        qty: Decimal,
    ) -> Result<String, VenueError> {
        // side는 청산 주문 자체의 방향 (포지션의 반대 방향)
        let body = serde_json::json!({
            "category": "linear",
            "symbol": symbol,
            "side": Self::side_wire(side),
            "orderType": "Market",
            "qty": qty.to_string(),
            "reduceOnly": true,
            "timeInForce": "IOC",
        });

        info!(symbol = %symbol, side = %side, qty = %qty, "포지션 시장가 청산 제출");

        let result = self.client.create_order(body).await?;
        Ok(result.order_id)
    }

    async fn set_protection(&self, update: &ProtectionUpdate) -> Result<(), VenueError> {
        let mut body = serde_json::json!({
            "category": "linear",
            "symbol": update.symbol,
            "positionIdx": update.position_idx,
        });
        if let Some(sl) = update.stop_loss {
            body["stopLoss"] = sl.to_string().into();
        }
        if let Some(tp) = update.take_profit {
            body["takeProfit"] = tp.to_string().into();
        }
        if let Some(trail) = update.trailing_stop {
            body["trailingStop"] = trail.to_string().into();
        }
        if let Some(active) = update.active_price {
            body["activePrice"] = active.to_string().into();
        }

        self.client.set_trading_stop(body).await
    }

    fn venue_name(&self) -> &str {
        self.name
    }
}

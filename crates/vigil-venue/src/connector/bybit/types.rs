//! Bybit 와이어 타입과 도메인 변환.
//!
//! 베뉴는 모든 수치를 문자열로 반환합니다. 변환 함수는 파싱에
//! 실패한 행을 None으로 돌려주고, 호출 측이 경고 로그와 함께
//! 해당 행을 스냅샷에서 제외합니다. 업스트림 데이터 품질 문제가
//! 델타 이벤트 스트림을 오염시키지 않도록 하기 위한 경계입니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use vigil_core::{
    ClosedPnlRecord, ExecutionRecord, OrderInfo, OrderStatus, PositionIdx, PositionInfo, Side,
    WalletSnapshot,
};

// ==================== 공통 파싱 ====================

/// 문자열 수치 파싱. 빈 문자열과 "0"은 용도에 따라 구분 필요.
pub(crate) fn parse_decimal(raw: &str) -> Option<Decimal> {
    if raw.is_empty() {
        return None;
    }
    raw.parse::<Decimal>().ok()
}

/// 선택 필드 파싱. 빈 문자열/"0"은 미설정으로 취급.
pub(crate) fn parse_optional_price(raw: &str) -> Option<Decimal> {
    let value = parse_decimal(raw)?;
    if value > Decimal::ZERO {
        Some(value)
    } else {
        None
    }
}

/// 밀리초 타임스탬프 문자열 파싱. 실패 시 현재 시각.
pub(crate) fn parse_millis(raw: &str) -> DateTime<Utc> {
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}

fn parse_side(raw: &str) -> Option<Side> {
    match raw {
        "Buy" => Some(Side::Buy),
        "Sell" => Some(Side::Sell),
        _ => None,
    }
}

fn parse_status(raw: &str) -> Option<OrderStatus> {
    match raw {
        "New" | "Created" => Some(OrderStatus::New),
        "PartiallyFilled" => Some(OrderStatus::PartiallyFilled),
        "Filled" => Some(OrderStatus::Filled),
        "Cancelled" | "Deactivated" => Some(OrderStatus::Cancelled),
        "Rejected" => Some(OrderStatus::Rejected),
        "Untriggered" => Some(OrderStatus::Untriggered),
        _ => None,
    }
}

// ==================== 응답 봉투 ====================

/// 공통 응답 봉투.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "retCode")]
    pub ret_code: i64,
    #[serde(rename = "retMsg")]
    pub ret_msg: String,
    pub result: Option<T>,
}

/// 목록형 result.
#[derive(Debug, Deserialize)]
pub struct ListResult<T> {
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
}

// ==================== 포지션 ====================

#[derive(Debug, Deserialize)]
pub struct PositionRow {
    pub symbol: String,
    pub side: String,
    pub size: String,
    #[serde(rename = "avgPrice")]
    pub avg_price: String,
    #[serde(rename = "stopLoss", default)]
    pub stop_loss: String,
    #[serde(rename = "takeProfit", default)]
    pub take_profit: String,
    #[serde(rename = "trailingStop", default)]
    pub trailing_stop: String,
    #[serde(rename = "unrealisedPnl", default)]
    pub unrealised_pnl: String,
    #[serde(rename = "positionIdx", default)]
    pub position_idx: u8,
    #[serde(rename = "createdTime", default)]
    pub created_time: String,
    #[serde(rename = "updatedTime", default)]
    pub updated_time: String,
}

impl PositionRow {
    /// 도메인 미러로 변환. 수치가 유효하지 않으면 None.
    ///
    /// 사이즈 0 행은 베뉴가 닫힌 슬롯을 보고하는 것이므로
    /// 변환 대상이 아닙니다 (에러 아님).
    pub fn into_domain(self) -> Option<PositionInfo> {
        let size = parse_decimal(&self.size)?;
        if size <= Decimal::ZERO {
            return None;
        }
        let entry_price = parse_decimal(&self.avg_price)?;
        if entry_price <= Decimal::ZERO {
            return None;
        }
        let side = parse_side(&self.side)?;

        Some(PositionInfo {
            symbol: self.symbol,
            side,
            size,
            entry_price,
            stop_loss: parse_optional_price(&self.stop_loss),
            take_profit: parse_optional_price(&self.take_profit),
            trailing_stop: parse_optional_price(&self.trailing_stop),
            unrealized_pnl: parse_decimal(&self.unrealised_pnl).unwrap_or(Decimal::ZERO),
            position_idx: PositionIdx::from_wire(self.position_idx),
            created_at: parse_millis(&self.created_time),
            updated_at: parse_millis(&self.updated_time),
        })
    }
}

// ==================== 주문 ====================

#[derive(Debug, Deserialize)]
pub struct OrderRow {
    #[serde(rename = "orderId")]
    pub order_id: String,
    #[serde(rename = "orderLinkId", default)]
    pub order_link_id: String,
    pub symbol: String,
    pub side: String,
    pub qty: String,
    #[serde(default)]
    pub price: String,
    #[serde(rename = "triggerPrice", default)]
    pub trigger_price: String,
    #[serde(rename = "orderStatus")]
    pub order_status: String,
    #[serde(rename = "reduceOnly", default)]
    pub reduce_only: bool,
    #[serde(rename = "orderType", default)]
    pub order_type: String,
    #[serde(rename = "stopOrderType", default)]
    pub stop_order_type: String,
    #[serde(rename = "createdTime", default)]
    pub created_time: String,
}

impl OrderRow {
    /// 도메인 미러로 변환. 수치가 유효하지 않으면 None.
    pub fn into_domain(self) -> Option<OrderInfo> {
        let qty = parse_decimal(&self.qty)?;
        if qty <= Decimal::ZERO {
            return None;
        }
        let side = parse_side(&self.side)?;
        let status = parse_status(&self.order_status)?;

        Some(OrderInfo {
            order_id: self.order_id,
            order_link_id: if self.order_link_id.is_empty() {
                None
            } else {
                Some(self.order_link_id)
            },
            symbol: self.symbol,
            side,
            qty,
            price: parse_optional_price(&self.price),
            trigger_price: parse_optional_price(&self.trigger_price),
            status,
            reduce_only: self.reduce_only,
            order_type: self.order_type,
            stop_order_type: if self.stop_order_type.is_empty() {
                None
            } else {
                Some(self.stop_order_type)
            },
            created_at: parse_millis(&self.created_time),
        })
    }
}

// ==================== 체결 ====================

#[derive(Debug, Deserialize)]
pub struct ExecutionRow {
    #[serde(rename = "execId")]
    pub exec_id: String,
    pub symbol: String,
    pub side: String,
    #[serde(rename = "execQty")]
    pub exec_qty: String,
    #[serde(rename = "execPrice")]
    pub exec_price: String,
    #[serde(rename = "execTime", default)]
    pub exec_time: String,
}

impl ExecutionRow {
    /// 도메인 레코드로 변환. 수치가 유효하지 않으면 None.
    pub fn into_domain(self) -> Option<ExecutionRecord> {
        let qty = parse_decimal(&self.exec_qty)?;
        let price = parse_decimal(&self.exec_price)?;
        if qty <= Decimal::ZERO || price <= Decimal::ZERO {
            return None;
        }
        let side = parse_side(&self.side)?;

        Some(ExecutionRecord {
            exec_id: self.exec_id,
            symbol: self.symbol,
            side,
            qty,
            price,
            exec_at: parse_millis(&self.exec_time),
        })
    }
}

// ==================== 지갑 ====================

#[derive(Debug, Deserialize)]
pub struct WalletRow {
    #[serde(rename = "totalEquity")]
    pub total_equity: String,
    #[serde(rename = "totalAvailableBalance", default)]
    pub total_available_balance: String,
    #[serde(rename = "totalWalletBalance", default)]
    pub total_wallet_balance: String,
}

impl WalletRow {
    /// 도메인 스냅샷으로 변환. 총 자산 파싱 실패 시 None.
    pub fn into_domain(self) -> Option<WalletSnapshot> {
        let total_equity = parse_decimal(&self.total_equity)?;

        Some(WalletSnapshot {
            total_equity,
            available_balance: parse_decimal(&self.total_available_balance)
                .unwrap_or(Decimal::ZERO),
            wallet_balance: parse_decimal(&self.total_wallet_balance).unwrap_or(Decimal::ZERO),
            refreshed_at: Utc::now(),
        })
    }
}

// ==================== 청산 손익 ====================

#[derive(Debug, Deserialize)]
pub struct ClosedPnlRow {
    #[serde(rename = "orderId")]
    pub order_id: String,
    pub symbol: String,
    #[serde(rename = "closedPnl")]
    pub closed_pnl: String,
    #[serde(rename = "updatedTime", default)]
    pub updated_time: String,
}

impl ClosedPnlRow {
    /// 도메인 레코드로 변환. 수치가 유효하지 않으면 None.
    pub fn into_domain(self) -> Option<ClosedPnlRecord> {
        let realized_pnl = parse_decimal(&self.closed_pnl)?;

        Some(ClosedPnlRecord {
            venue_id: self.order_id,
            symbol: self.symbol,
            realized_pnl,
            closed_at: parse_millis(&self.updated_time),
        })
    }
}

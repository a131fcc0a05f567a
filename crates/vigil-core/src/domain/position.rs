//! 베뉴 소유 포지션/주문의 로컬 미러 타입.
//!
//! 베뉴가 진실의 원천(source of truth)이며, 이 타입들은 빠른 폴링
//! 주기마다 갱신되는 로컬 사본입니다. 커넥터 경계에서 수치 검증을
//! 통과한 행만 이 타입으로 변환됩니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::market::{OrderStatus, PositionIdx, Side};

/// 베뉴 소유 포지션의 로컬 미러.
///
/// 베뉴가 0이 아닌 사이즈를 보고하면 생성되고, 사이즈가 0이 되면
/// 제거됩니다. 빠른 폴링마다 제자리에서 갱신됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionInfo {
    /// 심볼
    pub symbol: String,
    /// 방향
    pub side: Side,
    /// 사이즈 (계약 수량)
    pub size: Decimal,
    /// 평균 진입가
    pub entry_price: Decimal,
    /// 베뉴에 설정된 손절가
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    /// 베뉴에 설정된 목표가
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    /// 베뉴에 설정된 트레일링 스톱 간격 (미설정이면 None)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailing_stop: Option<Decimal>,
    /// 미실현 손익
    pub unrealized_pnl: Decimal,
    /// 포지션 인덱스 (헤지 모드)
    pub position_idx: PositionIdx,
    /// 포지션 생성 시각
    pub created_at: DateTime<Utc>,
    /// 마지막 갱신 시각
    pub updated_at: DateTime<Utc>,
}

impl PositionInfo {
    /// 미러가 유효한지 확인.
    ///
    /// 사이즈와 진입가가 양수가 아니면 델타 이벤트를 오염시키지
    /// 않도록 스냅샷에서 제외됩니다.
    pub fn is_valid(&self) -> bool {
        self.size > Decimal::ZERO && self.entry_price > Decimal::ZERO
    }

    /// 명목 가치 (사이즈 × 진입가).
    pub fn notional(&self) -> Decimal {
        self.size * self.entry_price
    }
}

/// 베뉴 소유 주문의 로컬 미러.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderInfo {
    /// 베뉴 주문 ID
    pub order_id: String,
    /// 클라이언트 링크 ID (인텐트 ID와 연결)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_link_id: Option<String>,
    /// 심볼
    pub symbol: String,
    /// 방향
    pub side: Side,
    /// 주문 수량
    pub qty: Decimal,
    /// 지정가 (시장가면 None)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    /// 트리거 가격 (조건부 주문)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_price: Option<Decimal>,
    /// 주문 상태
    pub status: OrderStatus,
    /// 청산 전용(reduce-only) 여부
    pub reduce_only: bool,
    /// 주문 유형 문자열 (베뉴 원문: "Limit", "Market" 등)
    pub order_type: String,
    /// 스톱 주문 유형 (TP/SL/트레일링이면 Some)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_order_type: Option<String>,
    /// 주문 생성 시각
    pub created_at: DateTime<Utc>,
}

impl OrderInfo {
    /// 식별 키 반환. 주문 ID가 비어 있으면 클라이언트 링크 ID 사용.
    pub fn key(&self) -> String {
        if !self.order_id.is_empty() {
            self.order_id.clone()
        } else {
            self.order_link_id.clone().unwrap_or_default()
        }
    }

    /// 진입 주문인지 확인.
    ///
    /// 게이트 용량 판정에는 청산 전용이 아니고 보호 주문(TP/SL)도
    /// 아닌 주문만 포함됩니다.
    pub fn is_entry_order(&self) -> bool {
        !self.reduce_only && self.stop_order_type.is_none()
    }

    /// 아직 체결 가능한 진입 주문인지 확인.
    pub fn is_live_entry(&self) -> bool {
        self.is_entry_order() && self.status.is_live()
    }

    /// 미러가 유효한지 확인.
    pub fn is_valid(&self) -> bool {
        !self.key().is_empty() && self.qty > Decimal::ZERO
    }
}

/// 최근 체결 레코드.
///
/// 빠른 폴링으로 조회되며, 체결 ID 기준으로 중복 제거됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// 베뉴 체결 ID
    pub exec_id: String,
    /// 심볼
    pub symbol: String,
    /// 방향
    pub side: Side,
    /// 체결 수량
    pub qty: Decimal,
    /// 체결 가격
    pub price: Decimal,
    /// 체결 시각
    pub exec_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_order() -> OrderInfo {
        OrderInfo {
            order_id: "ord-1".to_string(),
            order_link_id: Some("vigil-abc".to_string()),
            symbol: "BTCUSDT".to_string(),
            side: Side::Buy,
            qty: dec!(0.5),
            price: Some(dec!(50000)),
            trigger_price: None,
            status: OrderStatus::New,
            reduce_only: false,
            order_type: "Limit".to_string(),
            stop_order_type: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_entry_order_detection() {
        let order = sample_order();
        assert!(order.is_entry_order());
        assert!(order.is_live_entry());

        let mut protective = sample_order();
        protective.stop_order_type = Some("StopLoss".to_string());
        assert!(!protective.is_entry_order());

        let mut reduce = sample_order();
        reduce.reduce_only = true;
        assert!(!reduce.is_entry_order());
    }

    #[test]
    fn test_order_key_fallback() {
        let mut order = sample_order();
        assert_eq!(order.key(), "ord-1");

        order.order_id = String::new();
        assert_eq!(order.key(), "vigil-abc");
    }

    #[test]
    fn test_position_validity() {
        let position = PositionInfo {
            symbol: "ETHUSDT".to_string(),
            side: Side::Sell,
            size: dec!(2),
            entry_price: dec!(3000),
            stop_loss: None,
            take_profit: None,
            trailing_stop: None,
            unrealized_pnl: Decimal::ZERO,
            position_idx: PositionIdx::OneWay,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(position.is_valid());
        assert_eq!(position.notional(), dec!(6000));

        let mut zero = position.clone();
        zero.size = Decimal::ZERO;
        assert!(!zero.is_valid());
    }
}

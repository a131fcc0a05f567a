//! 스냅샷 차이 계산기.
//!
//! 새로 조회한 컬렉션을 직전 스냅샷과 비교하여 의미 있는 델타
//! 이벤트를 만들어냅니다. 반환된 새 맵이 다음 틱의 "직전"이
//! 됩니다. 루프당 단조 증가하는 (이전 → 다음) 쌍으로만 호출되며
//! 순서가 뒤바뀌지 않습니다.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vigil_core::{OrderInfo, OrderStatus, PositionInfo, Side};

// ==================== 포지션 ====================

/// 포지션 스냅샷 요약 (델타 판정에 필요한 필드만).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    /// 방향
    pub side: Side,
    /// 사이즈
    pub size: Decimal,
    /// 평균 진입가
    pub entry_price: Decimal,
}

impl From<&PositionInfo> for PositionSummary {
    fn from(position: &PositionInfo) -> Self {
        Self {
            side: position.side,
            size: position.size,
            entry_price: position.entry_price,
        }
    }
}

/// 포지션 델타 이벤트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PositionDelta {
    /// 새 포지션 열림
    Opened {
        symbol: String,
        side: Side,
        size: Decimal,
        entry_price: Decimal,
    },
    /// 사이즈 변경
    Resized {
        symbol: String,
        from: Decimal,
        to: Decimal,
    },
    /// 포지션 닫힘
    Closed { symbol: String },
}

/// 포지션 스냅샷 차이 계산.
///
/// 심볼을 키로 사용합니다. 유효성 검사를 통과하지 못한 항목은
/// 델타로 전파되지 않고 조용히 제외됩니다.
pub fn diff_positions(
    prev: &HashMap<String, PositionSummary>,
    next: &[PositionInfo],
) -> (Vec<PositionDelta>, HashMap<String, PositionSummary>) {
    let mut events = Vec::new();
    let mut next_map: HashMap<String, PositionSummary> = HashMap::with_capacity(next.len());

    for position in next {
        if !position.is_valid() {
            continue;
        }
        next_map.insert(position.symbol.clone(), PositionSummary::from(position));
    }

    for (symbol, summary) in &next_map {
        match prev.get(symbol) {
            None => events.push(PositionDelta::Opened {
                symbol: symbol.clone(),
                side: summary.side,
                size: summary.size,
                entry_price: summary.entry_price,
            }),
            Some(old) if old.size != summary.size => events.push(PositionDelta::Resized {
                symbol: symbol.clone(),
                from: old.size,
                to: summary.size,
            }),
            Some(_) => {}
        }
    }

    for symbol in prev.keys() {
        if !next_map.contains_key(symbol) {
            events.push(PositionDelta::Closed {
                symbol: symbol.clone(),
            });
        }
    }

    (events, next_map)
}

// ==================== 주문 ====================

/// 주문 스냅샷 요약.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    /// 심볼
    pub symbol: String,
    /// 상태
    pub status: OrderStatus,
}

impl From<&OrderInfo> for OrderSummary {
    fn from(order: &OrderInfo) -> Self {
        Self {
            symbol: order.symbol.clone(),
            status: order.status,
        }
    }
}

/// 주문 델타 이벤트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderDelta {
    /// 처음 보는 주문
    New {
        key: String,
        symbol: String,
        status: OrderStatus,
    },
    /// 상태 변경
    StatusChanged {
        key: String,
        symbol: String,
        from: OrderStatus,
        to: OrderStatus,
    },
    /// 목록에서 사라짐 (체결 또는 취소)
    Removed { key: String, symbol: String },
}

/// 주문 스냅샷 차이 계산.
///
/// 주문 ID를 키로 쓰고, 없으면 클라이언트 링크 ID로 대체합니다.
pub fn diff_orders(
    prev: &HashMap<String, OrderSummary>,
    next: &[OrderInfo],
) -> (Vec<OrderDelta>, HashMap<String, OrderSummary>) {
    let mut events = Vec::new();
    let mut next_map: HashMap<String, OrderSummary> = HashMap::with_capacity(next.len());

    for order in next {
        if !order.is_valid() {
            continue;
        }
        next_map.insert(order.key(), OrderSummary::from(order));
    }

    for (key, summary) in &next_map {
        match prev.get(key) {
            None => events.push(OrderDelta::New {
                key: key.clone(),
                symbol: summary.symbol.clone(),
                status: summary.status,
            }),
            Some(old) if old.status != summary.status => events.push(OrderDelta::StatusChanged {
                key: key.clone(),
                symbol: summary.symbol.clone(),
                from: old.status,
                to: summary.status,
            }),
            Some(_) => {}
        }
    }

    for (key, summary) in prev {
        if !next_map.contains_key(key) {
            events.push(OrderDelta::Removed {
                key: key.clone(),
                symbol: summary.symbol.clone(),
            });
        }
    }

    (events, next_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use vigil_core::PositionIdx;

    fn position(symbol: &str, size: Decimal) -> PositionInfo {
        PositionInfo {
            symbol: symbol.to_string(),
            side: Side::Buy,
            size,
            entry_price: dec!(100),
            stop_loss: None,
            take_profit: None,
            trailing_stop: None,
            unrealized_pnl: Decimal::ZERO,
            position_idx: PositionIdx::OneWay,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn order(id: &str, symbol: &str, status: OrderStatus) -> OrderInfo {
        OrderInfo {
            order_id: id.to_string(),
            order_link_id: None,
            symbol: symbol.to_string(),
            side: Side::Buy,
            qty: dec!(1),
            price: Some(dec!(100)),
            trigger_price: None,
            status,
            reduce_only: false,
            order_type: "Limit".to_string(),
            stop_order_type: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_position_opened_resized_closed() {
        let empty = HashMap::new();

        // 열림
        let (events, map1) = diff_positions(&empty, &[position("BTCUSDT", dec!(1))]);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], PositionDelta::Opened { symbol, .. } if symbol == "BTCUSDT"));

        // 사이즈 변경
        let (events, map2) = diff_positions(&map1, &[position("BTCUSDT", dec!(2))]);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            PositionDelta::Resized { from, to, .. } if *from == dec!(1) && *to == dec!(2)
        ));

        // 닫힘
        let (events, map3) = diff_positions(&map2, &[]);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], PositionDelta::Closed { symbol } if symbol == "BTCUSDT"));
        assert!(map3.is_empty());
    }

    #[test]
    fn test_unchanged_position_yields_no_event() {
        let (_, map) = diff_positions(&HashMap::new(), &[position("BTCUSDT", dec!(1))]);
        let (events, _) = diff_positions(&map, &[position("BTCUSDT", dec!(1))]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_invalid_position_dropped_silently() {
        let (events, map) = diff_positions(&HashMap::new(), &[position("BTCUSDT", Decimal::ZERO)]);
        assert!(events.is_empty());
        assert!(map.is_empty());
    }

    #[test]
    fn test_order_lifecycle_events() {
        let empty = HashMap::new();

        let (events, map1) = diff_orders(&empty, &[order("o1", "BTCUSDT", OrderStatus::New)]);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], OrderDelta::New { key, .. } if key == "o1"));

        let (events, map2) =
            diff_orders(&map1, &[order("o1", "BTCUSDT", OrderStatus::PartiallyFilled)]);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            OrderDelta::StatusChanged { from: OrderStatus::New, to: OrderStatus::PartiallyFilled, .. }
        ));

        let (events, _) = diff_orders(&map2, &[]);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], OrderDelta::Removed { key, .. } if key == "o1"));
    }

    #[test]
    fn test_order_key_falls_back_to_link_id() {
        let mut no_id = order("", "BTCUSDT", OrderStatus::New);
        no_id.order_link_id = Some("vigil-xyz".to_string());

        let (events, map) = diff_orders(&HashMap::new(), &[no_id]);
        assert_eq!(events.len(), 1);
        assert!(map.contains_key("vigil-xyz"));
    }

    /// 차이 완전성: A\B는 닫힘 하나, B\A는 열림 하나,
    /// 교집합의 동일 항목은 이벤트 없음.
    #[test]
    fn test_differ_completeness() {
        let mut prev = HashMap::new();
        prev.insert(
            "AAA".to_string(),
            PositionSummary {
                side: Side::Buy,
                size: dec!(1),
                entry_price: dec!(10),
            },
        );
        prev.insert(
            "BBB".to_string(),
            PositionSummary {
                side: Side::Sell,
                size: dec!(2),
                entry_price: dec!(20),
            },
        );

        // BBB 유지, AAA 제거, CCC 추가
        let next = vec![
            {
                let mut p = position("BBB", dec!(2));
                p.side = Side::Sell;
                p.entry_price = dec!(20);
                p
            },
            position("CCC", dec!(3)),
        ];

        let (events, _) = diff_positions(&prev, &next);
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .any(|e| matches!(e, PositionDelta::Closed { symbol } if symbol == "AAA")));
        assert!(events
            .iter()
            .any(|e| matches!(e, PositionDelta::Opened { symbol, .. } if symbol == "CCC")));
    }
}

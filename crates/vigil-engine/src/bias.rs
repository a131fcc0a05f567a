//! 편향 정렬 스캔.
//!
//! 기준 심볼의 편향과 반대 방향을 향하는 오픈 노출을 찾아
//! 시정 액션 목록을 만듭니다. 스냅샷 입력, 액션 출력의 순수
//! 함수이며 실제 실행과 대상별 속도 제한은 코디네이터가
//! 담당합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vigil_core::{OrderInfo, PositionInfo, Side, TrendBias};

/// 시정 액션.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlignmentAction {
    /// 포지션 시장가 청산 (reduce-only).
    ///
    /// `close_side`는 청산 주문 자체의 방향 (포지션의 반대).
    ClosePosition {
        symbol: String,
        close_side: Side,
        qty: Decimal,
    },
    /// 진입 주문 취소.
    CancelOrder { symbol: String, order_id: String },
}

impl AlignmentAction {
    /// 속도 제한에 쓰는 대상 키.
    pub fn target_key(&self) -> String {
        match self {
            AlignmentAction::ClosePosition { symbol, .. } => format!("pos:{}", symbol),
            AlignmentAction::CancelOrder { order_id, .. } => format!("ord:{}", order_id),
        }
    }
}

/// 기준 편향 결정.
///
/// 우선순위: 기준 심볼의 오픈 포지션 방향 → 기준 심볼의 라이브
/// 진입 주문 방향 → 기준 심볼의 현재 추세 판독.
pub fn reference_bias(
    reference_symbol: &str,
    positions: &[PositionInfo],
    orders: &[OrderInfo],
    trend_bias: Option<TrendBias>,
) -> Option<Side> {
    if let Some(position) = positions.iter().find(|p| p.symbol == reference_symbol) {
        return Some(position.side);
    }
    if let Some(order) = orders
        .iter()
        .find(|o| o.symbol == reference_symbol && o.is_live_entry())
    {
        return Some(order.side);
    }
    trend_bias.and_then(|bias| bias.as_side())
}

/// 반대 방향 노출 스캔.
///
/// 기준 심볼 자체는 제외합니다. 포지션은 reduce-only 시장가
/// 청산으로, 라이브 진입 주문은 취소로 시정합니다.
pub fn scan_conflicts(
    reference: Side,
    reference_symbol: &str,
    positions: &[PositionInfo],
    orders: &[OrderInfo],
) -> Vec<AlignmentAction> {
    let mut actions = Vec::new();

    for position in positions {
        if position.symbol == reference_symbol {
            continue;
        }
        if position.side != reference {
            actions.push(AlignmentAction::ClosePosition {
                symbol: position.symbol.clone(),
                close_side: position.side.opposite(),
                qty: position.size,
            });
        }
    }

    for order in orders {
        if order.symbol == reference_symbol || !order.is_live_entry() {
            continue;
        }
        if order.side != reference {
            actions.push(AlignmentAction::CancelOrder {
                symbol: order.symbol.clone(),
                order_id: order.key(),
            });
        }
    }

    actions
}

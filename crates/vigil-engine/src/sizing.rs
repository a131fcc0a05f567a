//! 포지션 사이저.
//!
//! 환경에 따라 상호 배타적인 두 전략을 제공합니다:
//!
//! - 리스크 예산 사이징 (본 베뉴): 자산 × 리스크 비율을 손절
//!   거리로 나눠 수량을 구하고, 명목 가치를 경계값으로 클램프
//! - 고정 수량 사이징 (연습 베뉴): 심볼별 고정 수량 테이블로
//!   테스트 주문 크기를 결정적으로 유지
//!
//! 두 전략 모두 동일한 `SizingOutcome`을 반환하므로 하위 코드는
//! 베뉴를 구분하지 않습니다.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use vigil_core::settings::SizingBounds;

/// 사이징 에러.
///
/// 해당 신호 하나의 실행만 중단시키며, 같은 신호 ID는 재시도하지
/// 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizingError {
    /// 사용 가능한 자산 수치 없음
    #[error("missing_equity: 사용 가능한 자산 수치 없음")]
    MissingEquity,

    /// 진입가와 손절가가 일치 (거리 0)
    #[error("invalid_sl_distance: 진입가와 손절가가 일치")]
    InvalidSlDistance,

    /// 상한 적용 후에도 베뉴 최소 명목 가치 미달
    #[error("below_min_notional: 최소 명목 가치 미달")]
    BelowMinNotional,

    /// 연습 베뉴 고정 수량 테이블에 심볼 없음
    #[error("missing_fixed_qty: 고정 수량 미설정 심볼 {0}")]
    MissingFixedQty(String),
}

/// 사이징 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingOutcome {
    /// 주문 수량
    pub quantity: Decimal,
    /// 명목 가치 (quantity × entry와 정확히 일치)
    pub notional: Decimal,
    /// 리스크 예산 (고정 수량 사이징에서는 0)
    pub risk_budget: Decimal,
}

/// 리스크 예산 사이징.
///
/// `riskBudget = equity × riskPct`, `qty = riskBudget / |entry − stop|`.
/// 명목 가치는 `[min_notional, min(max_notional, equity × cap_pct)]`로
/// 클램프되고, 수량은 클램프된 명목 가치에서 재계산되어
/// `quantity × entry == notional`이 정확히 성립합니다.
pub fn risk_budget_size(
    equity: Option<Decimal>,
    risk_pct: Decimal,
    entry: Decimal,
    stop: Decimal,
    bounds: &SizingBounds,
) -> Result<SizingOutcome, SizingError> {
    let equity = equity.ok_or(SizingError::MissingEquity)?;
    if equity <= Decimal::ZERO {
        return Err(SizingError::MissingEquity);
    }

    let sl_distance = (entry - stop).abs();
    if sl_distance.is_zero() {
        return Err(SizingError::InvalidSlDistance);
    }

    let risk_budget = equity * risk_pct;
    let raw_qty = risk_budget / sl_distance;
    let raw_notional = raw_qty * entry;

    // 상한: 설정 최대값과 자산 대비 상한 중 작은 쪽
    let equity_cap = equity * bounds.equity_cap_pct;
    let upper = bounds.max_notional.min(equity_cap);

    if upper < bounds.min_notional {
        return Err(SizingError::BelowMinNotional);
    }

    let notional = raw_notional.clamp(bounds.min_notional, upper);
    let quantity = notional / entry;

    Ok(SizingOutcome {
        quantity,
        notional,
        risk_budget,
    })
}

/// 고정 수량 사이징 (연습 베뉴 전용).
///
/// 자산과 무관하게 심볼별 테이블의 수량을 현재 진입가 기준
/// 명목 가치로 환산합니다.
pub fn fixed_qty_size(
    table: &HashMap<String, Decimal>,
    symbol: &str,
    entry: Decimal,
) -> Result<SizingOutcome, SizingError> {
    let quantity = table
        .get(symbol)
        .copied()
        .ok_or_else(|| SizingError::MissingFixedQty(symbol.to_string()))?;

    Ok(SizingOutcome {
        quantity,
        notional: quantity * entry,
        risk_budget: Decimal::ZERO,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bounds(min: Decimal, max: Decimal, cap_pct: Decimal) -> SizingBounds {
        SizingBounds {
            min_notional: min,
            max_notional: max,
            equity_cap_pct: cap_pct,
        }
    }

    /// entry=100, stop=98, equity=10000, riskPct=0.004
    /// → riskBudget=40, raw qty=20, raw notional=2000;
    /// maxNotional=1000이면 최종 notional=1000, qty=10.
    #[test]
    fn test_clamp_scenario() {
        let outcome = risk_budget_size(
            Some(dec!(10000)),
            dec!(0.004),
            dec!(100),
            dec!(98),
            &bounds(dec!(10), dec!(1000), dec!(1)),
        )
        .unwrap();

        assert_eq!(outcome.risk_budget, dec!(40));
        assert_eq!(outcome.notional, dec!(1000));
        assert_eq!(outcome.quantity, dec!(10));
        assert_eq!(outcome.quantity * dec!(100), outcome.notional);
    }

    #[test]
    fn test_unclamped_path() {
        let outcome = risk_budget_size(
            Some(dec!(10000)),
            dec!(0.004),
            dec!(100),
            dec!(98),
            &bounds(dec!(10), dec!(100000), dec!(1)),
        )
        .unwrap();

        assert_eq!(outcome.notional, dec!(2000));
        assert_eq!(outcome.quantity, dec!(20));
    }

    #[test]
    fn test_equity_cap_applies() {
        // equity_cap_pct=0.1 → 상한 1000 < max_notional
        let outcome = risk_budget_size(
            Some(dec!(10000)),
            dec!(0.004),
            dec!(100),
            dec!(98),
            &bounds(dec!(10), dec!(100000), dec!(0.1)),
        )
        .unwrap();

        assert_eq!(outcome.notional, dec!(1000));
    }

    #[test]
    fn test_min_notional_bump() {
        // 예산이 작아 raw notional이 최소 미달이면 최소로 올림
        let outcome = risk_budget_size(
            Some(dec!(10000)),
            dec!(0.0001),
            dec!(100),
            dec!(90),
            &bounds(dec!(50), dec!(1000), dec!(1)),
        )
        .unwrap();

        // raw: budget=1, qty=0.1, notional=10 → 최소 50으로 클램프
        assert_eq!(outcome.notional, dec!(50));
        assert_eq!(outcome.quantity, dec!(0.5));
    }

    #[test]
    fn test_missing_equity() {
        assert_eq!(
            risk_budget_size(
                None,
                dec!(0.004),
                dec!(100),
                dec!(98),
                &bounds(dec!(10), dec!(1000), dec!(1))
            ),
            Err(SizingError::MissingEquity)
        );
        assert_eq!(
            risk_budget_size(
                Some(Decimal::ZERO),
                dec!(0.004),
                dec!(100),
                dec!(98),
                &bounds(dec!(10), dec!(1000), dec!(1))
            ),
            Err(SizingError::MissingEquity)
        );
    }

    #[test]
    fn test_invalid_sl_distance() {
        assert_eq!(
            risk_budget_size(
                Some(dec!(10000)),
                dec!(0.004),
                dec!(100),
                dec!(100),
                &bounds(dec!(10), dec!(1000), dec!(1))
            ),
            Err(SizingError::InvalidSlDistance)
        );
    }

    #[test]
    fn test_below_min_notional_when_cap_too_small() {
        // 자산 상한 (100 × 0.05 = 5)이 최소 명목 가치 10 미달
        assert_eq!(
            risk_budget_size(
                Some(dec!(100)),
                dec!(0.004),
                dec!(100),
                dec!(98),
                &bounds(dec!(10), dec!(1000), dec!(0.05))
            ),
            Err(SizingError::BelowMinNotional)
        );
    }

    #[test]
    fn test_fixed_qty_table() {
        let mut table = HashMap::new();
        table.insert("BTCUSDT".to_string(), dec!(0.01));

        let outcome = fixed_qty_size(&table, "BTCUSDT", dec!(50000)).unwrap();
        assert_eq!(outcome.quantity, dec!(0.01));
        assert_eq!(outcome.notional, dec!(500));
        assert_eq!(outcome.risk_budget, Decimal::ZERO);

        assert!(matches!(
            fixed_qty_size(&table, "ETHUSDT", dec!(3000)),
            Err(SizingError::MissingFixedQty(_))
        ));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// 클램프 정확성: entry ≠ stop이면 결과 notional은
            /// [min, upper] 안에 있고 quantity × entry는 notional과
            /// 소수 허용 오차 내에서 일치한다.
            #[test]
            fn prop_clamp_correctness(
                equity in 1000u64..1_000_000,
                risk_bp in 1u64..100,       // 0.01% ~ 1%
                entry in 10u64..100_000,
                dist in 1u64..5_000,
            ) {
                let equity = Decimal::from(equity);
                let risk_pct = Decimal::new(risk_bp as i64, 4);
                let entry = Decimal::from(entry);
                let stop = entry - Decimal::from(dist);
                prop_assume!(stop > Decimal::ZERO);

                let b = bounds(dec!(10), dec!(5000), dec!(0.5));
                if let Ok(outcome) = risk_budget_size(Some(equity), risk_pct, entry, stop, &b) {
                    let upper = b.max_notional.min(equity * b.equity_cap_pct);
                    prop_assert!(outcome.notional >= b.min_notional);
                    prop_assert!(outcome.notional <= upper);
                    // 나눗셈이 순환소수가 되는 경우 마지막 자리
                    // 반올림만큼의 오차 허용
                    let tolerance = Decimal::new(1, 18);
                    let diff = (outcome.quantity * entry - outcome.notional).abs();
                    prop_assert!(diff <= tolerance, "diff = {}", diff);
                }
            }
        }
    }
}

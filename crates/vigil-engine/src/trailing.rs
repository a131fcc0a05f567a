//! 트레일링 스톱 플래너.
//!
//! (진입가, 손절가, 방향, 프로파일)로부터 트레일링 간격과
//! 활성화 가격을 계산합니다. 활성화 가격은 진입가에서 유리한
//! 방향으로 `activation_r × |entry − stop|`만큼 떨어진 지점입니다.
//!
//! 다음 경우에는 계획 없음(None)을 반환합니다:
//! - 심볼이 명시적으로 제외됨 (설정 조회 단계에서 프로파일 None)
//! - 현재 프로파일에서 트레일링 비활성 + 심볼 오버라이드 없음
//! - 계산된 간격이 양수가 아님

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vigil_core::{Side, TrailingProfile};

/// 트레일링 계획.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingPlan {
    /// 트레일링 간격 (가격 단위)
    pub distance: Decimal,
    /// 활성화 가격
    pub activation: Decimal,
}

/// 트레일링 계획 계산.
///
/// `profile`은 설정에서 심볼 오버라이드/제외를 이미 반영한 값입니다
/// (`Settings::trailing_for` 참고). `dynamic_offset`이 주어지면
/// 리스크 기반 간격 대신 사용됩니다 (예: 최근 변동성 기반).
pub fn plan_trailing(
    entry: Decimal,
    stop: Decimal,
    side: Side,
    profile: Option<TrailingProfile>,
    dynamic_offset: Option<Decimal>,
) -> Option<TrailingPlan> {
    let profile = profile?;
    if !profile.enabled {
        return None;
    }

    let risk = (entry - stop).abs();
    if risk.is_zero() {
        return None;
    }

    let lock_r = Decimal::from_f64(profile.lock_r)?;
    let activation_r = Decimal::from_f64(profile.activation_r)?;

    let mut distance = dynamic_offset.unwrap_or(risk * lock_r);
    if let Some(rate) = profile.retracement_rate {
        let factor = Decimal::from_f64(1.0 - rate)?;
        distance *= factor;
    }

    if distance <= Decimal::ZERO {
        return None;
    }

    let activation = match side {
        Side::Buy => entry + risk * activation_r,
        Side::Sell => entry - risk * activation_r,
    };

    Some(TrailingPlan {
        distance,
        activation,
    })
}

//! 추세 편향 게이트.
//!
//! 상위/하위 타임프레임 합의 방향과 신호 방향의 관계를 판정합니다.
//!
//! - Follow: 신호가 양쪽 타임프레임 합의와 모두 일치해야 함
//! - Reverse: 평균 회귀 신호만 상위 편향에 역행 가능
//! - Adaptive: 추세 강도에 따라 Follow/Reverse 전환. 역추세는
//!   강도가 더 엄격한 상한 아래일 때만 허용되어 "강한 추세에
//!   맞서기"와 "횡보장에서 과장된 강도로 뒤집기"를 모두 막습니다.

use vigil_core::settings::AdaptiveTrendConfig;
use vigil_core::{Side, SignalKind, TrendGateMode, TrendReading};

/// 추세 게이트 판정.
#[derive(Debug, Clone, PartialEq)]
pub enum TrendVerdict {
    /// 허용
    Allowed(String),
    /// 차단
    Blocked(String),
}

impl TrendVerdict {
    /// 허용 여부.
    pub fn is_allowed(&self) -> bool {
        matches!(self, TrendVerdict::Allowed(_))
    }

    /// 상세 메시지.
    pub fn detail(&self) -> &str {
        match self {
            TrendVerdict::Allowed(detail) | TrendVerdict::Blocked(detail) => detail,
        }
    }
}

/// 추세 정렬 판정.
pub fn check_alignment(
    mode: TrendGateMode,
    kind: SignalKind,
    side: Side,
    reading: &TrendReading,
    adaptive: &AdaptiveTrendConfig,
) -> TrendVerdict {
    match mode {
        TrendGateMode::Follow => check_follow(side, reading),
        TrendGateMode::Reverse => check_reverse(kind, side, reading),
        TrendGateMode::Adaptive => {
            let strong = reading.strength >= adaptive.strong_strength
                || reading.alignment_count >= adaptive.strong_alignment_count;
            if strong {
                match check_follow(side, reading) {
                    TrendVerdict::Allowed(detail) => {
                        TrendVerdict::Allowed(format!("적응형(추종): {}", detail))
                    }
                    TrendVerdict::Blocked(detail) => {
                        TrendVerdict::Blocked(format!("적응형(추종): {}", detail))
                    }
                }
            } else if reading.strength < adaptive.reverse_max_strength {
                match check_reverse(kind, side, reading) {
                    TrendVerdict::Allowed(detail) => {
                        TrendVerdict::Allowed(format!("적응형(역추세): {}", detail))
                    }
                    TrendVerdict::Blocked(detail) => {
                        TrendVerdict::Blocked(format!("적응형(역추세): {}", detail))
                    }
                }
            } else {
                // 강하지도 약하지도 않은 중간 구간은 추종 규칙 유지
                match check_follow(side, reading) {
                    TrendVerdict::Allowed(detail) => {
                        TrendVerdict::Allowed(format!("적응형(중간): {}", detail))
                    }
                    TrendVerdict::Blocked(detail) => {
                        TrendVerdict::Blocked(format!("적응형(중간): {}", detail))
                    }
                }
            }
        }
    }
}

fn check_follow(side: Side, reading: &TrendReading) -> TrendVerdict {
    let htf_ok = reading.htf_bias.agrees_with(side);
    let ltf_ok = reading.ltf_bias.agrees_with(side);

    if htf_ok && ltf_ok {
        TrendVerdict::Allowed(format!("{:?}/{:?} 합의 일치", reading.htf_bias, reading.ltf_bias))
    } else if !htf_ok {
        TrendVerdict::Blocked(format!("상위 편향 {:?}와 불일치", reading.htf_bias))
    } else {
        TrendVerdict::Blocked(format!("하위 편향 {:?}와 불일치", reading.ltf_bias))
    }
}

fn check_reverse(kind: SignalKind, side: Side, reading: &TrendReading) -> TrendVerdict {
    match kind {
        SignalKind::MeanReversion => {
            // 평균 회귀는 상위 편향 역행이 본래 목적
            TrendVerdict::Allowed("평균 회귀 신호 허용".to_string())
        }
        SignalKind::TrendEntry => {
            // 추세 진입 신호는 역추세 모드에서도 합의를 따라야 함
            match check_follow(side, reading) {
                TrendVerdict::Allowed(detail) => TrendVerdict::Allowed(detail),
                TrendVerdict::Blocked(detail) => {
                    TrendVerdict::Blocked(format!("추세 진입 신호는 역행 불가 ({})", detail))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::TrendBias;

    fn reading(htf: TrendBias, ltf: TrendBias, strength: f64, alignment: u8) -> TrendReading {
        TrendReading {
            htf_bias: htf,
            ltf_bias: ltf,
            strength,
            alignment_count: alignment,
        }
    }

    fn adaptive() -> AdaptiveTrendConfig {
        AdaptiveTrendConfig {
            strong_strength: 25.0,
            strong_alignment_count: 3,
            reverse_max_strength: 18.0,
        }
    }

    #[test]
    fn test_follow_requires_both_timeframes() {
        let r = reading(TrendBias::Bullish, TrendBias::Bullish, 20.0, 2);
        assert!(check_alignment(
            TrendGateMode::Follow,
            SignalKind::TrendEntry,
            Side::Buy,
            &r,
            &adaptive()
        )
        .is_allowed());

        let mixed = reading(TrendBias::Bullish, TrendBias::Bearish, 20.0, 2);
        assert!(!check_alignment(
            TrendGateMode::Follow,
            SignalKind::TrendEntry,
            Side::Buy,
            &mixed,
            &adaptive()
        )
        .is_allowed());
    }

    #[test]
    fn test_reverse_mode_allows_only_mean_reversion() {
        let r = reading(TrendBias::Bullish, TrendBias::Bullish, 15.0, 1);

        // 평균 회귀 숏은 상위 편향 역행 허용
        assert!(check_alignment(
            TrendGateMode::Reverse,
            SignalKind::MeanReversion,
            Side::Sell,
            &r,
            &adaptive()
        )
        .is_allowed());

        // 추세 진입 숏은 차단
        assert!(!check_alignment(
            TrendGateMode::Reverse,
            SignalKind::TrendEntry,
            Side::Sell,
            &r,
            &adaptive()
        )
        .is_allowed());
    }

    #[test]
    fn test_adaptive_strong_trend_blocks_reversal() {
        // 강한 추세 (strength >= 25): 추종 규칙, 역행 평균 회귀 차단
        let strong = reading(TrendBias::Bullish, TrendBias::Bullish, 30.0, 2);
        assert!(!check_alignment(
            TrendGateMode::Adaptive,
            SignalKind::MeanReversion,
            Side::Sell,
            &strong,
            &adaptive()
        )
        .is_allowed());
    }

    #[test]
    fn test_adaptive_weak_trend_allows_reversal() {
        // 약한 추세 (strength < 18): 역추세 규칙
        let weak = reading(TrendBias::Bullish, TrendBias::Neutral, 12.0, 1);
        assert!(check_alignment(
            TrendGateMode::Adaptive,
            SignalKind::MeanReversion,
            Side::Sell,
            &weak,
            &adaptive()
        )
        .is_allowed());
    }

    #[test]
    fn test_adaptive_middle_band_keeps_follow_rules() {
        // 중간 구간 (18 <= strength < 25, 정렬 부족): 추종 규칙 유지
        let middle = reading(TrendBias::Bullish, TrendBias::Bullish, 20.0, 2);
        assert!(!check_alignment(
            TrendGateMode::Adaptive,
            SignalKind::MeanReversion,
            Side::Sell,
            &middle,
            &adaptive()
        )
        .is_allowed());

        // 추종 방향은 허용
        assert!(check_alignment(
            TrendGateMode::Adaptive,
            SignalKind::TrendEntry,
            Side::Buy,
            &middle,
            &adaptive()
        )
        .is_allowed());
    }

    #[test]
    fn test_adaptive_alignment_count_triggers_strong() {
        // 강도는 낮아도 정렬 개수가 임계 이상이면 강한 추세로 판정
        let aligned = reading(TrendBias::Bullish, TrendBias::Bullish, 10.0, 4);
        assert!(!check_alignment(
            TrendGateMode::Adaptive,
            SignalKind::MeanReversion,
            Side::Sell,
            &aligned,
            &adaptive()
        )
        .is_allowed());
    }
}

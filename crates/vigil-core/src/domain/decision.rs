//! 전략 피드가 발행하는 Decision 레코드.
//!
//! 이 모듈은 외부 지표 엔진과의 계약을 정의합니다:
//! - `TrendReading` - 타임프레임별 추세 합의와 강도 지표
//! - `TradeSignal` - 구체적인 진입 제안 (방향/진입가/손절가/목표가)
//! - `Decision` - 심볼당 틱당 한 건의 의사결정 레코드
//!
//! Decision은 전달된 이후 불변이며, 같은 심볼의 다음 틱이 도착하면
//! 대체됩니다. 코디네이터는 이 피드를 추세 상태와 신호의
//! 유일한 출처로 취급합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::market::{EntryKind, Side, TrendBias};

/// 신호 종류.
///
/// 추세 추종 진입과 평균 회귀 진입을 구분합니다.
/// Reverse 게이트 모드에서는 `MeanReversion`만이
/// 상위 타임프레임 편향에 역행할 수 있습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// 추세 방향 진입
    TrendEntry,
    /// 평균 회귀 (역추세) 진입
    MeanReversion,
}

/// 전략이 제안한 구체적인 거래.
///
/// 신호 ID는 프로세스 수명 동안 최대 한 번만 소비됩니다.
/// 업스트림 Decision이 조건 지속 시 새 ID로 신호를 재발행하므로
/// 실패한 신호를 재시도하지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    /// 고유 신호 ID
    pub id: Uuid,
    /// 신호 종류
    pub kind: SignalKind,
    /// 방향
    pub side: Side,
    /// 제안 진입가
    pub entry: Decimal,
    /// 제안 손절가 (업스트림이 생략할 수 있음)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    /// 제안 목표가 (선택)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    /// 진입 주문 유형
    pub entry_kind: EntryKind,
    /// 조건부 주문 트리거 가격 (선택)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_price: Option<Decimal>,
    /// 운영자용 설명 메시지
    pub message: String,
    /// 신호 생성 시각
    pub created_at: DateTime<Utc>,
}

impl TradeSignal {
    /// 새 신호 생성.
    pub fn new(kind: SignalKind, side: Side, entry: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            side,
            entry,
            stop_loss: None,
            take_profit: None,
            entry_kind: EntryKind::Market,
            trigger_price: None,
            message: String::new(),
            created_at: Utc::now(),
        }
    }

    /// 손절/목표 가격을 설정합니다.
    pub fn with_protection(mut self, stop_loss: Option<Decimal>, take_profit: Option<Decimal>) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self
    }

    /// 진입 주문 유형을 설정합니다.
    pub fn with_entry_kind(mut self, entry_kind: EntryKind) -> Self {
        self.entry_kind = entry_kind;
        self
    }

    /// 트리거 가격을 설정합니다 (조건부 주문용).
    pub fn with_trigger(mut self, trigger_price: Decimal) -> Self {
        self.trigger_price = Some(trigger_price);
        self
    }

    /// 설명 메시지를 설정합니다.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// 손절가가 진입가 기준 올바른 쪽에 있는지 확인.
    ///
    /// 롱은 손절가 < 진입가, 숏은 손절가 > 진입가여야 합니다.
    pub fn stop_is_structural(&self) -> bool {
        match (self.side, self.stop_loss) {
            (Side::Buy, Some(sl)) => sl < self.entry,
            (Side::Sell, Some(sl)) => sl > self.entry,
            (_, None) => false,
        }
    }
}

/// 타임프레임별 추세 판독.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrendReading {
    /// 상위 타임프레임 합의 편향
    pub htf_bias: TrendBias,
    /// 하위 타임프레임 합의 편향
    pub ltf_bias: TrendBias,
    /// 방향성 강도 지표 (ADX 계열, 0 이상)
    pub strength: f64,
    /// 다중 타임프레임 정렬 개수 (편향이 일치하는 타임프레임 수)
    pub alignment_count: u8,
}

/// 소프트 게이트 체크리스트의 원시 입력.
///
/// 각 항목은 지표 엔진이 이미 평가한 값으로, 게이트 엔진은
/// 이를 점수화할 뿐 재계산하지 않습니다.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QualityInputs {
    /// EMA 정렬 여부 (빠른 EMA가 추세 방향으로 정렬)
    pub ema_ordered: bool,
    /// EMA 간격 / ATR 비율
    pub ema_separation_atr: f64,
    /// ATR 백분율 (변동성 바닥 체크용)
    pub atr_percent: f64,
    /// 거래량 백분위 (0.0 ~ 1.0)
    pub volume_percentile: f64,
    /// 미세구조 되돌림/돌파 확인 여부
    pub pullback_confirmed: bool,
}

/// 심볼당 틱당 한 건의 의사결정 레코드.
///
/// 전략 피드 어댑터가 발행하며, 전달 이후 불변입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// 대상 심볼
    pub symbol: String,
    /// 추세 판독
    pub trend: TrendReading,
    /// ATR 값 (손절 합성 및 트레일링 오프셋용)
    pub atr: Decimal,
    /// 소프트 게이트 원시 입력
    pub quality: QualityInputs,
    /// 진입 신호 (없으면 None)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<TradeSignal>,
    /// 거래 중지 플래그 (지표 엔진이 이상을 감지한 경우)
    pub halted: bool,
    /// 틱 타임스탬프 (신선도 판정 기준)
    pub tick_at: DateTime<Utc>,
}

impl Decision {
    /// 신호 없는 Decision 생성.
    pub fn observation(symbol: impl Into<String>, trend: TrendReading, atr: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            trend,
            atr,
            quality: QualityInputs::default(),
            signal: None,
            halted: false,
            tick_at: Utc::now(),
        }
    }

    /// 신호를 첨부합니다.
    pub fn with_signal(mut self, signal: TradeSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// 틱 경과 시간 (초).
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.tick_at).num_seconds()
    }
}

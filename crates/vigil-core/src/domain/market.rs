//! 시장 공통 열거형.
//!
//! 주문 방향, 포지션 인덱스, 주문 상태 등
//! 베뉴와 코디네이터가 공유하는 기본 열거형을 정의합니다.

use serde::{Deserialize, Serialize};

/// 주문/포지션 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// 매수 (롱)
    Buy,
    /// 매도 (숏)
    Sell,
}

impl Side {
    /// 반대 방향 반환.
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// 헤지 모드 계좌의 포지션 인덱스.
///
/// 단방향 계좌는 `OneWay`, 헤지 모드 계좌는 방향별로
/// `HedgeBuy`/`HedgeSell`을 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionIdx {
    /// 단방향 모드
    OneWay,
    /// 헤지 모드 매수측
    HedgeBuy,
    /// 헤지 모드 매도측
    HedgeSell,
}

impl PositionIdx {
    /// 베뉴 와이어 값(0/1/2)에서 변환.
    pub fn from_wire(value: u8) -> Self {
        match value {
            1 => PositionIdx::HedgeBuy,
            2 => PositionIdx::HedgeSell,
            _ => PositionIdx::OneWay,
        }
    }

    /// 베뉴 와이어 값으로 변환.
    pub fn to_wire(self) -> u8 {
        match self {
            PositionIdx::OneWay => 0,
            PositionIdx::HedgeBuy => 1,
            PositionIdx::HedgeSell => 2,
        }
    }
}

/// 주문 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// 접수됨 (미체결)
    New,
    /// 부분 체결
    PartiallyFilled,
    /// 전량 체결
    Filled,
    /// 취소됨
    Cancelled,
    /// 거부됨
    Rejected,
    /// 트리거 대기 (조건부 주문)
    Untriggered,
}

impl OrderStatus {
    /// 아직 체결 가능한 상태인지 확인.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            OrderStatus::New | OrderStatus::PartiallyFilled | OrderStatus::Untriggered
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::New => write!(f, "NEW"),
            OrderStatus::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::Rejected => write!(f, "REJECTED"),
            OrderStatus::Untriggered => write!(f, "UNTRIGGERED"),
        }
    }
}

/// 진입 주문 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// 시장가
    Market,
    /// 지정가
    Limit,
    /// 지정가 (PostOnly, 메이커 전용)
    LimitMaker,
    /// 조건부 (트리거 가격 필요)
    Conditional,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Market => write!(f, "MARKET"),
            EntryKind::Limit => write!(f, "LIMIT"),
            EntryKind::LimitMaker => write!(f, "LIMIT_MAKER"),
            EntryKind::Conditional => write!(f, "CONDITIONAL"),
        }
    }
}

/// 추세 편향 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendBias {
    /// 상승 추세
    Bullish,
    /// 하락 추세
    Bearish,
    /// 중립 / 횡보
    Neutral,
}

impl TrendBias {
    /// 주문 방향과 편향이 일치하는지 확인.
    pub fn agrees_with(self, side: Side) -> bool {
        matches!(
            (self, side),
            (TrendBias::Bullish, Side::Buy) | (TrendBias::Bearish, Side::Sell)
        )
    }

    /// 편향에 대응하는 주문 방향. 중립이면 None.
    pub fn as_side(self) -> Option<Side> {
        match self {
            TrendBias::Bullish => Some(Side::Buy),
            TrendBias::Bearish => Some(Side::Sell),
            TrendBias::Neutral => None,
        }
    }
}

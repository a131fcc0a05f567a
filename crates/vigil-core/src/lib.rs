//! Vigil 실행 코디네이터의 핵심 도메인 타입.
//!
//! 거래소 중립적인 도메인 모델과 공용 인프라를 제공합니다:
//!
//! - `domain` - Decision, Signal, Position, Order, Intent, Wallet 등 도메인 타입
//! - `gates` - 게이트 식별자와 평가 결과 타입
//! - `settings` - 운영자 설정 (리스크 모드, 게이트 토글, 용량 제한)
//! - `events` - 운영자 이벤트 로그 (캡 제한, 중복 억제)
//! - `dedup` - 크기 제한 중복 방지 집합

pub mod dedup;
pub mod domain;
pub mod events;
pub mod gates;
pub mod settings;

pub use dedup::SeenSet;
pub use domain::decision::{Decision, QualityInputs, SignalKind, TradeSignal, TrendReading};
pub use domain::intent::OrderIntent;
pub use domain::market::{EntryKind, OrderStatus, PositionIdx, Side, TrendBias};
pub use domain::position::{ExecutionRecord, OrderInfo, PositionInfo};
pub use domain::wallet::{ClosedPnlRecord, WalletSnapshot};
pub use events::{EventKind, EventLog, LogEvent};
pub use gates::{GateCheck, GateId};
pub use settings::{
    RiskMode, SessionHoursPolicy, Settings, SizingBounds, SoftGateThresholds, TrailingProfile,
    TrendGateMode,
};

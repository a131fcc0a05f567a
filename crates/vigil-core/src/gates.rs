//! 게이트 식별자와 평가 결과 타입.
//!
//! 게이트 엔진과 오버라이드 맵이 동일한 열거형 식별자를 공유하여
//! 문자열 키 불일치로 인한 버그를 차단합니다.

use serde::{Deserialize, Serialize};

/// 승인 게이트 식별자.
///
/// 하드 게이트는 실패 시 (오버라이드되지 않았다면) 실행을 차단하고,
/// `SoftQuality`는 점수 기반으로 동작합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateId {
    /// 신호 존재 여부
    SignalPresent,
    /// 추세 편향 정렬
    TrendAlignment,
    /// 세션 시간 정책
    SessionHours,
    /// 심볼 단위 용량 (기존 포지션/주문/인텐트 없음)
    SymbolCapacity,
    /// 포트폴리오 단위 용량 (최대 포지션/주문 수)
    PortfolioCapacity,
    /// 손실 후 쿨다운
    CooldownAfterLoss,
    /// 피드 신선도
    FeedFreshness,
    /// 구조적 손절가 유효성
    StopValidity,
    /// 소프트 품질 점수
    SoftQuality,
}

impl GateId {
    /// 모든 게이트 목록 (진단 표시 순서).
    pub const ALL: [GateId; 9] = [
        GateId::SignalPresent,
        GateId::TrendAlignment,
        GateId::SessionHours,
        GateId::SymbolCapacity,
        GateId::PortfolioCapacity,
        GateId::CooldownAfterLoss,
        GateId::FeedFreshness,
        GateId::StopValidity,
        GateId::SoftQuality,
    ];

    /// 하드 게이트 여부.
    pub fn is_hard(self) -> bool {
        !matches!(self, GateId::SoftQuality)
    }
}

impl std::fmt::Display for GateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GateId::SignalPresent => "signal_present",
            GateId::TrendAlignment => "trend_alignment",
            GateId::SessionHours => "session_hours",
            GateId::SymbolCapacity => "symbol_capacity",
            GateId::PortfolioCapacity => "portfolio_capacity",
            GateId::CooldownAfterLoss => "cooldown_after_loss",
            GateId::FeedFreshness => "feed_freshness",
            GateId::StopValidity => "stop_validity",
            GateId::SoftQuality => "soft_quality",
        };
        write!(f, "{}", name)
    }
}

/// 단일 게이트의 평가 결과.
///
/// 비활성화된 게이트도 원시 평가를 유지한 채 진단에 표시됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCheck {
    /// 게이트 식별자
    pub id: GateId,
    /// 통과 여부 (원시 평가)
    pub passed: bool,
    /// 오버라이드로 비활성화되었는지
    pub disabled: bool,
    /// 운영자용 상세 문자열
    pub detail: String,
}

impl GateCheck {
    /// 새 평가 결과 생성.
    pub fn new(id: GateId, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            id,
            passed,
            disabled: false,
            detail: detail.into(),
        }
    }

    /// 실행을 차단하는지 확인.
    ///
    /// 비활성화된 게이트는 원시 평가와 무관하게 차단하지 않습니다.
    pub fn blocks(&self) -> bool {
        self.id.is_hard() && !self.passed && !self.disabled
    }
}

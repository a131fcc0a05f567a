//! 프레젠테이션 레이어에 노출하는 진단 스냅샷.
//!
//! 대시보드는 외부 협력자이므로 이 타입들은 읽기 전용 사본입니다.
//! 게이트 진단은 비활성 게이트의 원시 평가까지 포함합니다.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vigil_core::{LogEvent, OrderInfo, PositionInfo, WalletSnapshot};
use vigil_engine::GateReport;

/// 포트폴리오 집계.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    /// 오픈 포지션 수
    pub open_positions: usize,
    /// 라이브 진입 주문 수
    pub open_orders: usize,
    /// 대기 인텐트 수
    pub pending_intents: usize,
    /// 미실현 손익 합계
    pub unrealized_pnl: Decimal,
    /// 당일 실현 손익
    pub daily_pnl: Decimal,
}

/// 시스템 상태 스냅샷.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// 베뉴 이름
    pub venue_name: String,
    /// 연결 상태 (빠른 루프 최근 틱 완전 성공)
    pub connected: bool,
    /// 집계 시스템 에러 (두 루프 모두 건강하면 None)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_error: Option<String>,
    /// 베뉴 호출 지연 (밀리초)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue_latency_ms: Option<u64>,
    /// 지갑 스냅샷
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet: Option<WalletSnapshot>,
    /// 포트폴리오 집계
    pub portfolio: PortfolioSummary,
    /// 오픈 포지션 목록
    pub positions: Vec<PositionInfo>,
    /// 오픈 주문 목록
    pub orders: Vec<OrderInfo>,
    /// 대기 인텐트 심볼
    pub pending_symbols: Vec<String>,
    /// 최근 이벤트 (최신순, 캡 제한)
    pub events: Vec<LogEvent>,
    /// 최근 에러 (최신순, 캡 제한)
    pub recent_errors: Vec<String>,
    /// 심볼별 게이트 진단
    pub gate_reports: HashMap<String, GateReport>,
}

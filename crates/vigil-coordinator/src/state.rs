//! 코디네이터 가변 상태.
//!
//! 모든 가변 구조는 코디네이터 인스턴스가 소유합니다. 각 구조의
//! 쓰기는 정해진 태스크 하나만 수행합니다 (단일 작성자 규율):
//!
//! - 포지션/주문 미러, 차이 요약: 빠른 루프
//! - 지갑, 손익, 쿨다운: 느린 루프
//! - Decision 맵, 대기 인텐트, 신호 중복 집합: 피드 소비자
//! - 이벤트 로그/에러 목록: 각 태스크가 자기 이벤트만 추가
//!
//! 대기 인텐트 집합은 "이 심볼에 주문이 날아가는 중인가"의 유일한
//! 동시성 제어 수단입니다. 베뉴 주문 목록은 폴링 주기만큼
//! 뒤처지므로 이 집합이 권위 있는 소스입니다.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use vigil_core::{
    Decision, EventKind, EventLog, LogEvent, OrderInfo, PositionInfo, SeenSet, WalletSnapshot,
};
use vigil_engine::{GateReport, OrderSummary, PositionSummary};

/// 롤링 에러 목록 최대 길이.
const MAX_RECENT_ERRORS: usize = 20;
/// 이벤트 로그 용량.
const EVENT_LOG_CAPACITY: usize = 200;
/// 이벤트 중복 억제 창 (초).
const EVENT_DEDUP_WINDOW_SECS: i64 = 30;
/// 중복 방지 집합 용량.
const SEEN_SET_CAPACITY: usize = 4096;

/// 코디네이터 가변 상태.
#[derive(Debug)]
pub struct CoordinatorState {
    // ==================== 로컬 미러 (빠른 루프 소유) ====================
    /// 포지션 미러 (최신 전체 행)
    pub positions: Vec<PositionInfo>,
    /// 차이 계산용 직전 포지션 요약
    pub position_summaries: HashMap<String, PositionSummary>,
    /// 주문 미러
    pub orders: Vec<OrderInfo>,
    /// 차이 계산용 직전 주문 요약
    pub order_summaries: HashMap<String, OrderSummary>,

    // ==================== 느린 루프 소유 ====================
    /// 지갑 스냅샷 (최종 일관성)
    pub wallet: Option<WalletSnapshot>,
    /// 심볼별 손실 쿨다운 만료 시각 (가장 최근 손실 기준)
    pub cooldowns: HashMap<String, DateTime<Utc>>,
    /// 당일 실현 손익 누계
    pub daily_pnl: Decimal,

    // ==================== 피드 소비자 소유 ====================
    /// 심볼별 최신 Decision
    pub decisions: HashMap<String, Decision>,
    /// 대기 인텐트 심볼 집합 (심볼당 최대 1개 인텐트 불변식)
    pub pending_intents: HashSet<String>,
    /// 소비된 신호 ID
    pub seen_signals: SeenSet,
    /// 심볼별 게이트 진단
    pub gate_reports: HashMap<String, GateReport>,
    /// 마지막 피드 틱 시각 (정체 감시)
    pub last_feed_tick: Option<Instant>,

    // ==================== 중복 방지 (각 소유 루프에서 갱신) ====================
    /// 처리한 체결 ID
    pub seen_executions: SeenSet,
    /// 처리한 청산 손익 레코드 ID
    pub seen_pnl: SeenSet,

    // ==================== 관측성 ====================
    /// 운영자 이벤트 로그
    pub events: EventLog,
    /// 최근 에러 (최신순, 캡 제한)
    pub recent_errors: VecDeque<String>,
    /// 빠른 루프 마지막 틱 완전 성공 여부
    pub fast_healthy: bool,
    /// 느린 루프 마지막 틱 완전 성공 여부
    pub slow_healthy: bool,
    /// 개별 조회 에러 (부분 실패 격리)
    pub positions_error: Option<String>,
    pub orders_error: Option<String>,
    pub executions_error: Option<String>,
    pub wallet_error: Option<String>,
    /// 집계 시스템 에러 (두 루프 모두 건강할 때만 해제)
    pub system_error: Option<String>,

    // ==================== 타이머 (대상별 속도 제한) ====================
    /// 심볼별 마지막 보호 설정 시도
    pub last_protection_attempt: HashMap<String, Instant>,
    /// 편향 강제 대상별 마지막 액션
    pub last_enforce: HashMap<String, Instant>,
    /// 마지막 피드 재시작 시각
    pub last_feed_restart: Option<Instant>,
}

impl CoordinatorState {
    /// 초기 상태 생성.
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            position_summaries: HashMap::new(),
            orders: Vec::new(),
            order_summaries: HashMap::new(),
            wallet: None,
            cooldowns: HashMap::new(),
            daily_pnl: Decimal::ZERO,
            decisions: HashMap::new(),
            pending_intents: HashSet::new(),
            seen_signals: SeenSet::new(SEEN_SET_CAPACITY),
            gate_reports: HashMap::new(),
            last_feed_tick: None,
            seen_executions: SeenSet::new(SEEN_SET_CAPACITY),
            seen_pnl: SeenSet::new(SEEN_SET_CAPACITY),
            events: EventLog::new(EVENT_LOG_CAPACITY, EVENT_DEDUP_WINDOW_SECS),
            recent_errors: VecDeque::new(),
            fast_healthy: false,
            slow_healthy: false,
            positions_error: None,
            orders_error: None,
            executions_error: None,
            wallet_error: None,
            system_error: None,
            last_protection_attempt: HashMap::new(),
            last_enforce: HashMap::new(),
            last_feed_restart: None,
        }
    }

    /// 에러를 롤링 목록에 기록 (최신순, 캡 제한).
    pub fn record_error(&mut self, context: &str, message: impl std::fmt::Display) {
        let entry = format!("[{}] {}", context, message);
        self.recent_errors.push_front(entry);
        self.recent_errors.truncate(MAX_RECENT_ERRORS);
    }

    /// 이벤트 기록.
    pub fn push_event(
        &mut self,
        kind: EventKind,
        symbol: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.events.push(kind, symbol, message);
    }

    /// 최근 이벤트 목록 복사.
    pub fn event_entries(&self) -> Vec<LogEvent> {
        self.events.entries().to_vec()
    }

    /// 해당 심볼의 오픈 포지션 존재 여부.
    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.iter().any(|p| p.symbol == symbol)
    }

    /// 해당 심볼의 라이브 진입 주문 존재 여부.
    pub fn has_live_entry_order(&self, symbol: &str) -> bool {
        self.orders
            .iter()
            .any(|o| o.symbol == symbol && o.is_live_entry())
    }

    /// 오픈 포지션 수 + 대기 인텐트 수.
    pub fn open_positions_with_pending(&self) -> usize {
        self.positions.len() + self.pending_intents.len()
    }

    /// 라이브 진입 주문 수 + 대기 인텐트 수.
    pub fn open_orders_with_pending(&self) -> usize {
        self.orders.iter().filter(|o| o.is_live_entry()).count() + self.pending_intents.len()
    }

    /// 집계 시스템 에러 갱신.
    ///
    /// 두 루프가 모두 건강할 때만 해제됩니다.
    pub fn refresh_system_error(&mut self) {
        if self.fast_healthy && self.slow_healthy {
            self.system_error = None;
        } else if self.system_error.is_none() {
            self.system_error = self
                .recent_errors
                .front()
                .cloned()
                .or_else(|| Some("폴링 루프 비정상".to_string()));
        }
    }
}

impl Default for CoordinatorState {
    fn default() -> Self {
        Self::new()
    }
}

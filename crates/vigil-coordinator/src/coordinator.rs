//! 코디네이터 본체.
//!
//! 독립적으로 타이밍되는 주기 태스크들(빠른/느린 폴링, 보호
//! 재검증, 하트비트)과 Decision 채널 소비자를 소유합니다.
//!
//! # 동시성 규칙
//!
//! - 각 루프는 busy 가드(AtomicBool)를 가져 베뉴 응답이 느려도
//!   같은 루프가 겹쳐 실행되지 않습니다. 이전 틱이 진행 중이면
//!   이번 틱은 그냥 건너뜁니다.
//! - 한 틱 안에서 포지션/주문/체결 조회는 동시에 수행되고(fan-out)
//!   독립적으로 처리됩니다. 하나의 실패가 나머지 처리를 막지
//!   않습니다.
//! - 진행 중인 베뉴 호출의 협조적 취소는 없습니다. 느린 응답은
//!   다음 틱의 busy 가드가 흡수합니다.
//! - 전략 피드 구독은 설정 변경 또는 정체 감지 시 에포크 증가와
//!   함께 명시적으로 해체/재생성됩니다.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{Notify, RwLock};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vigil_core::{Decision, EventKind, Settings};
use vigil_engine::gates::{self, GateContext};
use vigil_engine::{diff_orders, diff_positions, OrderDelta, PositionDelta};
use vigil_venue::{VenueDataProvider, VenueError, VenueOrderProvider};

use crate::diagnostics::{PortfolioSummary, StatusSnapshot};
use crate::dispatch;
use crate::enforcer;
use crate::feed::DecisionFeed;
use crate::protection;
use crate::state::CoordinatorState;

/// 코디네이터 조작 에러.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// 대상 포지션/주문 없음
    #[error("대상 없음: {0}")]
    NotFound(String),

    /// 베뉴 에러
    #[error(transparent)]
    Venue(#[from] VenueError),
}

/// 주기 설정.
///
/// 테스트에서 짧은 주기로 교체할 수 있도록 분리되어 있습니다.
#[derive(Debug, Clone)]
pub struct CoordinatorIntervals {
    /// 빠른 폴링 주기 (포지션/주문/체결)
    pub fast: Duration,
    /// 느린 폴링 주기 (지갑/손익/정합성)
    pub slow: Duration,
    /// 보호 재검증 주기
    pub protection: Duration,
    /// 하트비트 주기
    pub heartbeat: Duration,
    /// 심볼별 보호 설정 재시도 최소 간격
    pub protection_min_attempt: Duration,
    /// 편향 강제 대상별 최소 간격
    pub enforce_min_action: Duration,
    /// 피드 정체 판정 시간
    pub feed_stale_after: Duration,
    /// 피드 재시작 최소 간격
    pub feed_restart_min_interval: Duration,
    /// 청산 손익 조회 구간
    pub closed_pnl_lookback: Duration,
}

impl Default for CoordinatorIntervals {
    fn default() -> Self {
        Self {
            fast: Duration::from_secs(1),
            slow: Duration::from_secs(10),
            protection: Duration::from_secs(180),
            heartbeat: Duration::from_secs(30),
            protection_min_attempt: Duration::from_secs(180),
            enforce_min_action: Duration::from_secs(30),
            feed_stale_after: Duration::from_secs(60),
            feed_restart_min_interval: Duration::from_secs(120),
            closed_pnl_lookback: Duration::from_secs(24 * 3600),
        }
    }
}

/// Gate-and-Dispatch 코디네이터.
pub struct Coordinator {
    data: Arc<dyn VenueDataProvider>,
    orders: Arc<dyn VenueOrderProvider>,
    settings: Settings,
    intervals: CoordinatorIntervals,
    state: Arc<RwLock<CoordinatorState>>,
    fast_busy: AtomicBool,
    slow_busy: AtomicBool,
    feed_epoch: AtomicU64,
    feed_restart: Notify,
}

impl Coordinator {
    /// 새 코디네이터 생성.
    pub fn new(
        data: Arc<dyn VenueDataProvider>,
        orders: Arc<dyn VenueOrderProvider>,
        settings: Settings,
    ) -> Self {
        Self {
            data,
            orders,
            settings,
            intervals: CoordinatorIntervals::default(),
            state: Arc::new(RwLock::new(CoordinatorState::new())),
            fast_busy: AtomicBool::new(false),
            slow_busy: AtomicBool::new(false),
            feed_epoch: AtomicU64::new(0),
            feed_restart: Notify::new(),
        }
    }

    /// 주기 설정과 함께 생성 (테스트용 짧은 주기 등).
    pub fn with_intervals(
        data: Arc<dyn VenueDataProvider>,
        orders: Arc<dyn VenueOrderProvider>,
        settings: Settings,
        intervals: CoordinatorIntervals,
    ) -> Self {
        Self {
            intervals,
            ..Self::new(data, orders, settings)
        }
    }

    /// 상태 핸들 (진단/테스트용 읽기 접근).
    pub fn state(&self) -> Arc<RwLock<CoordinatorState>> {
        Arc::clone(&self.state)
    }

    /// 현재 설정.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// 현재 피드 에포크.
    pub fn feed_epoch(&self) -> u64 {
        self.feed_epoch.load(Ordering::Relaxed)
    }

    // ==================== 빠른 루프 ====================

    /// 빠른 폴링 한 틱: 포지션/주문/체결 동시 조회 후 차이 계산,
    /// 성공 시 보호 동기화와 편향 강제 수행.
    pub async fn fast_tick(&self) {
        if self
            .fast_busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("빠른 루프 이전 틱 진행 중, 건너뜀");
            return;
        }

        let (positions_result, orders_result, executions_result) = tokio::join!(
            self.data.fetch_positions(),
            self.data.fetch_open_orders(),
            self.data.fetch_recent_executions()
        );

        let positions_ok = positions_result.is_ok();
        let orders_ok = orders_result.is_ok();
        let executions_ok = executions_result.is_ok();

        {
            let mut st = self.state.write().await;

            // 포지션 차이 계산 (주문 결과와 무관하게 독립 처리)
            match positions_result {
                Ok(positions) => {
                    let (deltas, summaries) = diff_positions(&st.position_summaries, &positions);
                    for delta in &deltas {
                        match delta {
                            PositionDelta::Opened {
                                symbol,
                                side,
                                size,
                                entry_price,
                            } => st.push_event(
                                EventKind::Info,
                                symbol.clone(),
                                format!("포지션 열림: {} {} @ {}", side, size, entry_price),
                            ),
                            PositionDelta::Resized { symbol, from, to } => st.push_event(
                                EventKind::Info,
                                symbol.clone(),
                                format!("포지션 사이즈 변경: {} → {}", from, to),
                            ),
                            PositionDelta::Closed { symbol } => st.push_event(
                                EventKind::Info,
                                symbol.clone(),
                                "포지션 닫힘".to_string(),
                            ),
                        }
                    }
                    st.position_summaries = summaries;
                    st.positions = positions;
                    st.positions_error = None;
                }
                Err(e) => {
                    st.positions_error = Some(e.to_string());
                    st.record_error("positions", &e);
                }
            }

            // 주문 차이 계산
            match orders_result {
                Ok(orders) => {
                    let (deltas, summaries) = diff_orders(&st.order_summaries, &orders);
                    for delta in &deltas {
                        match delta {
                            OrderDelta::New { key, symbol, status } => st.push_event(
                                EventKind::Info,
                                symbol.clone(),
                                format!("주문 생성: {} ({})", key, status),
                            ),
                            OrderDelta::StatusChanged {
                                key,
                                symbol,
                                from,
                                to,
                            } => st.push_event(
                                EventKind::Info,
                                symbol.clone(),
                                format!("주문 상태 변경: {} ({} → {})", key, from, to),
                            ),
                            OrderDelta::Removed { key, symbol } => st.push_event(
                                EventKind::Info,
                                symbol.clone(),
                                format!("주문 종료: {}", key),
                            ),
                        }
                    }
                    st.order_summaries = summaries;
                    st.orders = orders;
                    st.orders_error = None;
                }
                Err(e) => {
                    st.orders_error = Some(e.to_string());
                    st.record_error("orders", &e);
                }
            }

            // 체결 처리 (ID 중복 제거)
            match executions_result {
                Ok(executions) => {
                    for execution in executions {
                        if st.seen_executions.insert(execution.exec_id.clone()) {
                            st.push_event(
                                EventKind::Info,
                                execution.symbol.clone(),
                                format!(
                                    "체결: {} {} @ {}",
                                    execution.side, execution.qty, execution.price
                                ),
                            );
                        }
                    }
                    st.executions_error = None;
                }
                Err(e) => {
                    st.executions_error = Some(e.to_string());
                    st.record_error("executions", &e);
                }
            }

            st.fast_healthy = positions_ok && orders_ok && executions_ok;
            st.refresh_system_error();
        }

        // 미러가 신뢰할 수 있을 때만 보호 동기화와 편향 강제
        if positions_ok && orders_ok {
            protection::sync_trailing_protection(
                &self.settings,
                &self.state,
                &self.orders,
                self.intervals.protection_min_attempt,
            )
            .await;

            enforcer::enforce_bias_alignment(
                &self.settings,
                &self.state,
                &self.orders,
                self.intervals.enforce_min_action,
            )
            .await;
        }

        self.fast_busy.store(false, Ordering::Release);
    }

    // ==================== 느린 루프 ====================

    /// 느린 폴링 한 틱: 지갑, 청산 손익, 정합성 리포트.
    pub async fn slow_tick(&self) {
        if self
            .slow_busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("느린 루프 이전 틱 진행 중, 건너뜀");
            return;
        }

        let (wallet_result, pnl_result, reconcile_result) = tokio::join!(
            self.data.fetch_wallet(),
            self.data.fetch_closed_pnl(self.intervals.closed_pnl_lookback),
            self.data.fetch_reconcile_report()
        );

        let wallet_ok = wallet_result.is_ok();
        let pnl_ok = pnl_result.is_ok();
        let reconcile_ok = reconcile_result.is_ok();

        {
            let mut st = self.state.write().await;

            match wallet_result {
                Ok(wallet) => {
                    st.wallet = Some(wallet);
                    st.wallet_error = None;
                }
                Err(e) => {
                    st.wallet_error = Some(e.to_string());
                    st.record_error("wallet", &e);
                }
            }

            match pnl_result {
                Ok(records) => {
                    let cooldown = chrono::Duration::minutes(self.settings.cooldown_minutes);
                    for record in records {
                        if !st.seen_pnl.insert(record.venue_id.clone()) {
                            continue;
                        }
                        st.daily_pnl += record.realized_pnl;
                        st.push_event(
                            EventKind::Exit,
                            record.symbol.clone(),
                            format!("청산 손익: {}", record.realized_pnl),
                        );
                        if record.is_loss() {
                            // 가장 최근 손실 기준 쿨다운 (스트릭 백오프 아님)
                            let until = record.closed_at + cooldown;
                            let entry = st
                                .cooldowns
                                .entry(record.symbol.clone())
                                .or_insert(until);
                            if until > *entry {
                                *entry = until;
                            }
                        }
                    }
                }
                Err(e) => {
                    st.record_error("closed_pnl", &e);
                }
            }

            match reconcile_result {
                Ok(report) => {
                    let local_positions = st.positions.len();
                    let local_orders = st.orders.len();
                    if report.open_positions != local_positions
                        || report.open_orders != local_orders
                    {
                        st.push_event(
                            EventKind::System,
                            String::new(),
                            format!(
                                "정합성 불일치: 베뉴 포지션 {} / 로컬 {}, 베뉴 주문 {} / 로컬 {}",
                                report.open_positions,
                                local_positions,
                                report.open_orders,
                                local_orders
                            ),
                        );
                    }
                }
                Err(e) => {
                    st.record_error("reconcile", &e);
                }
            }

            st.slow_healthy = wallet_ok && pnl_ok && reconcile_ok;
            st.refresh_system_error();
        }

        self.slow_busy.store(false, Ordering::Release);
    }

    // ==================== 보호 재검증 / 하트비트 ====================

    /// 보호 재검증 타이머 틱.
    ///
    /// 베뉴가 트레일링 값을 보고하지 않는 포지션만 재전송 대상이
    /// 됩니다 (심볼별 시도 간격은 동기화기 내부에서 적용).
    pub async fn protection_tick(&self) {
        protection::sync_trailing_protection(
            &self.settings,
            &self.state,
            &self.orders,
            self.intervals.protection_min_attempt,
        )
        .await;
    }

    /// 하트비트 틱: SCAN/MANAGE 요약과 피드 정체 감시.
    pub async fn heartbeat_tick(&self) {
        let (scan, manage, stale) = {
            let st = self.state.read().await;
            let mut scan = Vec::new();
            let mut manage = Vec::new();
            for symbol in &self.settings.symbols {
                if st.has_position(symbol) {
                    manage.push(symbol.clone());
                } else {
                    scan.push(symbol.clone());
                }
            }
            let stale = st
                .last_feed_tick
                .map(|at| at.elapsed() >= self.intervals.feed_stale_after)
                .unwrap_or(false);
            (scan, manage, stale)
        };

        info!(
            scan = ?scan,
            manage = ?manage,
            "하트비트: SCAN {}개 / MANAGE {}개",
            scan.len(),
            manage.len()
        );
        {
            let mut st = self.state.write().await;
            st.push_event(
                EventKind::System,
                String::new(),
                format!("하트비트: SCAN {:?} / MANAGE {:?}", scan, manage),
            );
        }

        if stale {
            let can_restart = {
                let st = self.state.read().await;
                st.last_feed_restart
                    .map(|at| at.elapsed() >= self.intervals.feed_restart_min_interval)
                    .unwrap_or(true)
            };
            if can_restart {
                let epoch = self.feed_epoch.fetch_add(1, Ordering::AcqRel) + 1;
                warn!(epoch, "전략 피드 정체 감지, 재구독 트리거");
                {
                    let mut st = self.state.write().await;
                    st.last_feed_restart = Some(Instant::now());
                    st.push_event(
                        EventKind::System,
                        String::new(),
                        format!("전략 피드 정체, 재구독 (에포크 {})", epoch),
                    );
                }
                self.feed_restart.notify_one();
            }
        }
    }

    // ==================== 피드 소비 ====================

    /// Decision 한 건 처리.
    ///
    /// 매 틱 진단용 게이트 평가를 저장하고, 새 신호라면 실행 시점
    /// 평가로 승인/거부를 결정합니다. 대기 중 중복 신호는 큐에
    /// 쌓지 않고 버립니다.
    pub async fn on_decision(&self, decision: Decision) {
        let symbol = decision.symbol.clone();

        {
            let mut st = self.state.write().await;
            st.last_feed_tick = Some(Instant::now());
            st.decisions.insert(symbol.clone(), decision.clone());
        }

        // 진단 + 실행 시점 평가 (같은 스냅샷에서 동기적으로 수행)
        let report = {
            let st = self.state.read().await;
            let ctx = GateContext {
                has_open_position: st.has_position(&symbol),
                has_live_entry_order: st.has_live_entry_order(&symbol),
                has_pending_intent: st.pending_intents.contains(&symbol),
                open_positions_with_pending: st.open_positions_with_pending(),
                open_orders_with_pending: st.open_orders_with_pending(),
                cooldown_until: st.cooldowns.get(&symbol).copied(),
                now: chrono::Utc::now(),
            };
            gates::evaluate(&decision, &ctx, &self.settings)
        };

        {
            let mut st = self.state.write().await;
            st.gate_reports.insert(symbol.clone(), report.clone());
        }

        let Some(signal) = decision.signal.clone() else {
            return;
        };

        // 신호 ID는 프로세스 수명 동안 최대 한 번 소비
        let fresh = {
            let mut st = self.state.write().await;
            st.seen_signals.insert(signal.id.to_string())
        };
        if !fresh {
            debug!(symbol = %symbol, signal_id = %signal.id, "이미 처리한 신호 ID, 무시");
            return;
        }

        // 대기 중 중복 신호: 게이트 평가보다 먼저 확인하여
        // "intent pending" 한 줄만 남기고 버림
        {
            let mut st = self.state.write().await;
            if st.pending_intents.contains(&symbol) {
                st.push_event(
                    EventKind::Info,
                    symbol.clone(),
                    format!("{} intent pending", symbol),
                );
                return;
            }
        }

        if !report.admitted {
            let mut st = self.state.write().await;
            st.push_event(
                EventKind::RiskBlock,
                symbol.clone(),
                format!("blocked by: {}", report.block_summary()),
            );
            return;
        }

        // 대기 집합 선점은 비동기 제출이 시작되기 전에 동기적으로
        // 수행 (50ms 간격의 연속 신호도 두 번째는 위의 pending
        // 분기로 빠짐)
        {
            let mut st = self.state.write().await;
            if !st.pending_intents.insert(symbol.clone()) {
                st.push_event(
                    EventKind::Info,
                    symbol.clone(),
                    format!("{} intent pending", symbol),
                );
                return;
            }
        }

        let settings = self.settings.clone();
        let state = Arc::clone(&self.state);
        let orders = Arc::clone(&self.orders);
        tokio::spawn(async move {
            dispatch::dispatch_signal(&settings, &state, &orders, &decision, &signal).await;
        });
    }

    // ==================== 수동 조작 ====================

    /// 수동 포지션 청산. 자동 경로와 같은 베뉴 클라이언트를 쓰고,
    /// 직후 주기 외 빠른 폴링으로 미러를 갱신합니다.
    pub async fn close_position(&self, symbol: &str) -> Result<String, CoordinatorError> {
        let (side, qty) = {
            let st = self.state.read().await;
            let position = st
                .positions
                .iter()
                .find(|p| p.symbol == symbol)
                .ok_or_else(|| CoordinatorError::NotFound(format!("포지션 {}", symbol)))?;
            (position.side.opposite(), position.size)
        };

        let order_id = self.orders.close_position_market(symbol, side, qty).await?;
        {
            let mut st = self.state.write().await;
            st.push_event(
                EventKind::Exit,
                symbol.to_string(),
                format!("수동 청산: {} {} (주문 {})", side, qty, order_id),
            );
        }

        self.fast_tick().await;
        Ok(order_id)
    }

    /// 수동 주문 취소. 직후 주기 외 빠른 폴링으로 미러를 갱신합니다.
    pub async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), CoordinatorError> {
        self.orders.cancel_order(symbol, order_id).await?;
        {
            let mut st = self.state.write().await;
            st.push_event(
                EventKind::Exit,
                symbol.to_string(),
                format!("수동 주문 취소: {}", order_id),
            );
        }

        self.fast_tick().await;
        Ok(())
    }

    // ==================== 진단 ====================

    /// 프레젠테이션 레이어용 상태 스냅샷.
    pub async fn status(&self) -> StatusSnapshot {
        let st = self.state.read().await;

        let unrealized_pnl = st.positions.iter().map(|p| p.unrealized_pnl).sum();
        let mut pending_symbols: Vec<String> = st.pending_intents.iter().cloned().collect();
        pending_symbols.sort();

        StatusSnapshot {
            venue_name: self.data.venue_name().to_string(),
            connected: st.fast_healthy,
            system_error: st.system_error.clone(),
            venue_latency_ms: self.data.last_latency().map(|d| d.as_millis() as u64),
            wallet: st.wallet.clone(),
            portfolio: PortfolioSummary {
                open_positions: st.positions.len(),
                open_orders: st.orders.iter().filter(|o| o.is_live_entry()).count(),
                pending_intents: st.pending_intents.len(),
                unrealized_pnl,
                daily_pnl: st.daily_pnl,
            },
            positions: st.positions.clone(),
            orders: st.orders.clone(),
            pending_symbols,
            events: st.event_entries(),
            recent_errors: st.recent_errors.iter().cloned().collect(),
            gate_reports: st.gate_reports.clone(),
        }
    }

    // ==================== 실행 ====================

    /// 모든 주기 태스크와 피드 소비자를 기동하고 종료 토큰을
    /// 기다립니다.
    pub async fn run(self: Arc<Self>, feed: Arc<dyn DecisionFeed>, shutdown: CancellationToken) {
        info!(
            venue = self.data.venue_name(),
            symbols = ?self.settings.symbols,
            "코디네이터 시작"
        );

        let mut handles = Vec::new();

        // 빠른 루프
        {
            let this = Arc::clone(&self);
            let token = shutdown.clone();
            handles.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(this.intervals.fast);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = interval.tick() => this.fast_tick().await,
                    }
                }
            }));
        }

        // 느린 루프
        {
            let this = Arc::clone(&self);
            let token = shutdown.clone();
            handles.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(this.intervals.slow);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = interval.tick() => this.slow_tick().await,
                    }
                }
            }));
        }

        // 보호 재검증
        {
            let this = Arc::clone(&self);
            let token = shutdown.clone();
            handles.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(this.intervals.protection);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                interval.tick().await; // 첫 틱 즉시 반환 소비
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = interval.tick() => this.protection_tick().await,
                    }
                }
            }));
        }

        // 하트비트
        {
            let this = Arc::clone(&self);
            let token = shutdown.clone();
            handles.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(this.intervals.heartbeat);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                interval.tick().await;
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = interval.tick() => this.heartbeat_tick().await,
                    }
                }
            }));
        }

        // 피드 소비자 (Decision 맵의 단일 작성자)
        {
            let this = Arc::clone(&self);
            let token = shutdown.clone();
            handles.push(tokio::spawn(async move {
                'outer: loop {
                    let mut rx = feed.subscribe().await;
                    debug!(epoch = this.feed_epoch(), "전략 피드 구독");
                    loop {
                        tokio::select! {
                            _ = token.cancelled() => break 'outer,
                            _ = this.feed_restart.notified() => {
                                debug!("피드 재구독 신호 수신");
                                continue 'outer;
                            }
                            received = rx.recv() => match received {
                                Some(decision) => this.on_decision(decision).await,
                                None => {
                                    // 채널 닫힘: 재구독 또는 종료 대기
                                    tokio::select! {
                                        _ = token.cancelled() => break 'outer,
                                        _ = this.feed_restart.notified() => continue 'outer,
                                    }
                                }
                            }
                        }
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
        info!("코디네이터 종료");
    }
}

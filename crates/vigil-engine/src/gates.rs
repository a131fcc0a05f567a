//! 승인 게이트 엔진.
//!
//! (현재 Decision, 오픈 포지션/주문 스냅샷, 설정) → 승인/거부와
//! 구조화된 사유 목록을 만드는 순수 함수입니다. 매 Decision 틱마다
//! 진단용으로 평가되고, 신호 실행 시점에 동기적으로 한 번 더
//! 평가됩니다.
//!
//! - 하드 게이트: 실패 시 (개별 오버라이드가 없으면) 실행 차단
//! - 소프트 게이트: 체크리스트 가중 점수. 소프트 게이팅이 켜진
//!   경우에만 차단하며, 진단 표시는 항상 유지
//!
//! 비활성화된 게이트는 차단 사유와 소프트 점수에서 제외되지만
//! 원시 평가와 함께 진단에 계속 표시됩니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vigil_core::{Decision, EntryKind, GateCheck, GateId, Settings};

use crate::session;
use crate::trend;

/// 게이트 평가에 필요한 코디네이터 상태 스냅샷.
///
/// 대기 인텐트는 베뉴 주문 목록보다 앞서는 권위 있는 소스이므로
/// 용량 계산에 반드시 포함됩니다.
#[derive(Debug, Clone)]
pub struct GateContext {
    /// 해당 심볼의 오픈 포지션 존재 여부
    pub has_open_position: bool,
    /// 해당 심볼의 라이브 진입 주문 존재 여부
    pub has_live_entry_order: bool,
    /// 해당 심볼의 대기 인텐트 존재 여부
    pub has_pending_intent: bool,
    /// 오픈 포지션 수 + 대기 인텐트 수
    pub open_positions_with_pending: usize,
    /// 오픈 진입 주문 수 + 대기 인텐트 수
    pub open_orders_with_pending: usize,
    /// 손실 쿨다운 만료 시각 (없으면 쿨다운 아님)
    pub cooldown_until: Option<DateTime<Utc>>,
    /// 평가 기준 시각
    pub now: DateTime<Utc>,
}

impl Default for GateContext {
    fn default() -> Self {
        Self {
            has_open_position: false,
            has_live_entry_order: false,
            has_pending_intent: false,
            open_positions_with_pending: 0,
            open_orders_with_pending: 0,
            cooldown_until: None,
            now: Utc::now(),
        }
    }
}

/// 소프트 점수 항목.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftScoreItem {
    /// 항목 이름
    pub label: String,
    /// 획득 점수
    pub points: f64,
    /// 만점
    pub max_points: f64,
}

/// 소프트 게이트 점수.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftScore {
    /// 총점 (0 ~ 100)
    pub score: f64,
    /// 통과 임계값
    pub threshold: f64,
    /// 통과 여부
    pub passed: bool,
    /// 항목별 내역
    pub items: Vec<SoftScoreItem>,
}

/// 게이트 평가 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateReport {
    /// 심볼
    pub symbol: String,
    /// 모든 게이트의 평가 (비활성 게이트 포함, 진단용)
    pub checks: Vec<GateCheck>,
    /// 차단 사유 (오버라이드 적용 후)
    pub blocks: Vec<GateId>,
    /// 소프트 점수
    pub soft: SoftScore,
    /// 피드 경과 시간 (초)
    pub feed_age_secs: i64,
    /// 승인 여부
    pub admitted: bool,
}

impl GateReport {
    /// "blocked by: a · b" 형태의 사유 요약.
    pub fn block_summary(&self) -> String {
        self.blocks
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(" · ")
    }
}

/// 게이트 평가.
pub fn evaluate(decision: &Decision, ctx: &GateContext, settings: &Settings) -> GateReport {
    let feed_age_secs = decision.age_secs(ctx.now);
    let mut checks = Vec::with_capacity(GateId::ALL.len());

    // ==================== 하드 게이트 ====================

    // 신호 존재
    let signal_check = if decision.halted {
        GateCheck::new(GateId::SignalPresent, false, "거래 중지됨 (halted)")
    } else if decision.signal.is_some() {
        GateCheck::new(GateId::SignalPresent, true, "신호 있음")
    } else {
        GateCheck::new(GateId::SignalPresent, false, "신호 없음")
    };
    checks.push(signal_check);

    // 추세 편향 정렬
    let trend_check = match &decision.signal {
        Some(signal) => {
            let verdict = trend::check_alignment(
                settings.trend_gate_mode,
                signal.kind,
                signal.side,
                &decision.trend,
                &settings.adaptive_trend,
            );
            GateCheck::new(
                GateId::TrendAlignment,
                verdict.is_allowed(),
                verdict.detail().to_string(),
            )
        }
        None => GateCheck::new(
            GateId::TrendAlignment,
            true,
            format!(
                "합의: HTF {:?} / LTF {:?} (강도 {:.1})",
                decision.trend.htf_bias, decision.trend.ltf_bias, decision.trend.strength
            ),
        ),
    };
    checks.push(trend_check);

    // 세션 시간
    let session_verdict = session::within_session(&settings.session_hours, ctx.now);
    checks.push(GateCheck::new(
        GateId::SessionHours,
        session_verdict.allowed,
        session_verdict.detail,
    ));

    // 심볼 용량
    let symbol_capacity = if ctx.has_open_position {
        GateCheck::new(GateId::SymbolCapacity, false, "기존 포지션 있음")
    } else if ctx.has_live_entry_order {
        GateCheck::new(GateId::SymbolCapacity, false, "라이브 진입 주문 있음")
    } else if ctx.has_pending_intent {
        GateCheck::new(GateId::SymbolCapacity, false, "대기 인텐트 있음")
    } else {
        GateCheck::new(GateId::SymbolCapacity, true, "심볼 여유 있음")
    };
    checks.push(symbol_capacity);

    // 포트폴리오 용량 (대기 인텐트 포함)
    let positions_ok = ctx.open_positions_with_pending < settings.max_open_positions;
    let orders_ok = ctx.open_orders_with_pending < settings.max_open_orders;
    checks.push(GateCheck::new(
        GateId::PortfolioCapacity,
        positions_ok && orders_ok,
        format!(
            "포지션 {}/{}, 주문 {}/{}",
            ctx.open_positions_with_pending,
            settings.max_open_positions,
            ctx.open_orders_with_pending,
            settings.max_open_orders
        ),
    ));

    // 손실 후 쿨다운
    let cooldown_check = match ctx.cooldown_until {
        Some(until) if ctx.now < until => GateCheck::new(
            GateId::CooldownAfterLoss,
            false,
            format!("쿨다운 중 (해제: {})", until.format("%H:%M:%S")),
        ),
        _ => GateCheck::new(GateId::CooldownAfterLoss, true, "쿨다운 아님"),
    };
    checks.push(cooldown_check);

    // 피드 신선도
    checks.push(GateCheck::new(
        GateId::FeedFreshness,
        feed_age_secs <= settings.feed_staleness_secs,
        format!(
            "피드 경과 {}초 (한계 {}초)",
            feed_age_secs, settings.feed_staleness_secs
        ),
    ));

    // 구조적 손절가 유효성
    let stop_check = match &decision.signal {
        Some(signal) => {
            if signal.stop_is_structural() {
                GateCheck::new(GateId::StopValidity, true, "손절가 구조 유효")
            } else if signal.stop_loss.is_none()
                && settings.synthesize_protection
                && decision.atr > rust_decimal::Decimal::ZERO
            {
                GateCheck::new(GateId::StopValidity, true, "손절가 ATR 합성 예정")
            } else if signal.stop_loss.is_none() {
                GateCheck::new(GateId::StopValidity, false, "손절가 없음")
            } else {
                GateCheck::new(GateId::StopValidity, false, "손절가가 진입가 기준 잘못된 쪽")
            }
        }
        None => GateCheck::new(GateId::StopValidity, false, "신호 없음"),
    };
    checks.push(stop_check);

    // ==================== 소프트 게이트 ====================

    let soft = soft_score(decision, feed_age_secs, settings);
    checks.push(GateCheck::new(
        GateId::SoftQuality,
        soft.passed,
        format!("{:.1} / 임계 {:.1}", soft.score, soft.threshold),
    ));

    // ==================== 오버라이드와 차단 집계 ====================

    for check in &mut checks {
        check.disabled = settings.gate_disabled(check.id);
    }

    let mut blocks: Vec<GateId> = checks
        .iter()
        .filter(|check| check.blocks())
        .map(|check| check.id)
        .collect();

    // 소프트 게이트는 게이팅이 켜진 경우에만 차단 사유가 됨
    if settings.soft_gate_enabled
        && !soft.passed
        && !settings.gate_disabled(GateId::SoftQuality)
    {
        blocks.push(GateId::SoftQuality);
    }

    let admitted = blocks.is_empty();

    GateReport {
        symbol: decision.symbol.clone(),
        checks,
        blocks,
        soft,
        feed_age_secs,
        admitted,
    }
}

/// 소프트 품질 점수 계산.
///
/// 독립적으로 평가된 체크리스트 항목을 합산합니다. 임계값은
/// 메이저/알트 심볼에 따라 다르고, 강한 추세에서는 상향됩니다.
fn soft_score(decision: &Decision, feed_age_secs: i64, settings: &Settings) -> SoftScore {
    let quality = &decision.quality;
    let mut items = Vec::new();

    let ema_points = if quality.ema_ordered { 20.0 } else { 0.0 };
    items.push(SoftScoreItem {
        label: "EMA 정렬".to_string(),
        points: ema_points,
        max_points: 20.0,
    });

    // EMA 간격 / ATR: 1.0 이상이면 만점
    let separation_points = (quality.ema_separation_atr.clamp(0.0, 1.0)) * 15.0;
    items.push(SoftScoreItem {
        label: "EMA 간격/ATR".to_string(),
        points: separation_points,
        max_points: 15.0,
    });

    // ATR 백분율 바닥 (0.1% 미만은 변동성 부족)
    let atr_points = if quality.atr_percent >= 0.1 { 15.0 } else { 0.0 };
    items.push(SoftScoreItem {
        label: "ATR 바닥".to_string(),
        points: atr_points,
        max_points: 15.0,
    });

    let volume_points = quality.volume_percentile.clamp(0.0, 1.0) * 15.0;
    items.push(SoftScoreItem {
        label: "거래량 백분위".to_string(),
        points: volume_points,
        max_points: 15.0,
    });

    let pullback_points = if quality.pullback_confirmed { 20.0 } else { 0.0 };
    items.push(SoftScoreItem {
        label: "되돌림/돌파 확인".to_string(),
        points: pullback_points,
        max_points: 20.0,
    });

    let age_points = if feed_age_secs <= 10 {
        10.0
    } else if feed_age_secs <= 30 {
        5.0
    } else {
        0.0
    };
    items.push(SoftScoreItem {
        label: "피드 신선도".to_string(),
        points: age_points,
        max_points: 10.0,
    });

    let maker_points = match decision.signal.as_ref().map(|s| s.entry_kind) {
        Some(EntryKind::LimitMaker) => 5.0,
        _ => 0.0,
    };
    items.push(SoftScoreItem {
        label: "메이커 진입".to_string(),
        points: maker_points,
        max_points: 5.0,
    });

    let score: f64 = items.iter().map(|item| item.points).sum();

    let mut threshold = if settings.is_major(&decision.symbol) {
        settings.soft_thresholds.major_pass
    } else {
        settings.soft_thresholds.alt_pass
    };
    if decision.trend.strength >= settings.adaptive_trend.strong_strength {
        threshold += settings.soft_thresholds.strong_trend_bonus;
    }

    SoftScore {
        score,
        threshold,
        passed: score >= threshold,
        items,
    }
}

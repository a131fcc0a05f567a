//! 인텐트 디스패처.
//!
//! 승인된 신호 하나당 정확히 한 번, 고유 ID와 TTL을 가진 인텐트를
//! 만들어 제출합니다. 대기 집합은 비동기 제출이 시작되기 전에
//! 심볼을 추가하고, 성공/실패와 무관하게 제출이 끝나면 제거합니다
//! (finally 동등 경로). 대기 중 같은 심볼의 두 번째 신호는 로그만
//! 남기고 버려지며, 큐에 쌓이지 않습니다.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{info, warn};

use vigil_core::{
    Decision, EntryKind, EventKind, OrderIntent, Settings, Side, TradeSignal,
};
use vigil_engine::{fixed_qty_size, risk_budget_size, SizingOutcome};
use vigil_venue::VenueOrderProvider;

use crate::state::CoordinatorState;

/// 최종 손절/목표 가격 결정.
///
/// 신호가 생략한 경우 설정이 허용하면 ATR 배수로 합성합니다.
/// 손절 합성: 롱은 진입가 아래, 숏은 진입가 위.
fn resolve_protection(
    settings: &Settings,
    decision: &Decision,
    signal: &TradeSignal,
) -> Option<(Decimal, Option<Decimal>)> {
    let stop = match signal.stop_loss {
        Some(stop) if signal.stop_is_structural() => stop,
        Some(_) => return None, // 잘못된 쪽 손절가는 게이트에서 걸렀어야 함
        None => {
            if !settings.synthesize_protection || decision.atr <= Decimal::ZERO {
                return None;
            }
            let offset = settings.stop_atr_mult * decision.atr;
            match signal.side {
                Side::Buy => signal.entry - offset,
                Side::Sell => signal.entry + offset,
            }
        }
    };

    let take_profit = signal.take_profit.or_else(|| {
        if settings.synthesize_protection && decision.atr > Decimal::ZERO {
            let offset = settings.tp_atr_mult * decision.atr;
            Some(match signal.side {
                Side::Buy => signal.entry + offset,
                Side::Sell => signal.entry - offset,
            })
        } else {
            None
        }
    });

    Some((stop, take_profit))
}

/// 진입 주문 유형 결정.
///
/// 시장가는 강한 추세 확장 조건이 명시적으로 충족된 경우에만
/// 유지되고, 그 외에는 지정가로 강등됩니다.
fn resolve_entry_kind(settings: &Settings, decision: &Decision, signal: &TradeSignal) -> EntryKind {
    match signal.entry_kind {
        EntryKind::Market => {
            let expansion = decision.trend.strength >= settings.adaptive_trend.strong_strength
                && decision.trend.alignment_count >= settings.adaptive_trend.strong_alignment_count;
            if expansion {
                EntryKind::Market
            } else {
                EntryKind::Limit
            }
        }
        other => other,
    }
}

/// 사이징 수행.
///
/// 연습 베뉴는 고정 수량, 그 외에는 리스크 예산 사이징.
fn resolve_sizing(
    settings: &Settings,
    equity: Option<Decimal>,
    symbol: &str,
    entry: Decimal,
    stop: Decimal,
) -> Result<SizingOutcome, String> {
    if settings.practice_venue {
        return fixed_qty_size(&settings.fixed_qty, symbol, entry).map_err(|e| e.to_string());
    }
    let risk_pct = settings
        .risk_percent()
        .ok_or_else(|| "리스크 비율 미설정".to_string())?;
    risk_budget_size(equity, risk_pct, entry, stop, &settings.sizing).map_err(|e| e.to_string())
}

/// 승인된 신호 디스패치.
///
/// 호출 전에 대기 집합에 심볼이 이미 선점되어 있어야 합니다
/// (코디네이터가 비동기 제출을 시작하기 전에 동기적으로 추가).
/// 이 함수는 성공/실패/조기 중단 모든 경로에서 대기 집합 엔트리를
/// 해제하고, 정확히 한 건의 이벤트를 기록합니다. 반환값은 제출
/// 성공 여부.
pub async fn dispatch_signal(
    settings: &Settings,
    state: &Arc<RwLock<CoordinatorState>>,
    orders: &Arc<dyn VenueOrderProvider>,
    decision: &Decision,
    signal: &TradeSignal,
) -> bool {
    let symbol = decision.symbol.clone();
    let submitted = dispatch_inner(settings, state, orders, decision, signal).await;

    // finally 동등: 결과와 무관하게 대기 집합에서 제거
    let mut st = state.write().await;
    st.pending_intents.remove(&symbol);
    submitted
}

async fn dispatch_inner(
    settings: &Settings,
    state: &Arc<RwLock<CoordinatorState>>,
    orders: &Arc<dyn VenueOrderProvider>,
    decision: &Decision,
    signal: &TradeSignal,
) -> bool {
    let symbol = decision.symbol.clone();

    // 보호 가격 결정
    let Some((stop_loss, take_profit)) = resolve_protection(settings, decision, signal) else {
        let mut st = state.write().await;
        st.push_event(
            EventKind::Error,
            symbol.clone(),
            "손절가 결정 실패로 신호 폐기",
        );
        return false;
    };

    let entry_kind = resolve_entry_kind(settings, decision, signal);

    // 사이징 (지갑은 느린 주기 갱신이지만 완전히 없을 때만 실패)
    let equity = {
        let st = state.read().await;
        st.wallet.as_ref().and_then(|w| w.usable_equity())
    };
    let sizing = match resolve_sizing(settings, equity, &symbol, signal.entry, stop_loss) {
        Ok(outcome) => outcome,
        Err(reason) => {
            let mut st = state.write().await;
            st.push_event(
                EventKind::Error,
                symbol.clone(),
                format!("사이징 실패: {}", reason),
            );
            return false;
        }
    };

    let mut intent = OrderIntent::new(
        settings.risk_mode.to_string(),
        symbol.clone(),
        signal.side,
        entry_kind,
        signal.entry,
        stop_loss,
        take_profit,
        sizing.quantity,
    )
    .with_ttl_secs(settings.intent_ttl_secs)
    .with_tag(match signal.kind {
        vigil_core::SignalKind::TrendEntry => "trend_entry",
        vigil_core::SignalKind::MeanReversion => "mean_reversion",
    });
    if let Some(trigger) = signal.trigger_price {
        intent = intent.with_trigger(trigger);
    }

    info!(
        symbol = %symbol,
        side = %signal.side,
        qty = %intent.qty,
        notional = %intent.notional(),
        entry_kind = %intent.entry_kind,
        intent_id = %intent.id,
        "인텐트 제출 시작"
    );

    let result = orders.place_order(&intent).await;

    let mut st = state.write().await;
    match result {
        Ok(order_id) => {
            st.push_event(
                EventKind::Entry,
                symbol.clone(),
                format!(
                    "{} {} {} @ {} (주문 {})",
                    signal.side, intent.qty, symbol, signal.entry, order_id
                ),
            );
            true
        }
        Err(e) => {
            // 신호 ID는 소비된 채 유지 - 조건이 지속되면 업스트림이
            // 새 ID로 재발행함
            warn!(symbol = %symbol, error = %e, "인텐트 제출 실패");
            st.record_error("dispatch", &e);
            st.push_event(
                EventKind::Error,
                symbol.clone(),
                format!("인텐트 제출 실패: {}", e),
            );
            false
        }
    }
}

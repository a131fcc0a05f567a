//! 편향 정렬 강제 적용.
//!
//! 성공한 빠른 폴링 직후 호출되어, 기준 심볼 편향과 반대 방향의
//! 노출을 시정합니다. 액션이 날아가는 동안 같은 대상에 즉시
//! 재발사되지 않도록 대상별로 속도 제한합니다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{info, warn};

use vigil_core::{EventKind, Settings};
use vigil_engine::bias::{reference_bias, scan_conflicts, AlignmentAction};
use vigil_venue::VenueOrderProvider;

use crate::state::CoordinatorState;

/// 편향 정렬 강제 한 회 수행.
pub async fn enforce_bias_alignment(
    settings: &Settings,
    state: &Arc<RwLock<CoordinatorState>>,
    orders: &Arc<dyn VenueOrderProvider>,
    min_action_interval: Duration,
) {
    // 기준 편향과 충돌 스캔 (스냅샷 읽기)
    let actions: Vec<AlignmentAction> = {
        let st = state.read().await;
        let trend_bias = st
            .decisions
            .get(&settings.reference_symbol)
            .map(|decision| decision.trend.htf_bias);

        let Some(reference) = reference_bias(
            &settings.reference_symbol,
            &st.positions,
            &st.orders,
            trend_bias,
        ) else {
            return;
        };

        let now = Instant::now();
        scan_conflicts(reference, &settings.reference_symbol, &st.positions, &st.orders)
            .into_iter()
            .filter(|action| {
                st.last_enforce
                    .get(&action.target_key())
                    .map(|at| now.duration_since(*at) >= min_action_interval)
                    .unwrap_or(true)
            })
            .collect()
    };

    for action in actions {
        {
            let mut st = state.write().await;
            st.last_enforce.insert(action.target_key(), Instant::now());
        }

        match &action {
            AlignmentAction::ClosePosition {
                symbol,
                close_side,
                qty,
            } => match orders.close_position_market(symbol, *close_side, *qty).await {
                Ok(order_id) => {
                    info!(symbol = %symbol, side = %close_side, "편향 불일치 포지션 청산");
                    let mut st = state.write().await;
                    st.push_event(
                        EventKind::Exit,
                        symbol.clone(),
                        format!("편향 불일치 청산: {} {} (주문 {})", close_side, qty, order_id),
                    );
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "편향 불일치 청산 실패");
                    let mut st = state.write().await;
                    st.record_error("bias_enforce", &e);
                    st.push_event(
                        EventKind::Error,
                        symbol.clone(),
                        format!("편향 불일치 청산 실패: {}", e),
                    );
                }
            },
            AlignmentAction::CancelOrder { symbol, order_id } => {
                match orders.cancel_order(symbol, order_id).await {
                    Ok(()) => {
                        info!(symbol = %symbol, order_id = %order_id, "편향 불일치 주문 취소");
                        let mut st = state.write().await;
                        st.push_event(
                            EventKind::Exit,
                            symbol.clone(),
                            format!("편향 불일치 주문 취소: {}", order_id),
                        );
                    }
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "편향 불일치 주문 취소 실패");
                        let mut st = state.write().await;
                        st.record_error("bias_enforce", &e);
                        st.push_event(
                            EventKind::Error,
                            symbol.clone(),
                            format!("편향 불일치 주문 취소 실패: {}", e),
                        );
                    }
                }
            }
        }
    }
}

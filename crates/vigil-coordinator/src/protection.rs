//! 보호 동기화기.
//!
//! 베뉴에 트레일링 스톱이 설정되지 않은 오픈 포지션마다 트레일링
//! 계획을 계산해 보호 갱신 호출로 전송합니다. 베뉴가 이미
//! 트레일링 값을 보고하는 포지션은 건드리지 않아 불필요한 쓰기를
//! 피하고, 심볼별 재시도 간격으로 매 빠른 틱마다의 중복 호출을
//! 막습니다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use vigil_core::{EventKind, Settings};
use vigil_engine::plan_trailing;
use vigil_venue::{ProtectionUpdate, VenueOrderProvider};

use crate::state::CoordinatorState;

/// 트레일링 보호 동기화 한 회 수행.
///
/// 빠른 루프 성공 직후와 보호 재검증 타이머 양쪽에서 호출됩니다.
/// 심볼별 마지막 시도 이후 `min_attempt_interval`이 지나야 다시
/// 시도합니다.
pub async fn sync_trailing_protection(
    settings: &Settings,
    state: &Arc<RwLock<CoordinatorState>>,
    orders: &Arc<dyn VenueOrderProvider>,
    min_attempt_interval: Duration,
) {
    // 계획 후보 수집 (읽기 잠금 구간 최소화)
    let candidates: Vec<(String, ProtectionUpdate)> = {
        let st = state.read().await;
        let now = Instant::now();

        st.positions
            .iter()
            .filter(|position| position.trailing_stop.is_none())
            .filter(|position| {
                st.last_protection_attempt
                    .get(&position.symbol)
                    .map(|at| now.duration_since(*at) >= min_attempt_interval)
                    .unwrap_or(true)
            })
            .filter_map(|position| {
                // 손절가가 없으면 리스크 단위를 계산할 수 없음
                let stop = match position.stop_loss {
                    Some(stop) => stop,
                    None => {
                        debug!(symbol = %position.symbol, "손절가 없는 포지션, 트레일링 건너뜀");
                        return None;
                    }
                };
                let profile = settings.trailing_for(&position.symbol);
                let plan = plan_trailing(position.entry_price, stop, position.side, profile, None)?;

                Some((
                    position.symbol.clone(),
                    ProtectionUpdate {
                        symbol: position.symbol.clone(),
                        position_idx: position.position_idx.to_wire(),
                        stop_loss: None,
                        take_profit: None,
                        trailing_stop: Some(plan.distance),
                        active_price: Some(plan.activation),
                    },
                ))
            })
            .collect()
    };

    for (symbol, update) in candidates {
        // 시도 시각은 결과와 무관하게 기록 (재시도 속도 제한)
        {
            let mut st = state.write().await;
            st.last_protection_attempt
                .insert(symbol.clone(), Instant::now());
        }

        match orders.set_protection(&update).await {
            Ok(()) => {
                info!(
                    symbol = %symbol,
                    distance = ?update.trailing_stop,
                    activation = ?update.active_price,
                    "트레일링 보호 설정 완료"
                );
                let mut st = state.write().await;
                st.push_event(
                    EventKind::System,
                    symbol.clone(),
                    format!(
                        "트레일링 설정: 간격 {} / 활성화 {}",
                        update
                            .trailing_stop
                            .map(|d| d.to_string())
                            .unwrap_or_default(),
                        update
                            .active_price
                            .map(|p| p.to_string())
                            .unwrap_or_default()
                    ),
                );
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "트레일링 보호 설정 실패");
                let mut st = state.write().await;
                st.record_error("protection", &e);
                st.push_event(
                    EventKind::Error,
                    symbol.clone(),
                    format!("트레일링 설정 실패: {}", e),
                );
            }
        }
    }
}

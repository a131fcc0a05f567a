//! 코디네이터 통합 테스트.
//!
//! Mock 베뉴 위에서 승인/디스패치/정합성 루프의 핵심 불변식을
//! 검증합니다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;

use vigil_coordinator::{ChannelFeed, Coordinator, CoordinatorIntervals};
use vigil_core::{
    Decision, EventKind, OrderInfo, OrderStatus, PositionIdx, PositionInfo, Settings, Side,
    SignalKind, TradeSignal, TrendBias, TrendReading, WalletSnapshot,
};
use vigil_venue::{FailFlags, MockVenue, VenueDataProvider, VenueOrderProvider};

// ==================== 헬퍼 ====================

fn reading() -> TrendReading {
    TrendReading {
        htf_bias: TrendBias::Bullish,
        ltf_bias: TrendBias::Bullish,
        strength: 20.0,
        alignment_count: 2,
    }
}

fn bearish_reading() -> TrendReading {
    TrendReading {
        htf_bias: TrendBias::Bearish,
        ltf_bias: TrendBias::Bearish,
        strength: 20.0,
        alignment_count: 2,
    }
}

fn buy_decision(symbol: &str) -> Decision {
    let signal = TradeSignal::new(SignalKind::TrendEntry, Side::Buy, dec!(100))
        .with_protection(Some(dec!(98)), Some(dec!(104)));
    Decision::observation(symbol, reading(), dec!(1.5)).with_signal(signal)
}

fn wallet(equity: Decimal) -> WalletSnapshot {
    WalletSnapshot {
        total_equity: equity,
        available_balance: equity,
        wallet_balance: equity,
        refreshed_at: Utc::now(),
    }
}

fn position(symbol: &str, side: Side, size: Decimal) -> PositionInfo {
    PositionInfo {
        symbol: symbol.to_string(),
        side,
        size,
        entry_price: dec!(100),
        stop_loss: Some(dec!(98)),
        take_profit: None,
        trailing_stop: None,
        unrealized_pnl: Decimal::ZERO,
        position_idx: PositionIdx::OneWay,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn entry_order(id: &str, symbol: &str, side: Side) -> OrderInfo {
    OrderInfo {
        order_id: id.to_string(),
        order_link_id: None,
        symbol: symbol.to_string(),
        side,
        qty: dec!(1),
        price: Some(dec!(100)),
        trigger_price: None,
        status: OrderStatus::New,
        reduce_only: false,
        order_type: "Limit".to_string(),
        stop_order_type: None,
        created_at: Utc::now(),
    }
}

fn settings() -> Settings {
    Settings::standard(
        vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
        "BTCUSDT",
    )
}

fn coordinator_with(venue: Arc<MockVenue>, settings: Settings) -> Arc<Coordinator> {
    let data: Arc<dyn VenueDataProvider> = venue.clone();
    let orders: Arc<dyn VenueOrderProvider> = venue;
    Arc::new(Coordinator::with_intervals(
        data,
        orders,
        settings,
        CoordinatorIntervals {
            fast: Duration::from_millis(20),
            slow: Duration::from_millis(50),
            protection: Duration::from_millis(500),
            heartbeat: Duration::from_millis(100),
            protection_min_attempt: Duration::from_millis(500),
            enforce_min_action: Duration::from_millis(200),
            feed_stale_after: Duration::from_secs(60),
            feed_restart_min_interval: Duration::from_secs(120),
            closed_pnl_lookback: Duration::from_secs(3600),
        },
    ))
}

async fn seed_wallet(coordinator: &Coordinator, venue: &MockVenue) {
    venue.set_wallet(wallet(dec!(10000)));
    coordinator.slow_tick().await;
}

// ==================== 중복 디스패치 방지 ====================

/// 50ms 간격의 두 신호가 첫 제출이 끝나기 전 도착하면 주문 제출은
/// 정확히 1회, 두 번째는 "intent pending" 로그 한 줄만 남는다.
#[tokio::test]
async fn test_no_duplicate_dispatch_while_pending() {
    let venue = Arc::new(MockVenue::new());
    venue.set_place_delay(Duration::from_millis(300));
    let coordinator = coordinator_with(venue.clone(), settings());
    seed_wallet(&coordinator, &venue).await;

    coordinator.on_decision(buy_decision("BTCUSDT")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // 새 신호 ID로 같은 심볼에 두 번째 신호
    coordinator.on_decision(buy_decision("BTCUSDT")).await;

    // 첫 제출 완료 대기
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(venue.placed_intents().len(), 1);

    let state = coordinator.state();
    let st = state.read().await;
    let pending_logged = st
        .event_entries()
        .iter()
        .any(|e| e.kind == EventKind::Info && e.message == "BTCUSDT intent pending");
    assert!(pending_logged, "두 번째 신호는 intent pending으로 기록되어야 함");
    assert!(st.pending_intents.is_empty(), "제출 완료 후 대기 집합은 비어야 함");
}

/// 같은 신호 ID는 프로세스 수명 동안 한 번만 소비된다.
#[tokio::test]
async fn test_signal_id_consumed_once() {
    let venue = Arc::new(MockVenue::new());
    let coordinator = coordinator_with(venue.clone(), settings());
    seed_wallet(&coordinator, &venue).await;

    let decision = buy_decision("BTCUSDT");
    coordinator.on_decision(decision.clone()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // 동일 신호 ID 재전달 (같은 Decision 재틱)
    coordinator.on_decision(decision).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(venue.placed_intents().len(), 1);
}

// ==================== 용량 불변식 ====================

/// 오픈 포지션 + 대기 인텐트가 최대치에 도달하면 신규 진입이
/// 차단된다.
#[tokio::test]
async fn test_capacity_blocks_new_entry() {
    let venue = Arc::new(MockVenue::new());
    venue.set_positions(vec![position("ETHUSDT", Side::Buy, dec!(1))]);

    let mut s = settings();
    s.max_open_positions = 1;
    let coordinator = coordinator_with(venue.clone(), s);
    seed_wallet(&coordinator, &venue).await;
    coordinator.fast_tick().await;

    coordinator.on_decision(buy_decision("BTCUSDT")).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(venue.placed_intents().is_empty());

    let state = coordinator.state();
    let st = state.read().await;
    let blocked = st
        .event_entries()
        .iter()
        .any(|e| e.kind == EventKind::RiskBlock && e.message.contains("portfolio_capacity"));
    assert!(blocked, "portfolio_capacity 차단 사유가 기록되어야 함");
}

/// 같은 심볼에 이미 포지션이 있으면 재진입이 차단된다.
#[tokio::test]
async fn test_symbol_capacity_blocks_reentry() {
    let venue = Arc::new(MockVenue::new());
    venue.set_positions(vec![position("BTCUSDT", Side::Buy, dec!(1))]);

    let coordinator = coordinator_with(venue.clone(), settings());
    seed_wallet(&coordinator, &venue).await;
    coordinator.fast_tick().await;

    coordinator.on_decision(buy_decision("BTCUSDT")).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(venue.placed_intents().is_empty());
}

// ==================== 편향 정렬 강제 ====================

/// 기준 심볼(BTCUSDT)에 SELL 포지션이 있는 상태에서 반대 방향(BUY)
/// 포지션이 다른 심볼에 있으면, 신규 신호의 승인 여부와 무관하게
/// reduce-only 시장가 청산이 발행된다.
#[tokio::test]
async fn test_bias_alignment_closes_opposite_exposure() {
    let venue = Arc::new(MockVenue::new());
    venue.set_positions(vec![
        position("BTCUSDT", Side::Sell, dec!(1)),
        position("ETHUSDT", Side::Buy, dec!(2)),
    ]);

    let coordinator = coordinator_with(venue.clone(), settings());
    coordinator.fast_tick().await;

    let closed = venue.closed_positions();
    assert_eq!(closed.len(), 1);
    // ETHUSDT 롱 청산 = SELL reduce-only
    assert_eq!(closed[0], ("ETHUSDT".to_string(), Side::Sell, dec!(2)));
}

/// 반대 방향 라이브 진입 주문은 취소된다.
#[tokio::test]
async fn test_bias_alignment_cancels_opposite_order() {
    let venue = Arc::new(MockVenue::new());
    venue.set_positions(vec![position("BTCUSDT", Side::Sell, dec!(1))]);
    venue.set_orders(vec![entry_order("o-7", "ETHUSDT", Side::Buy)]);

    let coordinator = coordinator_with(venue.clone(), settings());
    coordinator.fast_tick().await;

    let cancelled = venue.cancelled_orders();
    assert_eq!(cancelled, vec![("ETHUSDT".to_string(), "o-7".to_string())]);
}

/// 같은 대상에는 최소 간격 안에 반복 발사되지 않는다.
#[tokio::test]
async fn test_bias_enforcement_rate_limited_per_target() {
    let venue = Arc::new(MockVenue::new());
    venue.set_positions(vec![
        position("BTCUSDT", Side::Sell, dec!(1)),
        position("ETHUSDT", Side::Buy, dec!(2)),
    ]);

    let coordinator = coordinator_with(venue.clone(), settings());
    coordinator.fast_tick().await;
    coordinator.fast_tick().await; // 즉시 재폴링

    assert_eq!(venue.closed_positions().len(), 1, "속도 제한으로 1회만 발행");
}

/// 포지션/주문이 없으면 기준 심볼의 추세 판독이 기준 편향이 된다.
#[tokio::test]
async fn test_reference_bias_falls_back_to_trend_reading() {
    let venue = Arc::new(MockVenue::new());
    venue.set_positions(vec![position("ETHUSDT", Side::Buy, dec!(2))]);

    let coordinator = coordinator_with(venue.clone(), settings());

    // 기준 심볼 Decision: 하락 편향 (신호 없음)
    let reference_decision =
        Decision::observation("BTCUSDT", bearish_reading(), dec!(1.5));
    coordinator.on_decision(reference_decision).await;

    coordinator.fast_tick().await;

    let closed = venue.closed_positions();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].0, "ETHUSDT");
}

// ==================== 부분 실패 격리 ====================

/// 포지션 조회 실패 + 주문 조회 성공이면 주문 델타는 계속
/// 방출되고, orders_error는 None, system_error는 포지션 실패에서만
/// 설정된다.
#[tokio::test]
async fn test_partial_fast_loop_failure_isolated() {
    let venue = Arc::new(MockVenue::new());
    venue.set_orders(vec![entry_order("o-1", "BTCUSDT", Side::Buy)]);
    venue.set_fail(FailFlags {
        positions: true,
        ..FailFlags::default()
    });

    let coordinator = coordinator_with(venue.clone(), settings());
    coordinator.fast_tick().await;

    let state = coordinator.state();
    let st = state.read().await;
    assert!(st.positions_error.is_some());
    assert!(st.orders_error.is_none());
    assert!(st.system_error.is_some());
    assert!(!st.fast_healthy);

    // 주문 델타는 방출됨
    let order_event = st
        .event_entries()
        .iter()
        .any(|e| e.message.contains("주문 생성: o-1"));
    assert!(order_event, "주문 조회 성공분의 델타는 방출되어야 함");
}

/// 시스템 에러는 두 루프가 모두 건강해질 때만 해제된다.
#[tokio::test]
async fn test_system_error_requires_both_loops_healthy() {
    let venue = Arc::new(MockVenue::new());
    venue.set_wallet(wallet(dec!(10000)));
    venue.set_fail(FailFlags {
        positions: true,
        ..FailFlags::default()
    });

    let coordinator = coordinator_with(venue.clone(), settings());
    coordinator.fast_tick().await;
    coordinator.slow_tick().await;
    {
        let state = coordinator.state();
        let st = state.read().await;
        assert!(st.system_error.is_some());
    }

    // 실패 해소 후 두 루프 재실행 → 해제
    venue.set_fail(FailFlags::default());
    coordinator.fast_tick().await;
    coordinator.slow_tick().await;
    {
        let state = coordinator.state();
        let st = state.read().await;
        assert!(st.system_error.is_none());
        assert!(st.fast_healthy);
        assert!(st.slow_healthy);
    }
}

// ==================== 디스패치 경로 ====================

/// 정상 승인 경로: 사이징 결과에 따라 인텐트가 제출되고 Entry
/// 이벤트가 기록된다.
#[tokio::test]
async fn test_admitted_signal_dispatches_intent() {
    let venue = Arc::new(MockVenue::new());
    let coordinator = coordinator_with(venue.clone(), settings());
    seed_wallet(&coordinator, &venue).await;

    coordinator.on_decision(buy_decision("BTCUSDT")).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let placed = venue.placed_intents();
    assert_eq!(placed.len(), 1);
    let intent = &placed[0];
    assert_eq!(intent.symbol, "BTCUSDT");
    // equity 10000 × 0.4% = 40, |100-98| = 2 → qty 20, notional 2000
    assert_eq!(intent.qty, dec!(20));
    assert_eq!(intent.notional(), dec!(2000));
    assert_eq!(intent.stop_loss, dec!(98));
    assert!(intent.order_link_id().starts_with("vigil-"));

    let state = coordinator.state();
    let st = state.read().await;
    assert!(st
        .event_entries()
        .iter()
        .any(|e| e.kind == EventKind::Entry));
}

/// 지갑이 전혀 없으면 사이징이 missing_equity로 실패하고 신호는
/// 소비된 채 폐기된다.
#[tokio::test]
async fn test_missing_wallet_aborts_signal() {
    let venue = Arc::new(MockVenue::new());
    let coordinator = coordinator_with(venue.clone(), settings());

    coordinator.on_decision(buy_decision("BTCUSDT")).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(venue.placed_intents().is_empty());

    let state = coordinator.state();
    let st = state.read().await;
    assert!(st
        .event_entries()
        .iter()
        .any(|e| e.kind == EventKind::Error && e.message.contains("missing_equity")));
    assert!(st.pending_intents.is_empty());
}

/// 제출 실패 시 대기 집합이 해제되고 ERROR 이벤트가 남는다.
#[tokio::test]
async fn test_dispatch_failure_releases_pending() {
    let venue = Arc::new(MockVenue::new());
    venue.set_fail(FailFlags {
        place: true,
        ..FailFlags::default()
    });
    let coordinator = coordinator_with(venue.clone(), settings());
    seed_wallet(&coordinator, &venue).await;

    coordinator.on_decision(buy_decision("BTCUSDT")).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let state = coordinator.state();
    let st = state.read().await;
    assert!(st.pending_intents.is_empty(), "실패 후에도 대기 집합 해제");
    assert!(st
        .event_entries()
        .iter()
        .any(|e| e.kind == EventKind::Error && e.message.contains("인텐트 제출 실패")));
}

/// 연습 베뉴에서는 고정 수량 테이블이 사용된다.
#[tokio::test]
async fn test_practice_venue_fixed_qty() {
    let venue = Arc::new(MockVenue::new());
    let mut s = settings();
    s.practice_venue = true;
    s.fixed_qty.insert("BTCUSDT".to_string(), dec!(0.05));
    let coordinator = coordinator_with(venue.clone(), s);

    // 지갑 없이도 고정 수량 사이징은 동작
    coordinator.on_decision(buy_decision("BTCUSDT")).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let placed = venue.placed_intents();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].qty, dec!(0.05));
}

// ==================== 트레일링 보호 동기화 ====================

/// 트레일링 미설정 포지션에 보호 갱신이 전송되고, 재시도 간격
/// 안에서는 반복 전송되지 않는다.
#[tokio::test]
async fn test_trailing_protection_sync_and_rate_limit() {
    let venue = Arc::new(MockVenue::new());
    venue.set_positions(vec![position("BTCUSDT", Side::Buy, dec!(1))]);

    let coordinator = coordinator_with(venue.clone(), settings());
    coordinator.fast_tick().await;

    let calls = venue.protection_calls();
    assert_eq!(calls.len(), 1);
    // risk = 2, standard 프로파일: lock_r 0.8 → 간격 1.6, activation_r 1.0 → 102
    assert_eq!(calls[0].trailing_stop, Some(dec!(1.6)));
    assert_eq!(calls[0].active_price, Some(dec!(102)));

    // 즉시 재폴링해도 추가 호출 없음
    coordinator.fast_tick().await;
    assert_eq!(venue.protection_calls().len(), 1);
}

/// 베뉴가 이미 트레일링 값을 보고하면 재전송하지 않는다.
#[tokio::test]
async fn test_trailing_already_set_is_skipped() {
    let venue = Arc::new(MockVenue::new());
    let mut p = position("BTCUSDT", Side::Buy, dec!(1));
    p.trailing_stop = Some(dec!(1.6));
    venue.set_positions(vec![p]);

    let coordinator = coordinator_with(venue.clone(), settings());
    coordinator.fast_tick().await;

    assert!(venue.protection_calls().is_empty());
}

// ==================== 쿨다운 ====================

/// 손실 청산 후 같은 심볼의 진입이 쿨다운으로 차단된다.
#[tokio::test]
async fn test_cooldown_after_loss_blocks_entry() {
    let venue = Arc::new(MockVenue::new());
    venue.set_wallet(wallet(dec!(10000)));
    venue.push_closed_pnl(vigil_core::ClosedPnlRecord {
        venue_id: "pnl-1".to_string(),
        symbol: "BTCUSDT".to_string(),
        realized_pnl: dec!(-25),
        closed_at: Utc::now(),
    });

    let coordinator = coordinator_with(venue.clone(), settings());
    coordinator.slow_tick().await;

    coordinator.on_decision(buy_decision("BTCUSDT")).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(venue.placed_intents().is_empty());

    let state = coordinator.state();
    let st = state.read().await;
    assert!(st
        .event_entries()
        .iter()
        .any(|e| e.kind == EventKind::RiskBlock && e.message.contains("cooldown_after_loss")));
}

// ==================== 수동 조작 ====================

#[tokio::test]
async fn test_manual_close_position() {
    let venue = Arc::new(MockVenue::new());
    venue.set_positions(vec![position("BTCUSDT", Side::Buy, dec!(0.5))]);

    let coordinator = coordinator_with(venue.clone(), settings());
    coordinator.fast_tick().await;

    let order_id = coordinator.close_position("BTCUSDT").await.unwrap();
    assert!(order_id.starts_with("mock-close-"));

    let closed = venue.closed_positions();
    assert!(closed.contains(&("BTCUSDT".to_string(), Side::Sell, dec!(0.5))));

    // 없는 포지션은 NotFound
    assert!(coordinator.close_position("XRPUSDT").await.is_err());
}

#[tokio::test]
async fn test_manual_cancel_order() {
    let venue = Arc::new(MockVenue::new());
    venue.set_orders(vec![entry_order("o-9", "BTCUSDT", Side::Buy)]);

    let coordinator = coordinator_with(venue.clone(), settings());
    coordinator.fast_tick().await;

    coordinator.cancel_order("BTCUSDT", "o-9").await.unwrap();
    assert_eq!(
        venue.cancelled_orders(),
        vec![("BTCUSDT".to_string(), "o-9".to_string())]
    );
}

// ==================== 피드 정체 감시 ====================

#[tokio::test]
async fn test_stale_feed_triggers_restart_epoch() {
    let venue = Arc::new(MockVenue::new());
    let coordinator = coordinator_with(venue.clone(), settings());

    {
        let state = coordinator.state();
        let mut st = state.write().await;
        st.last_feed_tick = Some(Instant::now() - Duration::from_secs(120));
    }

    assert_eq!(coordinator.feed_epoch(), 0);
    coordinator.heartbeat_tick().await;
    assert_eq!(coordinator.feed_epoch(), 1);

    // 재시작 최소 간격 안에서는 다시 트리거되지 않음
    {
        let state = coordinator.state();
        let mut st = state.write().await;
        st.last_feed_tick = Some(Instant::now() - Duration::from_secs(120));
    }
    coordinator.heartbeat_tick().await;
    assert_eq!(coordinator.feed_epoch(), 1);
}

// ==================== 전체 기동 ====================

/// run()으로 기동된 코디네이터가 채널 피드의 Decision을 소비하여
/// 인텐트를 제출하고, 토큰 취소로 깨끗하게 종료된다.
#[tokio::test]
async fn test_full_run_with_channel_feed() {
    let venue = Arc::new(MockVenue::new());
    venue.set_wallet(wallet(dec!(10000)));

    let coordinator = coordinator_with(venue.clone(), settings());
    let feed = Arc::new(ChannelFeed::new(16));
    let shutdown = CancellationToken::new();

    let run_handle = tokio::spawn(Arc::clone(&coordinator).run(feed.clone(), shutdown.clone()));

    // 구독이 자리잡을 때까지 잠시 대기
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(feed.publish(buy_decision("BTCUSDT")).await);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(venue.placed_intents().len(), 1);

    let status = coordinator.status().await;
    assert!(status.connected);
    assert_eq!(status.venue_name, "MockVenue");
    assert!(status.gate_reports.contains_key("BTCUSDT"));

    shutdown.cancel();
    run_handle.await.unwrap();
}

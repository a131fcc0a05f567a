//! 운영자 설정.
//!
//! 설정 저장소는 외부 협력자이며, 코디네이터는 시작 시 로드된
//! `Settings`를 받아 사용합니다. 적응형 추세 게이트의 임계값들은
//! 소스에서 경험적으로 선택된 값이므로 하드코딩하지 않고
//! 설정으로 노출합니다.

use std::collections::{HashMap, HashSet};

use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::gates::GateId;

/// 리스크 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskMode {
    /// 보수적 (낮은 리스크 비율)
    Conservative,
    /// 표준
    Standard,
    /// 공격적
    Aggressive,
}

impl std::fmt::Display for RiskMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskMode::Conservative => write!(f, "conservative"),
            RiskMode::Standard => write!(f, "standard"),
            RiskMode::Aggressive => write!(f, "aggressive"),
        }
    }
}

/// 추세 게이트 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendGateMode {
    /// 추세 추종: 상위·하위 타임프레임 합의와 모두 일치해야 함
    Follow,
    /// 역추세: 평균 회귀 신호만 상위 편향에 역행 가능
    Reverse,
    /// 적응형: 추세 강도에 따라 Follow/Reverse 전환
    Adaptive,
}

/// 세션 시간 정책.
///
/// 크립토 베뉴는 24시간 운영되지만, 운영자가 특정 시간대
/// (예: 유동성이 얇은 새벽)를 피하도록 거래 창을 제한할 수 있습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHoursPolicy {
    /// 정책 활성화 여부. 비활성화면 항상 통과.
    pub enabled: bool,
    /// 기준 타임존 (IANA 이름, 예: "Asia/Seoul")
    pub timezone: String,
    /// 허용 거래 창 목록 (현지 시간, 시작 <= t < 종료)
    pub windows: Vec<(NaiveTime, NaiveTime)>,
    /// 주말 거래 제외 여부
    pub skip_weekends: bool,
}

impl Default for SessionHoursPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            timezone: "UTC".to_string(),
            windows: Vec::new(),
            skip_weekends: false,
        }
    }
}

/// 리스크 프로파일별 트레일링 스톱 파라미터.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrailingProfile {
    /// 이 프로파일에서 트레일링 활성화 여부
    pub enabled: bool,
    /// 활성화 거리 (리스크 단위 R 배수)
    pub activation_r: f64,
    /// 잠금 거리 (리스크 단위 R 배수)
    pub lock_r: f64,
    /// 되돌림 비율 (선택, 트레일링 간격 축소에 사용)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retracement_rate: Option<f64>,
}

impl Default for TrailingProfile {
    fn default() -> Self {
        Self {
            enabled: true,
            activation_r: 1.0,
            lock_r: 0.8,
            retracement_rate: None,
        }
    }
}

/// 사이징 경계값.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingBounds {
    /// 베뉴 최소 명목 가치
    pub min_notional: Decimal,
    /// 최대 명목 가치
    pub max_notional: Decimal,
    /// 자산 대비 명목 가치 상한 비율 (예: 0.5 = 50%)
    pub equity_cap_pct: Decimal,
}

impl Default for SizingBounds {
    fn default() -> Self {
        Self {
            min_notional: Decimal::from(10),
            max_notional: Decimal::from(5000),
            equity_cap_pct: Decimal::new(5, 1), // 50%
        }
    }
}

/// 소프트 게이트 통과 임계값.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SoftGateThresholds {
    /// 메이저 심볼 통과 점수
    pub major_pass: f64,
    /// 알트 심볼 통과 점수
    pub alt_pass: f64,
    /// 강한 추세에서 추가되는 요구 점수
    pub strong_trend_bonus: f64,
}

impl Default for SoftGateThresholds {
    fn default() -> Self {
        Self {
            major_pass: 60.0,
            alt_pass: 70.0,
            strong_trend_bonus: 10.0,
        }
    }
}

/// 적응형 추세 게이트 임계값.
///
/// 소스에서 경험적으로 선택된 값이며, 최적성이 검증된 것은 아닙니다.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdaptiveTrendConfig {
    /// 강한 추세로 판정하는 방향성 강도 하한
    pub strong_strength: f64,
    /// 강한 추세로 판정하는 다중 타임프레임 정렬 개수 하한
    pub strong_alignment_count: u8,
    /// 역추세 진입을 허용하는 강도 상한 (strong_strength보다 엄격)
    pub reverse_max_strength: f64,
}

impl Default for AdaptiveTrendConfig {
    fn default() -> Self {
        Self {
            strong_strength: 25.0,
            strong_alignment_count: 3,
            reverse_max_strength: 18.0,
        }
    }
}

fn default_max_open_positions() -> usize {
    3
}

fn default_max_open_orders() -> usize {
    5
}

fn default_cooldown_minutes() -> i64 {
    30
}

fn default_feed_staleness_secs() -> i64 {
    90
}

fn default_intent_ttl_secs() -> i64 {
    30
}

fn default_risk_pct() -> HashMap<RiskMode, Decimal> {
    let mut map = HashMap::new();
    map.insert(RiskMode::Conservative, Decimal::new(2, 3)); // 0.2%
    map.insert(RiskMode::Standard, Decimal::new(4, 3)); // 0.4%
    map.insert(RiskMode::Aggressive, Decimal::new(8, 3)); // 0.8%
    map
}

fn default_stop_atr_mult() -> Decimal {
    Decimal::new(15, 1) // 1.5
}

fn default_tp_atr_mult() -> Decimal {
    Decimal::new(20, 1) // 2.0
}

/// 코디네이터 전체 설정.
///
/// 시작 시 한 번 로드되고, 운영자 변경은 외부 저장소를 거쳐
/// 재시작 또는 피드 재구독으로 반영됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// 리스크 모드
    pub risk_mode: RiskMode,
    /// 추세 게이트 모드
    pub trend_gate_mode: TrendGateMode,
    /// 소프트 게이트로 실행을 차단할지 여부
    #[serde(default)]
    pub soft_gate_enabled: bool,
    /// 게이트 오버라이드 맵. true = 해당 게이트 비활성화.
    ///
    /// 진단 표시와 실제 승인 판정에 동일하게 적용됩니다.
    #[serde(default)]
    pub gate_overrides: HashMap<GateId, bool>,
    /// 최대 동시 오픈 포지션 수 (대기 인텐트 포함)
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
    /// 최대 동시 오픈 주문 수 (대기 인텐트 포함)
    #[serde(default = "default_max_open_orders")]
    pub max_open_orders: usize,
    /// 거래 대상 심볼 목록
    pub symbols: Vec<String>,
    /// 편향 정렬의 기준 심볼
    pub reference_symbol: String,
    /// 세션 시간 정책
    #[serde(default)]
    pub session_hours: SessionHoursPolicy,
    /// 리스크 모드별 트레일링 프로파일
    #[serde(default)]
    pub trailing_profiles: HashMap<RiskMode, TrailingProfile>,
    /// 심볼별 트레일링 오버라이드
    #[serde(default)]
    pub trailing_overrides: HashMap<String, TrailingProfile>,
    /// 트레일링 제외 심볼
    #[serde(default)]
    pub trailing_excluded: HashSet<String>,
    /// 손실 후 쿨다운 (분)
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,
    /// 피드 신선도 게이트 한계 (초)
    #[serde(default = "default_feed_staleness_secs")]
    pub feed_staleness_secs: i64,
    /// 연습(테스트넷) 베뉴 여부. true면 고정 수량 사이징 사용.
    #[serde(default)]
    pub practice_venue: bool,
    /// 사이징 경계값
    #[serde(default)]
    pub sizing: SizingBounds,
    /// 리스크 모드별 리스크 비율
    #[serde(default = "default_risk_pct")]
    pub risk_pct: HashMap<RiskMode, Decimal>,
    /// 적응형 추세 게이트 임계값
    #[serde(default)]
    pub adaptive_trend: AdaptiveTrendConfig,
    /// 연습 베뉴용 심볼별 고정 수량
    #[serde(default)]
    pub fixed_qty: HashMap<String, Decimal>,
    /// 메이저 심볼 집합 (소프트 게이트 임계값 차등)
    #[serde(default)]
    pub major_symbols: HashSet<String>,
    /// 소프트 게이트 통과 임계값
    #[serde(default)]
    pub soft_thresholds: SoftGateThresholds,
    /// 인텐트 TTL (초)
    #[serde(default = "default_intent_ttl_secs")]
    pub intent_ttl_secs: i64,
    /// 손절 합성용 ATR 배수
    #[serde(default = "default_stop_atr_mult")]
    pub stop_atr_mult: Decimal,
    /// 목표가 합성용 ATR 배수
    #[serde(default = "default_tp_atr_mult")]
    pub tp_atr_mult: Decimal,
    /// 손절 없는 신호에 보호 가격을 합성할지 여부
    #[serde(default)]
    pub synthesize_protection: bool,
}

impl Settings {
    /// 현재 리스크 모드의 리스크 비율.
    pub fn risk_percent(&self) -> Option<Decimal> {
        self.risk_pct.get(&self.risk_mode).copied()
    }

    /// 현재 리스크 모드의 트레일링 프로파일.
    pub fn trailing_profile(&self) -> Option<TrailingProfile> {
        self.trailing_profiles.get(&self.risk_mode).copied()
    }

    /// 심볼에 적용할 트레일링 프로파일.
    ///
    /// 심볼 오버라이드가 있으면 우선하고, 없으면 현재 리스크
    /// 모드의 프로파일을 사용합니다.
    pub fn trailing_for(&self, symbol: &str) -> Option<TrailingProfile> {
        if self.trailing_excluded.contains(symbol) {
            return None;
        }
        if let Some(profile) = self.trailing_overrides.get(symbol) {
            return Some(*profile);
        }
        self.trailing_profile()
    }

    /// 게이트가 오버라이드로 비활성화되었는지 확인.
    pub fn gate_disabled(&self, id: GateId) -> bool {
        self.gate_overrides.get(&id).copied().unwrap_or(false)
    }

    /// 메이저 심볼 여부.
    pub fn is_major(&self, symbol: &str) -> bool {
        self.major_symbols.contains(symbol)
    }

    /// 테스트/기본 구성 생성.
    pub fn standard(symbols: Vec<String>, reference_symbol: impl Into<String>) -> Self {
        let mut trailing_profiles = HashMap::new();
        trailing_profiles.insert(RiskMode::Conservative, TrailingProfile {
            enabled: false,
            ..TrailingProfile::default()
        });
        trailing_profiles.insert(RiskMode::Standard, TrailingProfile::default());
        trailing_profiles.insert(RiskMode::Aggressive, TrailingProfile {
            enabled: true,
            activation_r: 0.8,
            lock_r: 0.6,
            retracement_rate: Some(0.3),
        });

        Self {
            risk_mode: RiskMode::Standard,
            trend_gate_mode: TrendGateMode::Follow,
            soft_gate_enabled: false,
            gate_overrides: HashMap::new(),
            max_open_positions: default_max_open_positions(),
            max_open_orders: default_max_open_orders(),
            symbols,
            reference_symbol: reference_symbol.into(),
            session_hours: SessionHoursPolicy::default(),
            trailing_profiles,
            trailing_overrides: HashMap::new(),
            trailing_excluded: HashSet::new(),
            cooldown_minutes: default_cooldown_minutes(),
            feed_staleness_secs: default_feed_staleness_secs(),
            practice_venue: false,
            sizing: SizingBounds::default(),
            risk_pct: default_risk_pct(),
            adaptive_trend: AdaptiveTrendConfig::default(),
            fixed_qty: HashMap::new(),
            major_symbols: HashSet::new(),
            soft_thresholds: SoftGateThresholds::default(),
            intent_ttl_secs: default_intent_ttl_secs(),
            stop_atr_mult: default_stop_atr_mult(),
            tp_atr_mult: default_tp_atr_mult(),
            synthesize_protection: true,
        }
    }
}

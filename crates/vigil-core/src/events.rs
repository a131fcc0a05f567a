//! 운영자 이벤트 로그.
//!
//! 게이트 엔진이나 인텐트 디스패처에 도달한 모든 것은 정확히
//! 한 건의 구조화된 이벤트를 남깁니다. 로그는 최신순으로 캡이
//! 적용되고, 같은 (종류, 메시지) 쌍은 시간 창 내에서 중복
//! 억제됩니다.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 이벤트 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// 일반 정보
    Info,
    /// 진입 실행
    Entry,
    /// 청산 실행
    Exit,
    /// 게이트 차단 (정상 제어 흐름)
    RiskBlock,
    /// 오류
    Error,
    /// 시스템 (하트비트, 피드 재시작 등)
    System,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Info => write!(f, "INFO"),
            EventKind::Entry => write!(f, "ENTRY"),
            EventKind::Exit => write!(f, "EXIT"),
            EventKind::RiskBlock => write!(f, "RISK_BLOCK"),
            EventKind::Error => write!(f, "ERROR"),
            EventKind::System => write!(f, "SYSTEM"),
        }
    }
}

/// 단일 이벤트.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// 이벤트 종류
    pub kind: EventKind,
    /// 관련 심볼 (없으면 빈 문자열)
    pub symbol: String,
    /// 메시지
    pub message: String,
    /// 발생 시각
    pub at: DateTime<Utc>,
}

/// 최신순 캡 제한 이벤트 로그.
///
/// 같은 (종류, 심볼, 메시지) 키는 `dedup_window` 내에서 한 번만
/// 기록됩니다. 매 틱 반복되는 동일 차단 사유로 로그가 넘치는 것을
/// 막기 위한 것입니다.
#[derive(Debug)]
pub struct EventLog {
    events: Vec<LogEvent>,
    capacity: usize,
    dedup_window: Duration,
    last_seen: HashMap<String, DateTime<Utc>>,
}

impl EventLog {
    /// 지정한 용량과 중복 억제 창으로 생성.
    pub fn new(capacity: usize, dedup_window_secs: i64) -> Self {
        Self {
            events: Vec::with_capacity(capacity.min(256)),
            capacity: capacity.max(1),
            dedup_window: Duration::seconds(dedup_window_secs),
            last_seen: HashMap::new(),
        }
    }

    /// 이벤트 기록. 중복 억제되면 false.
    pub fn push(&mut self, kind: EventKind, symbol: impl Into<String>, message: impl Into<String>) -> bool {
        let symbol = symbol.into();
        let message = message.into();
        let now = Utc::now();
        let key = format!("{}|{}|{}", kind, symbol, message);

        if let Some(last) = self.last_seen.get(&key) {
            if now - *last < self.dedup_window {
                return false;
            }
        }
        self.last_seen.insert(key, now);

        // 중복 억제 키 맵도 주기적으로 정리
        if self.last_seen.len() > self.capacity * 4 {
            let window = self.dedup_window;
            self.last_seen.retain(|_, at| now - *at < window);
        }

        self.events.insert(
            0,
            LogEvent {
                kind,
                symbol,
                message,
                at: now,
            },
        );
        self.events.truncate(self.capacity);
        true
    }

    /// 최신순 이벤트 목록.
    pub fn entries(&self) -> &[LogEvent] {
        &self.events
    }

    /// 현재 이벤트 수.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// 비어 있는지 확인.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

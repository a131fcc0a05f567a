//! 주문 인텐트.
//!
//! 게이트를 통과한 신호 하나당 정확히 한 번 생성되는,
//! 고유 ID와 TTL을 가진 멱등 주문 요청입니다. 베뉴로 전송된 뒤에는
//! 로컬에서 폐기되며, 결과로 생성된 Order가 지속 레코드가 됩니다.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::market::{EntryKind, Side};

/// 기본 인텐트 TTL (초).
const DEFAULT_TTL_SECS: i64 = 30;

/// 멱등 주문 인텐트.
///
/// 생성 후 수정하지 않는 write-once 타입입니다.
/// `order_link_id()`가 베뉴의 클라이언트 주문 ID로 사용되어
/// 베뉴 주문 목록과 로컬 인텐트를 연결합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIntent {
    /// 전역 고유 ID
    pub id: Uuid,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 리스크 프로파일 라벨 (예: "standard", "aggressive")
    pub profile: String,
    /// 심볼
    pub symbol: String,
    /// 방향
    pub side: Side,
    /// 진입 주문 유형
    pub entry_kind: EntryKind,
    /// 진입가 (시장가 주문에도 참조용으로 유지)
    pub entry: Decimal,
    /// 손절가
    pub stop_loss: Decimal,
    /// 목표가 (선택)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    /// 조건부 주문 트리거 가격 (선택)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_price: Option<Decimal>,
    /// 주문 수량
    pub qty: Decimal,
    /// 만료 시각
    pub expires_at: DateTime<Utc>,
    /// 태그 (진단/추적용)
    #[serde(default)]
    pub tags: Vec<String>,
}

impl OrderIntent {
    /// 새 인텐트 생성. 기본 TTL이 적용됩니다.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        profile: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        entry_kind: EntryKind,
        entry: Decimal,
        stop_loss: Decimal,
        take_profit: Option<Decimal>,
        qty: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            profile: profile.into(),
            symbol: symbol.into(),
            side,
            entry_kind,
            entry,
            stop_loss,
            take_profit,
            trigger_price: None,
            qty,
            expires_at: now + Duration::seconds(DEFAULT_TTL_SECS),
            tags: Vec::new(),
        }
    }

    /// TTL을 설정합니다.
    pub fn with_ttl_secs(mut self, secs: i64) -> Self {
        self.expires_at = self.created_at + Duration::seconds(secs);
        self
    }

    /// 트리거 가격을 설정합니다.
    pub fn with_trigger(mut self, trigger_price: Decimal) -> Self {
        self.trigger_price = Some(trigger_price);
        self
    }

    /// 태그를 추가합니다.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// 베뉴 클라이언트 주문 ID.
    pub fn order_link_id(&self) -> String {
        format!("vigil-{}", self.id.simple())
    }

    /// 만료 여부 확인.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// 명목 가치 (수량 × 진입가).
    pub fn notional(&self) -> Decimal {
        self.qty * self.entry
    }
}

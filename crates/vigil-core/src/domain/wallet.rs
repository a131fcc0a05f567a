//! 지갑 스냅샷과 청산 손익 레코드.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 지갑 잔고 스냅샷.
///
/// 느린 폴링 주기(10초)에만 갱신되며 최종 일관성으로 취급됩니다.
/// 완전히 없는 경우가 아니면 빠른 경로의 사이징을 막지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSnapshot {
    /// 총 자산 (equity)
    pub total_equity: Decimal,
    /// 사용 가능 잔고
    pub available_balance: Decimal,
    /// 총 지갑 잔고
    pub wallet_balance: Decimal,
    /// 갱신 시각
    pub refreshed_at: DateTime<Utc>,
}

impl WalletSnapshot {
    /// 사이징에 사용할 수 있는 자산 수치 반환.
    ///
    /// 총 자산이 0 이하이면 사용 불가로 간주합니다.
    pub fn usable_equity(&self) -> Option<Decimal> {
        if self.total_equity > Decimal::ZERO {
            Some(self.total_equity)
        } else {
            None
        }
    }
}

/// 청산 손익 레코드.
///
/// 손실 후 쿨다운과 일일 손익 집계에 사용됩니다.
/// 베뉴 ID 기준으로 크기 제한 집합에서 중복 제거됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedPnlRecord {
    /// 베뉴 레코드 ID (중복 제거 키)
    pub venue_id: String,
    /// 심볼
    pub symbol: String,
    /// 실현 손익
    pub realized_pnl: Decimal,
    /// 청산 시각
    pub closed_at: DateTime<Utc>,
}

impl ClosedPnlRecord {
    /// 손실 레코드인지 확인.
    pub fn is_loss(&self) -> bool {
        self.realized_pnl < Decimal::ZERO
    }
}

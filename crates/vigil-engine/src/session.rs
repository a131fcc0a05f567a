//! 세션 시간 정책.
//!
//! 운영자가 지정한 타임존 기준 거래 창 안에 있는지 판정합니다.
//! 정책이 비활성화되어 있으면 항상 통과합니다.

use chrono::{DateTime, Datelike, Utc, Weekday};
use chrono_tz::Tz;

use vigil_core::SessionHoursPolicy;

/// 세션 판정 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionVerdict {
    /// 거래 가능 여부
    pub allowed: bool,
    /// 운영자용 상세
    pub detail: String,
}

/// 주말 여부 확인.
fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

/// 현재 시각이 허용 세션 안인지 판정.
pub fn within_session(policy: &SessionHoursPolicy, now: DateTime<Utc>) -> SessionVerdict {
    if !policy.enabled {
        return SessionVerdict {
            allowed: true,
            detail: "세션 정책 비활성".to_string(),
        };
    }

    // 타임존 파싱 실패는 정책 구성 오류이므로 차단하지 않고 통과
    let tz: Tz = match policy.timezone.parse() {
        Ok(tz) => tz,
        Err(_) => {
            return SessionVerdict {
                allowed: true,
                detail: format!("알 수 없는 타임존 '{}', 정책 무시", policy.timezone),
            };
        }
    };

    let local = now.with_timezone(&tz);

    if policy.skip_weekends && is_weekend(local.weekday()) {
        return SessionVerdict {
            allowed: false,
            detail: format!("주말 제외 ({})", local.weekday()),
        };
    }

    if policy.windows.is_empty() {
        return SessionVerdict {
            allowed: true,
            detail: "거래 창 제한 없음".to_string(),
        };
    }

    let time = local.time();
    for (open, close) in &policy.windows {
        let inside = if open <= close {
            time >= *open && time < *close
        } else {
            // 자정을 넘는 창 (예: 22:00 ~ 02:00)
            time >= *open || time < *close
        };
        if inside {
            return SessionVerdict {
                allowed: true,
                detail: format!("세션 내 ({} ~ {})", open, close),
            };
        }
    }

    SessionVerdict {
        allowed: false,
        detail: format!("세션 외 시간 (현지 {})", time.format("%H:%M:%S")),
    }
}

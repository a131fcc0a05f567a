//! 베뉴 에러 타입.

use thiserror::Error;

/// 베뉴 호출 에러.
///
/// 폴링 루프는 이 에러를 잡아 롤링 에러 목록에 기록할 뿐,
/// 절대 패닉하거나 루프를 중단하지 않습니다. 동기 재시도도 하지
/// 않습니다 - 다음 예정된 틱이 곧 재시도입니다.
#[derive(Debug, Error)]
pub enum VenueError {
    /// 네트워크 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 인증 실패
    #[error("인증 실패: {0}")]
    Auth(String),

    /// 베뉴 API 에러 (retCode != 0)
    #[error("베뉴 API 에러 [{code}]: {message}")]
    Api { code: i64, message: String },

    /// 요청 한도 초과
    #[error("요청 한도 초과")]
    RateLimited,

    /// 응답 파싱 실패
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// 지원하지 않는 기능
    #[error("지원하지 않는 기능: {0}")]
    Unsupported(String),
}

impl VenueError {
    /// 인증/권한 문제인지 확인.
    ///
    /// 연결 상태 플래그 표시에 사용됩니다.
    pub fn is_auth(&self) -> bool {
        matches!(self, VenueError::Auth(_))
    }
}

impl From<reqwest::Error> for VenueError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            VenueError::Network(e.to_string())
        } else if e.is_decode() {
            VenueError::Parse(e.to_string())
        } else {
            VenueError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_auth() {
        assert!(VenueError::Auth("bad key".to_string()).is_auth());
        assert!(!VenueError::RateLimited.is_auth());
    }

    #[test]
    fn test_api_error_display() {
        let err = VenueError::Api {
            code: 10004,
            message: "invalid sign".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("10004"));
        assert!(text.contains("invalid sign"));
    }
}

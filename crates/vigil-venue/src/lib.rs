//! 베뉴 클라이언트.
//!
//! 파생상품 베뉴의 REST 엔드포인트를 타입화된 요청/응답으로
//! 감싸는 크레이트입니다:
//!
//! - `provider` - 베뉴 중립 조회/주문 trait과 구현체
//! - `connector` - 베뉴별 서명 REST 클라이언트
//!
//! 모든 베뉴 응답 수치는 커넥터 경계에서 `Decimal`로 파싱되며,
//! 파싱 불가능한 행은 경고 로그와 함께 조용히 제외됩니다.
//! 상위 레이어는 잘 형성된 값만 받습니다.

pub mod connector;
pub mod error;
pub mod provider;

pub use error::VenueError;
pub use provider::{
    BybitVenue, FailFlags, MockVenue, ProtectionUpdate, ReconcileReport, VenueDataProvider,
    VenueOrderProvider,
};

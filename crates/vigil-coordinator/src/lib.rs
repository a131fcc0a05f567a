//! Gate-and-Dispatch 코디네이터.
//!
//! 이중 주기 정합성 루프, 승인 게이트 평가, 인텐트 디스패치,
//! 트레일링 보호 동기화, 편향 정렬 강제를 하나의 인스턴스로
//! 묶습니다. 모든 가변 상태는 코디네이터 인스턴스가 소유하며
//! (프로세스 전역 없음), 명시적 생성/종료 수명주기를 가지므로
//! 한 프로세스에서 계좌별로 여러 인스턴스를 돌릴 수 있습니다.
//!
//! # 태스크 구조
//!
//! ```text
//! Coordinator::run
//! ├── fast loop (1s)      포지션/주문/체결 → 차이 계산 → 보호 동기화 → 편향 강제
//! ├── slow loop (10s)     지갑/청산 손익/정합성 리포트
//! ├── protection (180s)   트레일링 재검증 (베뉴 값 없을 때만 재전송)
//! ├── heartbeat (30s)     SCAN/MANAGE 요약 + 피드 정체 감시
//! └── feed consumer       Decision 채널 단일 소비자 → 게이트 → 디스패치
//! ```

pub mod coordinator;
pub mod diagnostics;
pub mod dispatch;
pub mod enforcer;
pub mod feed;
pub mod protection;
pub mod state;

pub use coordinator::{Coordinator, CoordinatorError, CoordinatorIntervals};
pub use diagnostics::StatusSnapshot;
pub use feed::{ChannelFeed, DecisionFeed};
pub use state::CoordinatorState;

//! 베뉴별 REST 커넥터.

pub mod bybit;

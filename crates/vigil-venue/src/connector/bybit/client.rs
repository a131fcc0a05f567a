//! Bybit V5 계열 서명 REST 클라이언트.
//!
//! # 서명 방식
//!
//! `HMAC_SHA256(timestamp + api_key + recv_window + payload)`를
//! 16진수 소문자로 인코딩하여 `X-BAPI-SIGN` 헤더로 전달합니다.
//! GET은 쿼리 문자열, POST는 JSON 본문이 payload입니다.
//!
//! # 지연 측정
//!
//! 모든 호출의 왕복 시간을 기록하여 진단 표면에 노출합니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::error::VenueError;

use super::types::{
    ClosedPnlRow, Envelope, ExecutionRow, ListResult, OrderRow, PositionRow, WalletRow,
};

type HmacSha256 = Hmac<Sha256>;

const MAINNET_URL: &str = "https://api.bybit.com";
const TESTNET_URL: &str = "https://api-testnet.bybit.com";

/// 클라이언트 설정.
pub struct BybitConfig {
    /// API 키
    pub api_key: String,
    /// API 시크릿
    pub api_secret: SecretString,
    /// 테스트넷(연습 베뉴) 여부
    pub testnet: bool,
    /// 요청 유효 창 (밀리초)
    pub recv_window_ms: u64,
}

impl std::fmt::Debug for BybitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BybitConfig")
            .field("api_key", &"***")
            .field("api_secret", &"***")
            .field("testnet", &self.testnet)
            .finish()
    }
}

impl BybitConfig {
    /// 새 설정 생성.
    pub fn new(api_key: String, api_secret: SecretString, testnet: bool) -> Self {
        Self {
            api_key,
            api_secret,
            testnet,
            recv_window_ms: 5000,
        }
    }
}

/// 주문 생성 응답.
#[derive(Debug, serde::Deserialize)]
pub struct OrderCreateResult {
    #[serde(rename = "orderId")]
    pub order_id: String,
    #[serde(rename = "orderLinkId", default)]
    pub order_link_id: String,
}

/// Bybit REST 클라이언트.
pub struct BybitClient {
    http: Client,
    config: BybitConfig,
    base_url: String,
    /// 마지막 호출 왕복 시간 (마이크로초, 0 = 미측정)
    last_latency_us: AtomicU64,
}

impl BybitClient {
    /// 새 클라이언트 생성.
    pub fn new(config: BybitConfig) -> Self {
        let base_url = if config.testnet {
            TESTNET_URL.to_string()
        } else {
            MAINNET_URL.to_string()
        };
        Self {
            http: Client::new(),
            config,
            base_url,
            last_latency_us: AtomicU64::new(0),
        }
    }

    /// 기본 URL 교체 (테스트용).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 마지막 호출 왕복 지연.
    pub fn last_latency(&self) -> Option<Duration> {
        let us = self.last_latency_us.load(Ordering::Relaxed);
        if us == 0 {
            None
        } else {
            Some(Duration::from_micros(us))
        }
    }

    /// 테스트넷 여부.
    pub fn is_testnet(&self) -> bool {
        self.config.testnet
    }

    // ==================== 서명 ====================

    fn sign(&self, timestamp_ms: i64, payload: &str) -> Result<String, VenueError> {
        let message = format!(
            "{}{}{}{}",
            timestamp_ms, self.config.api_key, self.config.recv_window_ms, payload
        );
        let mut mac = HmacSha256::new_from_slice(self.config.api_secret.expose_secret().as_bytes())
            .map_err(|e| VenueError::Auth(format!("HMAC 키 초기화 실패: {}", e)))?;
        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    // ==================== 공통 요청 ====================

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, VenueError> {
        let query_string = query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        let signature = self.sign(timestamp_ms, &query_string)?;

        let url = if query_string.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query_string)
        };

        let started = Instant::now();
        let response = self
            .http
            .get(&url)
            .header("X-BAPI-API-KEY", &self.config.api_key)
            .header("X-BAPI-TIMESTAMP", timestamp_ms.to_string())
            .header("X-BAPI-RECV-WINDOW", self.config.recv_window_ms.to_string())
            .header("X-BAPI-SIGN", signature)
            .send()
            .await?;
        self.record_latency(started);

        self.decode(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, VenueError> {
        let payload =
            serde_json::to_string(body).map_err(|e| VenueError::Parse(e.to_string()))?;
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        let signature = self.sign(timestamp_ms, &payload)?;

        let url = format!("{}{}", self.base_url, path);

        let started = Instant::now();
        let response = self
            .http
            .post(&url)
            .header("X-BAPI-API-KEY", &self.config.api_key)
            .header("X-BAPI-TIMESTAMP", timestamp_ms.to_string())
            .header("X-BAPI-RECV-WINDOW", self.config.recv_window_ms.to_string())
            .header("X-BAPI-SIGN", signature)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await?;
        self.record_latency(started);

        self.decode(response).await
    }

    fn record_latency(&self, started: Instant) {
        let elapsed = started.elapsed().as_micros().min(u64::MAX as u128) as u64;
        self.last_latency_us.store(elapsed.max(1), Ordering::Relaxed);
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, VenueError> {
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(VenueError::Auth(format!("HTTP {}", status)));
        }
        if status.as_u16() == 429 {
            return Err(VenueError::RateLimited);
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| VenueError::Parse(e.to_string()))?;

        match envelope.ret_code {
            0 => envelope
                .result
                .ok_or_else(|| VenueError::Parse("result 필드 없음".to_string())),
            10003 | 10004 | 10005 | 33004 => Err(VenueError::Auth(envelope.ret_msg)),
            10006 | 10018 => Err(VenueError::RateLimited),
            code => Err(VenueError::Api {
                code,
                message: envelope.ret_msg,
            }),
        }
    }

    // ==================== 조회 ====================

    /// 오픈 포지션 목록.
    pub async fn get_positions(&self) -> Result<Vec<PositionRow>, VenueError> {
        let result: ListResult<PositionRow> = self
            .get(
                "/v5/position/list",
                &[
                    ("category", "linear".to_string()),
                    ("settleCoin", "USDT".to_string()),
                ],
            )
            .await?;
        debug!(count = result.list.len(), "포지션 조회 완료");
        Ok(result.list)
    }

    /// 오픈 주문 목록.
    pub async fn get_open_orders(&self) -> Result<Vec<OrderRow>, VenueError> {
        let result: ListResult<OrderRow> = self
            .get(
                "/v5/order/realtime",
                &[
                    ("category", "linear".to_string()),
                    ("settleCoin", "USDT".to_string()),
                ],
            )
            .await?;
        Ok(result.list)
    }

    /// 최근 체결 목록.
    pub async fn get_executions(&self, limit: u32) -> Result<Vec<ExecutionRow>, VenueError> {
        let result: ListResult<ExecutionRow> = self
            .get(
                "/v5/execution/list",
                &[
                    ("category", "linear".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(result.list)
    }

    /// 지갑 잔고.
    pub async fn get_wallet(&self) -> Result<Vec<WalletRow>, VenueError> {
        let result: ListResult<WalletRow> = self
            .get(
                "/v5/account/wallet-balance",
                &[("accountType", "UNIFIED".to_string())],
            )
            .await?;
        Ok(result.list)
    }

    /// 청산 손익 (시작 시각 이후).
    pub async fn get_closed_pnl(&self, start_ms: i64) -> Result<Vec<ClosedPnlRow>, VenueError> {
        let result: ListResult<ClosedPnlRow> = self
            .get(
                "/v5/position/closed-pnl",
                &[
                    ("category", "linear".to_string()),
                    ("startTime", start_ms.to_string()),
                    ("limit", "100".to_string()),
                ],
            )
            .await?;
        Ok(result.list)
    }

    // ==================== 주문 ====================

    /// 주문 생성.
    pub async fn create_order(
        &self,
        body: serde_json::Value,
    ) -> Result<OrderCreateResult, VenueError> {
        self.post("/v5/order/create", &body).await
    }

    /// 주문 취소.
    pub async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), VenueError> {
        let body = serde_json::json!({
            "category": "linear",
            "symbol": symbol,
            "orderId": order_id,
        });
        let _: serde_json::Value = self.post("/v5/order/cancel", &body).await?;
        Ok(())
    }

    /// 포지션 보호 설정 (손절/목표/트레일링).
    pub async fn set_trading_stop(&self, body: serde_json::Value) -> Result<(), VenueError> {
        match self.post::<serde_json::Value>("/v5/position/trading-stop", &body).await {
            Ok(_) => Ok(()),
            // "not modified"는 이미 원하는 값이 설정된 상태이므로 성공으로 취급
            Err(VenueError::Api { code: 34040, .. }) => {
                warn!("보호 설정이 이미 동일한 값입니다");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

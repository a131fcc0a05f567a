//! Vigil 실행 코디네이터 데몬.
//!
//! 설정 파일과 환경변수에서 구성을 읽어 코디네이터를 기동합니다.
//! 전략 피드는 외부 지표 엔진이 표준 입력으로 전달하는
//! NDJSON Decision 스트림입니다 (한 줄에 한 레코드).
//!
//! ```text
//! indicator-engine | vigil run --config vigil.toml
//! ```

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vigil_coordinator::{ChannelFeed, Coordinator};
use vigil_core::{Decision, Settings};
use vigil_venue::connector::bybit::{BybitClient, BybitConfig};
use vigil_venue::{BybitVenue, VenueDataProvider, VenueOrderProvider};

#[derive(Parser)]
#[command(name = "vigil", about = "마진 계좌 자율 실행 코디네이터", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 코디네이터 기동
    Run {
        /// 설정 파일 경로
        #[arg(long, default_value = "vigil.toml")]
        config: String,
    },
    /// 설정 파일 검증만 수행
    CheckConfig {
        /// 설정 파일 경로
        #[arg(long, default_value = "vigil.toml")]
        config: String,
    },
}

/// 파일 + 환경변수 레이어 구성.
#[derive(Debug, Deserialize)]
struct AppConfig {
    /// 코디네이터 설정
    settings: Settings,
}

fn load_config(path: &str) -> anyhow::Result<AppConfig> {
    let config = config::Config::builder()
        .add_source(config::File::with_name(path))
        // VIGIL__SETTINGS__RISK_MODE=aggressive 형태의 환경변수 오버라이드
        .add_source(config::Environment::with_prefix("VIGIL").separator("__"))
        .build()
        .context("설정 로드 실패")?;

    config
        .try_deserialize::<AppConfig>()
        .context("설정 역직렬화 실패")
}

/// 환경변수에서 베뉴 자격 증명 로드.
fn venue_credentials(testnet: bool) -> anyhow::Result<BybitConfig> {
    let api_key = std::env::var("BYBIT_API_KEY").context("BYBIT_API_KEY 환경변수 없음")?;
    let api_secret =
        std::env::var("BYBIT_API_SECRET").context("BYBIT_API_SECRET 환경변수 없음")?;
    Ok(BybitConfig::new(
        api_key,
        SecretString::from(api_secret),
        testnet,
    ))
}

/// 표준 입력 NDJSON을 Decision 피드로 변환.
///
/// 파싱 실패 라인은 경고 로그 후 무시합니다 (피드 어댑터 경계의
/// 데이터 품질 정책과 동일).
async fn pump_stdin_feed(feed: Arc<ChannelFeed>, shutdown: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Decision>(&line) {
                        Ok(decision) => {
                            feed.publish(decision).await;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Decision 파싱 실패, 라인 무시");
                        }
                    }
                }
                Ok(None) => {
                    tracing::info!("표준 입력 종료, 피드 중단");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "표준 입력 읽기 실패");
                    break;
                }
            }
        }
    }
}

async fn run(config_path: &str) -> anyhow::Result<()> {
    let app_config = load_config(config_path)?;
    let settings = app_config.settings;

    tracing::info!(
        symbols = ?settings.symbols,
        reference = %settings.reference_symbol,
        risk_mode = %settings.risk_mode,
        practice = settings.practice_venue,
        "설정 로드 완료"
    );

    let credentials = venue_credentials(settings.practice_venue)?;
    let client = Arc::new(BybitClient::new(credentials));
    let venue = Arc::new(BybitVenue::new(client));

    let data: Arc<dyn VenueDataProvider> = venue.clone();
    let orders: Arc<dyn VenueOrderProvider> = venue;
    let coordinator = Arc::new(Coordinator::new(data, orders, settings));

    let feed = Arc::new(ChannelFeed::new(256));
    let shutdown = CancellationToken::new();

    let feed_pump = tokio::spawn(pump_stdin_feed(feed.clone(), shutdown.clone()));
    let run_handle = tokio::spawn(Arc::clone(&coordinator).run(feed, shutdown.clone()));

    tokio::signal::ctrl_c().await.ok();
    tracing::info!("종료 신호 수신, 코디네이터 종료 중...");
    shutdown.cancel();

    let _ = tokio::join!(run_handle, feed_pump);

    let status = coordinator.status().await;
    tracing::info!(
        positions = status.portfolio.open_positions,
        orders = status.portfolio.open_orders,
        daily_pnl = %status.portfolio.daily_pnl,
        "종료 시점 상태"
    );

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("info,vigil_coordinator=debug")
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => run(&config).await,
        Commands::CheckConfig { config } => {
            let app_config = load_config(&config)?;
            println!("설정 유효함:");
            println!("  심볼: {:?}", app_config.settings.symbols);
            println!("  기준 심볼: {}", app_config.settings.reference_symbol);
            println!("  리스크 모드: {}", app_config.settings.risk_mode);
            println!("  추세 게이트: {:?}", app_config.settings.trend_gate_mode);
            println!(
                "  용량: 포지션 {} / 주문 {}",
                app_config.settings.max_open_positions, app_config.settings.max_open_orders
            );
            println!("  연습 베뉴: {}", app_config.settings.practice_venue);
            Ok(())
        }
    }
}

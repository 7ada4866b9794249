//! 알림 파이프라인 워크플로우 러너 CLI.
//!
//! 종료 코드: 0 성공, 2 일치 메시지 없음, 3 브로커 접근 불가,
//! 4 스토어 에러, 5 메일 발송 에러, 1 그 외 실패.

mod scheduler;
mod workflow;

use alert_broker::{PriceFetcher, TcpGateway};
use alert_core::{
    holidays_for_year, init_logging, AppConfig, Category, CoreError, CoreResult, JobKind,
    MarketCalendar, RunMode, TradingSession,
};
use alert_data::{SessionRunRepository, StockStore};
use alert_extract::{Extractor, GmailSource, MistralOcr};
use alert_notify::{MailSender, SmtpSender};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use workflow::Workflow;

#[derive(Parser)]
#[command(name = "alert-runner")]
#[command(about = "Newsletter-driven trade alert workflow runner", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 뉴스레터 추출 실행
    Extract {
        /// 특정 카테고리만 (쉼표로 구분, 예: "daily,digitalassets")
        #[arg(long)]
        categories: Option<String>,

        /// 조회 기간 (시간, 기본: 설정값 72)
        #[arg(long)]
        hours: Option<i64>,

        /// 검증 모드: 비교 리포트만, 스토어 변경 없음
        #[arg(long)]
        validate: bool,
    },

    /// 가격 조회 및 스토어 갱신만 실행
    Prices {
        /// 세션 (AM/PM, 생략 시 현재 시각으로 판별)
        #[arg(long)]
        session: Option<String>,
    },

    /// 알림 평가 및 발송만 실행 (가격 조회 생략)
    Alerts {
        /// 세션 (AM/PM, 생략 시 현재 시각으로 판별)
        #[arg(long)]
        session: Option<String>,
    },

    /// 세션 전체 워크플로우 (가격 → 평가 → 발송)
    Session {
        /// 세션 (AM/PM, 생략 시 현재 시각으로 판별)
        #[arg(long)]
        session: Option<String>,
    },

    /// 추출 후 세션 워크플로우까지 실행
    RunAll,

    /// 데몬 모드: 스케줄에 따라 작업 실행
    Daemon,

    /// 해당 연도의 휴장일 출력
    Holidays {
        /// 연도 (기본: 올해)
        #[arg(long)]
        year: Option<i32>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => {}
        Err(e) => {
            tracing::error!(error = %e, "실행 실패");
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CoreResult<()> {
    // 설정 로드 실패는 시작 시 치명적
    let mut config = AppConfig::load_default()?;
    config.logging.level = cli.log_level.clone();
    init_logging(&config.logging).map_err(|e| CoreError::Config(e.to_string()))?;

    tracing::info!(mode = ?config.mode, "알림 러너 시작");

    // Holidays는 외부 연결 없이 처리
    if let Commands::Holidays { year } = &cli.command {
        let calendar = MarketCalendar::new(config.timezone()?);
        let year = year.unwrap_or_else(|| {
            use chrono::Datelike;
            calendar.today().year()
        });
        println!("{} 휴장일:", year);
        for (date, name) in holidays_for_year(year) {
            println!("  {}  {}", date, name);
        }
        return Ok(());
    }

    let workflow = Arc::new(build_workflow(&config).await?);

    match cli.command {
        Commands::Extract {
            categories,
            hours,
            validate,
        } => {
            let categories = match categories {
                Some(raw) => parse_categories(&raw)?,
                None => workflow.categories_for_today(),
            };
            let hours = hours.unwrap_or(config.runtime.lookback_hours);
            let mode = if validate { RunMode::Validate } else { config.mode };
            workflow.run_extraction_for(&categories, hours, mode).await?;
        }
        Commands::Prices { session } => {
            let session = workflow.resolve_session(parse_session(session.as_deref())?)?;
            let (priced, _) = workflow.run_session_prices_only(session).await?;
            tracing::info!(session = %session, priced = priced, "가격 갱신 완료");
        }
        Commands::Alerts { session } => {
            let session = workflow.resolve_session(parse_session(session.as_deref())?)?;
            let fired = workflow.run_alerts_only(session).await?;
            tracing::info!(session = %session, alerts = fired, "알림 평가 완료");
        }
        Commands::Session { session } => {
            let session = workflow.resolve_session(parse_session(session.as_deref())?)?;
            let job = match session {
                TradingSession::Am => JobKind::AmSession,
                TradingSession::Pm => JobKind::PmSession,
            };
            workflow.execute_job(job).await?;
        }
        Commands::RunAll => {
            workflow.execute_job(JobKind::Extraction).await?;
            let session = workflow.resolve_session(None)?;
            let job = match session {
                TradingSession::Am => JobKind::AmSession,
                TradingSession::Pm => JobKind::PmSession,
            };
            workflow.execute_job(job).await?;
        }
        Commands::Daemon => {
            scheduler::run_daemon(Arc::clone(&workflow)).await?;
        }
        Commands::Holidays { .. } => unreachable!("위에서 처리"),
    }

    tracing::info!("알림 러너 종료");
    Ok(())
}

/// 설정에서 워크플로우를 조립합니다.
async fn build_workflow(config: &AppConfig) -> CoreResult<Workflow> {
    let calendar = MarketCalendar::new(config.timezone()?);

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| CoreError::Store(e.to_string()))?;
    tracing::info!("데이터베이스 연결 성공");

    let store = StockStore::new(pool.clone());
    let runs = SessionRunRepository::new(pool);

    let source = Arc::new(
        GmailSource::from_token_file(
            &config.source.token_path,
            Duration::from_secs(config.runtime.source_deadline_secs),
        )
        .map_err(|e| CoreError::Config(e.to_string()))?,
    );
    let ocr = Arc::new(
        MistralOcr::new(
            &config.ocr.api_key,
            &config.ocr.model,
            Duration::from_secs(config.runtime.ocr_deadline_secs),
        )
        .map_err(|e| CoreError::Config(e.to_string()))?,
    );
    let extractor = Extractor::new(
        source,
        store.clone(),
        ocr,
        config.ocr.crypto_image_indices.clone(),
    );

    let gateway = Arc::new(TcpGateway::new(
        &config.broker.host,
        config.broker.port,
        config.broker.client_id,
    ));
    let fetcher = PriceFetcher::new(
        gateway,
        config.runtime.broker_spacing(),
        config.runtime.parallelism,
        config.runtime.broker_deadline(),
    );

    // 테스트 모드에서는 메일 미발송
    let sender: Option<Arc<dyn MailSender>> = if config.mode == RunMode::Test {
        None
    } else {
        Some(Arc::new(
            SmtpSender::from_config(
                &config.mail,
                Duration::from_secs(config.runtime.mail_deadline_secs),
            )
            .map_err(|e| CoreError::Config(e.to_string()))?,
        ))
    };

    Ok(Workflow::new(
        config.clone(),
        calendar,
        store,
        runs,
        extractor,
        fetcher,
        sender,
    ))
}

/// 세션 인자를 파싱합니다.
fn parse_session(raw: Option<&str>) -> CoreResult<Option<TradingSession>> {
    raw.map(|s| s.parse::<TradingSession>())
        .transpose()
        .map_err(CoreError::InvalidInput)
}

/// 쉼표로 구분된 카테고리 목록을 파싱합니다.
fn parse_categories(raw: &str) -> CoreResult<Vec<Category>> {
    raw.split(',')
        .map(|s| s.trim().parse::<Category>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(CoreError::InvalidInput)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session() {
        assert_eq!(parse_session(None).unwrap(), None);
        assert_eq!(
            parse_session(Some("am")).unwrap(),
            Some(TradingSession::Am)
        );
        assert!(parse_session(Some("midday")).is_err());
    }

    #[test]
    fn test_parse_categories() {
        assert_eq!(
            parse_categories("daily,digitalassets").unwrap(),
            vec![Category::Daily, Category::DigitalAssets]
        );
        assert_eq!(
            parse_categories(" etfs , ideas ").unwrap(),
            vec![Category::Etfs, Category::Ideas]
        );
        assert!(parse_categories("daily,bonds").is_err());
    }
}

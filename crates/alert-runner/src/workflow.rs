//! 작업 워크플로우.
//!
//! 세 가지 작업을 구성합니다:
//! - 추출: 카테고리별 뉴스레터 추출 후 카테고리 단위 교체
//! - 세션(AM/PM): 가격 조회 → 스토어 갱신 → 알림 평가 → 다이제스트 발송
//!
//! 각 작업은 작업별 잠금으로 이중 실행을 막고, 결과와 무관하게
//! SessionRun을 기록하며, 작업 데드라인(기본 20분)을 초과하면 실패로
//! 마감됩니다.

use alert_broker::{ContractDescriptor, ContractResolver, PriceFetcher, PriceOutcome, PriceRequest};
use alert_core::{
    AlertEvaluator, AppConfig, Category, CoreError, CoreResult, JobKind, MarketCalendar, RunMode,
    SessionRun, Stock, TradingSession,
};
use alert_data::{SessionRunRepository, StockStore, StoreError};
use alert_extract::{ExtractionMode, Extractor};
use alert_notify::{AlertDigest, MailSender};
use std::sync::Mutex;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 워크플로우 실행 컨텍스트.
///
/// 중복 제거 레지스트리(평가기 내부)와 작업 잠금은 프로세스 전역으로
/// 공유됩니다.
pub struct Workflow {
    pub config: AppConfig,
    pub calendar: MarketCalendar,
    pub store: StockStore,
    pub runs: SessionRunRepository,
    pub extractor: Extractor,
    pub fetcher: PriceFetcher,
    pub sender: Option<Arc<dyn MailSender>>,
    evaluator: Mutex<AlertEvaluator>,
    extraction_lock: tokio::sync::Mutex<()>,
    am_lock: tokio::sync::Mutex<()>,
    pm_lock: tokio::sync::Mutex<()>,
}

impl Workflow {
    /// 새 워크플로우를 생성합니다.
    pub fn new(
        config: AppConfig,
        calendar: MarketCalendar,
        store: StockStore,
        runs: SessionRunRepository,
        extractor: Extractor,
        fetcher: PriceFetcher,
        sender: Option<Arc<dyn MailSender>>,
    ) -> Self {
        Self {
            config,
            calendar,
            store,
            runs,
            extractor,
            fetcher,
            sender,
            evaluator: Mutex::new(AlertEvaluator::new()),
            extraction_lock: tokio::sync::Mutex::new(()),
            am_lock: tokio::sync::Mutex::new(()),
            pm_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// 작업을 잠금/데드라인/SessionRun 기록과 함께 실행합니다.
    pub async fn execute_job(&self, job: JobKind) -> CoreResult<()> {
        let lock = match job {
            JobKind::Extraction => &self.extraction_lock,
            JobKind::AmSession => &self.am_lock,
            JobKind::PmSession => &self.pm_lock,
        };
        // 이미 실행 중이면 이중 실행하지 않음
        let Ok(_guard) = lock.try_lock() else {
            warn!(job = %job, "작업이 이미 실행 중, 건너뜀");
            return Ok(());
        };

        let today = self.calendar.today();
        if !self.calendar.is_market_day(today) {
            info!(job = %job, date = %today, "휴장일, 작업 건너뜀");
            return Ok(());
        }

        let run = SessionRun::start(job, today);
        let run_id = match self.runs.record_start(&run).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "SessionRun 시작 기록 실패");
                None
            }
        };

        let deadline = self.config.runtime.job_deadline();
        let result = tokio::time::timeout(deadline, self.run_job(job)).await;

        let (finished, outcome) = match result {
            Ok(Ok((stocks_priced, alerts_fired))) => {
                (run.finish_ok(stocks_priced, alerts_fired), Ok(()))
            }
            Ok(Err(e)) => {
                error!(job = %job, error = %e, "작업 실패");
                (run.finish_err(e.to_string()), Err(e))
            }
            Err(_) => {
                error!(job = %job, deadline_secs = deadline.as_secs(), "작업 데드라인 초과");
                let e = CoreError::Internal(format!("{} 작업 데드라인 초과", job));
                (run.finish_err(e.to_string()), Err(e))
            }
        };

        if let Some(id) = run_id {
            if let Err(e) = self.runs.record_finish(id, &finished).await {
                warn!(error = %e, "SessionRun 종료 기록 실패");
            }
        }
        outcome
    }

    /// 작업 본체를 실행하고 (가격 갱신 수, 알림 수)를 반환합니다.
    async fn run_job(&self, job: JobKind) -> CoreResult<(i32, i32)> {
        match job {
            JobKind::Extraction => {
                self.run_extraction().await?;
                Ok((0, 0))
            }
            JobKind::AmSession => self.run_session(TradingSession::Am).await,
            JobKind::PmSession => self.run_session(TradingSession::Pm).await,
        }
    }

    /// 오늘 추출할 카테고리 집합.
    ///
    /// 주의 첫 거래일에는 weekly 목록 전체, 그 외에는 daily 목록만.
    pub fn categories_for_today(&self) -> Vec<Category> {
        let today = self.calendar.today();
        if self.calendar.is_first_market_day_of_week(today) {
            self.config.categories.weekly.clone()
        } else {
            self.config.categories.daily.clone()
        }
    }

    /// 추출 작업.
    pub async fn run_extraction(&self) -> CoreResult<()> {
        let categories = self.categories_for_today();
        self.run_extraction_for(&categories, self.config.runtime.lookback_hours, self.config.mode)
            .await
    }

    /// 지정한 카테고리/기간/모드로 추출을 실행합니다 (수동 실행용).
    pub async fn run_extraction_for(
        &self,
        categories: &[Category],
        hours: i64,
        mode: RunMode,
    ) -> CoreResult<()> {
        info!(categories = ?categories, hours = hours, mode = ?mode, "추출 작업 시작");

        let summaries = self
            .extractor
            .run(categories, hours, ExtractionMode::from(mode))
            .await;

        for summary in &summaries {
            match &summary.error {
                None => info!(
                    category = %summary.category,
                    message_id = summary.message_id.as_deref().unwrap_or("-"),
                    rows = summary.row_count,
                    "카테고리 추출 성공"
                ),
                Some(e) => warn!(category = %summary.category, error = %e, "카테고리 추출 실패"),
            }
        }

        // 전 카테고리가 메시지를 찾지 못하면 작업 실패 (종료 코드 2)
        if !summaries.is_empty() && summaries.iter().all(|s| s.error.is_some()) {
            let joined = summaries
                .iter()
                .filter_map(|s| s.error.as_deref())
                .collect::<Vec<_>>()
                .join("; ");
            if joined.contains("No message matched") {
                return Err(CoreError::NoMessage(joined));
            }
            return Err(CoreError::Internal(joined));
        }
        Ok(())
    }

    /// 세션 작업: 가격 조회 → 스토어 갱신 → 평가 → 발송.
    pub async fn run_session(&self, session: TradingSession) -> CoreResult<(i32, i32)> {
        let priced = self.fetch_and_store_prices(session).await?;

        // 갱신된 스토어 기준으로 알림 평가
        let refreshed = self.store.list_active(None).await.map_err(CoreError::from)?;
        let trading_day = self.calendar.today();
        let alerts = {
            let mut evaluator = self.evaluator.lock().expect("evaluator mutex poisoned");
            evaluator.evaluate(&refreshed, session, trading_day)
        };
        let alerts_fired = alerts.len() as i32;

        // 다이제스트 발송 (빈 목록은 메일 없음)
        if let Some(digest) = AlertDigest::from_alerts(session, alerts, self.calendar.timezone()) {
            if let Some(sender) = &self.sender {
                sender.send(&digest).await.map_err(CoreError::from)?;
            } else {
                info!(alerts = digest.alerts.len(), "테스트 모드, 메일 미발송");
            }
        } else {
            info!(session = %session, "트리거된 알림 없음, 메일 미발송");
        }

        Ok((priced, alerts_fired))
    }

    /// 가격 조회와 스토어 갱신만 실행합니다 (수동 실행용).
    pub async fn run_session_prices_only(&self, session: TradingSession) -> CoreResult<(i32, i32)> {
        let priced = self.fetch_and_store_prices(session).await?;
        Ok((priced, 0))
    }

    /// 가격 일괄 조회 후 성공한 시세를 스토어에 기록합니다.
    async fn fetch_and_store_prices(&self, session: TradingSession) -> CoreResult<i32> {
        // 1. 평가 대상 종목과 계약 디스크립터 준비
        let stocks = self.store.list_active(None).await.map_err(CoreError::from)?;
        info!(session = %session, stocks = stocks.len(), "가격 조회 시작");

        let mut requests = Vec::with_capacity(stocks.len());
        for stock in &stocks {
            let descriptor = self.resolve_descriptor(stock).await;
            requests.push(PriceRequest {
                ticker: stock.ticker.clone(),
                category: stock.category,
                descriptor,
            });
        }

        // 2. 가격 일괄 조회 (연결 실패는 작업 전체 실패)
        let results = self
            .fetcher
            .fetch_prices(requests)
            .await
            .map_err(CoreError::from)?;

        // 3. 성공한 시세를 스토어에 기록
        let mut priced = 0i32;
        let mut failures = 0usize;
        for result in &results {
            match &result.outcome {
                PriceOutcome::Quote(quote) => {
                    let write = self
                        .store
                        .update_price(
                            &result.request.ticker,
                            result.request.category,
                            session,
                            quote.last,
                            quote.at,
                        )
                        .await;
                    match write {
                        Ok(()) => priced += 1,
                        Err(StoreError::StaleTimestamp { ticker, .. }) => {
                            warn!(ticker = %ticker, "가격 타임스탬프 역행, 건너뜀");
                            failures += 1;
                        }
                        Err(e) => return Err(CoreError::Store(e.to_string())),
                    }
                }
                PriceOutcome::NoData => failures += 1,
                PriceOutcome::Failed(_) => failures += 1,
            }
        }
        info!(session = %session, priced = priced, failures = failures, "가격 갱신 완료");

        Ok(priced)
    }

    /// 평가만 수행하고 발송합니다 (가격 조회 생략, 수동 실행용).
    pub async fn run_alerts_only(&self, session: TradingSession) -> CoreResult<i32> {
        let stocks = self.store.list_active(None).await.map_err(CoreError::from)?;
        let trading_day = self.calendar.today();
        let alerts = {
            let mut evaluator = self.evaluator.lock().expect("evaluator mutex poisoned");
            evaluator.evaluate(&stocks, session, trading_day)
        };
        let count = alerts.len() as i32;

        if let Some(digest) = AlertDigest::from_alerts(session, alerts, self.calendar.timezone()) {
            if let Some(sender) = &self.sender {
                sender.send(&digest).await.map_err(CoreError::from)?;
            }
        }
        Ok(count)
    }

    /// 계약 디스크립터를 캐시에서 읽거나 해석 후 캐시합니다.
    async fn resolve_descriptor(&self, stock: &Stock) -> ContractDescriptor {
        if stock.contract_resolved {
            if let Some(descriptor) = stock
                .contract_descriptor
                .as_ref()
                .and_then(ContractDescriptor::from_json)
            {
                return descriptor;
            }
            warn!(ticker = %stock.ticker, "캐시된 디스크립터 손상, 재해석");
        }

        let descriptor = ContractResolver::descriptor(&stock.ticker, stock.category);
        if let Err(e) = self
            .store
            .cache_contract(&stock.ticker, stock.category, &descriptor.to_json())
            .await
        {
            warn!(ticker = %stock.ticker, error = %e, "디스크립터 캐시 실패");
        }
        descriptor
    }

    /// 수동 실행용 세션 결정: 명시값 우선, 없으면 현재 시각으로 판별.
    pub fn resolve_session(&self, explicit: Option<TradingSession>) -> CoreResult<TradingSession> {
        if let Some(session) = explicit {
            return Ok(session);
        }
        self.calendar
            .detect_session(chrono::Utc::now())
            .ok_or_else(|| {
                CoreError::InvalidInput(
                    "세션 구간 밖입니다. --session AM|PM 을 지정하세요".to_string(),
                )
            })
    }
}

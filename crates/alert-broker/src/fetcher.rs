//! 일괄 가격 조회기.
//!
//! 요청을 제출 순서대로 게이트웨이 페이싱 간격(기본 500ms)을 두고
//! 제출하며, 시세 대기는 동시성 한도(기본 8) 안에서 병렬로
//! 진행합니다. 티커 하나의 실패는 기록만 하고 배치를 중단하지
//! 않습니다.

use crate::contract::ContractDescriptor;
use crate::error::{BrokerError, Result};
use crate::gateway::{QuoteGateway, RawQuote};
use alert_core::{Category, PriceSource, Quote};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// 가격 조회 요청 하나.
#[derive(Debug, Clone)]
pub struct PriceRequest {
    /// 티커
    pub ticker: String,
    /// 카테고리
    pub category: Category,
    /// 해석된 계약 디스크립터
    pub descriptor: ContractDescriptor,
}

/// 티커 하나의 조회 결과.
#[derive(Debug, Clone)]
pub enum PriceOutcome {
    /// 확정 시세
    Quote(Quote),
    /// 모든 fallback이 NaN
    NoData,
    /// 티커 단위 오류
    Failed(String),
}

/// 요청과 결과의 쌍 (제출 순서 유지).
#[derive(Debug, Clone)]
pub struct PriceResult {
    pub request: PriceRequest,
    pub outcome: PriceOutcome,
}

/// 페이싱이 적용된 일괄 가격 조회기.
pub struct PriceFetcher {
    gateway: Arc<dyn QuoteGateway>,
    /// 제출 간 간격
    spacing: Duration,
    /// 동시 대기 한도
    parallelism: usize,
    /// 티커당 데드라인
    deadline: Duration,
}

impl PriceFetcher {
    /// 새 조회기를 생성합니다.
    pub fn new(
        gateway: Arc<dyn QuoteGateway>,
        spacing: Duration,
        parallelism: usize,
        deadline: Duration,
    ) -> Self {
        Self {
            gateway,
            spacing,
            parallelism: parallelism.max(1),
            deadline,
        }
    }

    /// 요청 배치의 시세를 조회합니다.
    ///
    /// 연결 실패 시 티커 단위 호출 없이 `Unavailable`을 반환하며,
    /// 호출자는 전체 요청을 실패로 처리합니다.
    pub async fn fetch_prices(&self, requests: Vec<PriceRequest>) -> Result<Vec<PriceResult>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        self.gateway.connect().await.map_err(|e| {
            warn!(error = %e, "게이트웨이 연결 실패, 배치 전체 중단");
            BrokerError::Unavailable(e.to_string())
        })?;

        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut join_set: JoinSet<(usize, PriceOutcome)> = JoinSet::new();
        let total = requests.len();

        for (index, request) in requests.iter().enumerate() {
            // 제출 간 페이싱 (게이트웨이 요청 한도 준수)
            if index > 0 {
                tokio::time::sleep(self.spacing).await;
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore closed");
            let gateway = Arc::clone(&self.gateway);
            let descriptor = request.descriptor.clone();
            let ticker = request.ticker.clone();
            let deadline = self.deadline;

            join_set.spawn(async move {
                let _permit = permit;
                let outcome = match gateway.fetch_quote(&descriptor, deadline).await {
                    Ok(raw) => match pick_price(&raw) {
                        Some((price, source)) => {
                            PriceOutcome::Quote(Quote::new(price, source, raw.at))
                        }
                        None => {
                            warn!(ticker = %ticker, "모든 가격 필드가 NaN");
                            PriceOutcome::NoData
                        }
                    },
                    Err(e) => {
                        warn!(ticker = %ticker, error = %e, "시세 조회 실패");
                        PriceOutcome::Failed(e.to_string())
                    }
                };
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<PriceOutcome>> = vec![None; total];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => warn!(error = %e, "시세 태스크 중단"),
            }
        }

        let results: Vec<PriceResult> = requests
            .into_iter()
            .zip(outcomes)
            .map(|(request, outcome)| PriceResult {
                request,
                outcome: outcome.unwrap_or_else(|| PriceOutcome::Failed("태스크 중단".to_string())),
            })
            .collect();

        let quoted = results
            .iter()
            .filter(|r| matches!(r.outcome, PriceOutcome::Quote(_)))
            .count();
        info!(total = total, quoted = quoted, "가격 배치 조회 완료");
        Ok(results)
    }
}

/// NaN fallback 체인으로 확정 가격을 고릅니다.
///
/// last → close → bid/ask 중간값 순서이며, 유효한 값은 유한하고 0보다
/// 커야 합니다. 확정 가격은 소수 둘째 자리로 반올림합니다.
pub fn pick_price(raw: &RawQuote) -> Option<(Decimal, PriceSource)> {
    fn valid(value: f64) -> bool {
        value.is_finite() && value > 0.0
    }

    let (value, source) = if valid(raw.last) {
        (raw.last, PriceSource::Last)
    } else if valid(raw.close) {
        (raw.close, PriceSource::Close)
    } else if valid(raw.bid) && valid(raw.ask) {
        ((raw.bid + raw.ask) / 2.0, PriceSource::Midpoint)
    } else {
        return None;
    };

    Decimal::from_f64(value).map(|d| (d.round_dp(2), source))
}

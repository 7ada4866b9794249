//! 추출 오케스트레이터.
//!
//! 카테고리별로 제목 질의 → 최신 메시지 선택 → 파싱 → 카테고리 단위
//! 교체(commit) 또는 비교 리포트(validate)를 수행합니다. 카테고리 간
//! 실패는 격리되며, 실패한 카테고리는 스토어에 아무 변경도 남기지
//! 않습니다.

use crate::error::{ExtractError, Result};
use crate::ocr::OcrClient;
use crate::parser::{CryptoParser, HtmlLevelsParser, NewsletterParser};
use crate::source::MessageSource;
use alert_core::{Category, ExtractedRow, RunMode, Stock};
use alert_data::StockStore;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// 추출 실행 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// 스토어에 커밋
    Commit,
    /// 비교 리포트만 생성, 스토어 변경 없음
    Validate,
}

impl From<RunMode> for ExtractionMode {
    fn from(mode: RunMode) -> Self {
        match mode {
            RunMode::Validate => ExtractionMode::Validate,
            // test 모드는 추출 단계에서는 commit과 동일
            RunMode::Commit | RunMode::Test => ExtractionMode::Commit,
        }
    }
}

/// 기존 스토어 내용 대비 변경 내역.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileDelta {
    /// 새로 추가된 티커
    pub added: Vec<String>,
    /// 사라진 티커
    pub removed: Vec<String>,
    /// 센티먼트/임계값이 바뀐 티커
    pub changed: Vec<String>,
}

impl ReconcileDelta {
    /// 기존 행과 새 행을 비교합니다.
    pub fn compare(old: &[Stock], new: &[ExtractedRow]) -> Self {
        let old_by_ticker: HashMap<&str, &Stock> =
            old.iter().map(|s| (s.ticker.as_str(), s)).collect();
        let new_by_ticker: HashMap<&str, &ExtractedRow> =
            new.iter().map(|r| (r.ticker.as_str(), r)).collect();

        let mut delta = Self::default();

        for row in new {
            match old_by_ticker.get(row.ticker.as_str()) {
                None => delta.added.push(row.ticker.clone()),
                Some(stock) => {
                    let same = stock.sentiment == Some(row.sentiment)
                        && stock.buy_trade == Some(row.buy_trade)
                        && stock.sell_trade == Some(row.sell_trade);
                    if !same {
                        delta.changed.push(row.ticker.clone());
                    }
                }
            }
        }
        for stock in old {
            if !new_by_ticker.contains_key(stock.ticker.as_str()) {
                delta.removed.push(stock.ticker.clone());
            }
        }

        delta.added.sort();
        delta.removed.sort();
        delta.changed.sort();
        delta
    }

    /// 변경이 없는지 확인합니다.
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// 카테고리별 실행 요약.
#[derive(Debug, Clone)]
pub struct CategorySummary {
    /// 카테고리
    pub category: Category,
    /// 선택된 메시지 ID
    pub message_id: Option<String>,
    /// 추출된 행 수
    pub row_count: usize,
    /// 기존 내용 대비 변경 내역
    pub delta: Option<ReconcileDelta>,
    /// 실패 시 오류 요약
    pub error: Option<String>,
}

impl CategorySummary {
    fn failed(category: Category, error: &ExtractError) -> Self {
        Self {
            category,
            message_id: None,
            row_count: 0,
            delta: None,
            error: Some(error.to_string()),
        }
    }
}

/// 추출 오케스트레이터.
pub struct Extractor {
    source: Arc<dyn MessageSource>,
    store: StockStore,
    parsers: HashMap<Category, Arc<dyn NewsletterParser>>,
}

impl Extractor {
    /// 표준 파서 구성으로 오케스트레이터를 생성합니다.
    pub fn new(
        source: Arc<dyn MessageSource>,
        store: StockStore,
        ocr: Arc<dyn OcrClient>,
        crypto_image_indices: Vec<usize>,
    ) -> Self {
        let mut parsers: HashMap<Category, Arc<dyn NewsletterParser>> = HashMap::new();
        parsers.insert(Category::Daily, Arc::new(HtmlLevelsParser::daily()));
        parsers.insert(
            Category::DigitalAssets,
            Arc::new(CryptoParser::new(ocr, crypto_image_indices)),
        );
        parsers.insert(Category::Etfs, Arc::new(HtmlLevelsParser::etfs()));
        parsers.insert(Category::Ideas, Arc::new(HtmlLevelsParser::ideas()));

        Self {
            source,
            store,
            parsers,
        }
    }

    /// 파서를 교체합니다 (테스트용).
    pub fn with_parser(mut self, parser: Arc<dyn NewsletterParser>) -> Self {
        self.parsers.insert(parser.category(), parser);
        self
    }

    /// 지정한 카테고리들을 추출합니다.
    ///
    /// 카테고리 하나의 실패는 다른 카테고리를 중단시키지 않습니다.
    pub async fn run(
        &self,
        categories: &[Category],
        hours: i64,
        mode: ExtractionMode,
    ) -> Vec<CategorySummary> {
        let mut summaries = Vec::with_capacity(categories.len());

        for &category in categories {
            match self.run_category(category, hours, mode).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    error!(category = %category, error = %e, "카테고리 추출 실패");
                    summaries.push(CategorySummary::failed(category, &e));
                }
            }
        }

        let ok = summaries.iter().filter(|s| s.error.is_none()).count();
        info!(
            requested = categories.len(),
            succeeded = ok,
            mode = ?mode,
            "추출 오케스트레이션 완료"
        );
        summaries
    }

    /// 카테고리 하나를 추출합니다.
    #[instrument(skip(self))]
    async fn run_category(
        &self,
        category: Category,
        hours: i64,
        mode: ExtractionMode,
    ) -> Result<CategorySummary> {
        let parser = self
            .parsers
            .get(&category)
            .ok_or_else(|| ExtractError::InvalidConfig(format!("파서 없음: {}", category)))?;

        let until = Utc::now();
        let since = until - Duration::hours(hours);

        let headers = self
            .source
            .list_messages(category.subject_query(), since, until)
            .await?;

        // Date 헤더 기준 최신 메시지 선택
        let newest = headers
            .into_iter()
            .max_by_key(|h| h.date)
            .ok_or_else(|| ExtractError::NoMessage(category.to_string()))?;

        info!(
            category = %category,
            message_id = %newest.id,
            subject = %newest.subject,
            "최신 메시지 선택"
        );

        let message = self.source.fetch(&newest.id).await?;
        let rows = parser.parse(&message).await?;

        let previous = self.store.list_by_category(category).await?;
        let delta = ReconcileDelta::compare(&previous, &rows);

        if mode == ExtractionMode::Commit {
            let outcome = self
                .store
                .replace_category(category, &rows, Some(&message.id))
                .await?;
            info!(
                category = %category,
                deleted = outcome.deleted,
                inserted = outcome.inserted,
                added = delta.added.len(),
                removed = delta.removed.len(),
                changed = delta.changed.len(),
                "카테고리 커밋 완료"
            );
        } else {
            info!(
                category = %category,
                added = delta.added.len(),
                removed = delta.removed.len(),
                changed = delta.changed.len(),
                unchanged = delta.is_unchanged(),
                "검증 모드, 스토어 변경 없음"
            );
        }

        Ok(CategorySummary {
            category,
            message_id: Some(message.id),
            row_count: rows.len(),
            delta: Some(delta),
            error: None,
        })
    }
}

//! 종목 테이블 스토어.
//!
//! 스키마:
//!
//! ```sql
//! CREATE TABLE stocks (
//!     id BIGSERIAL PRIMARY KEY,
//!     ticker VARCHAR(20) NOT NULL,
//!     category VARCHAR(50) NOT NULL,
//!     sentiment VARCHAR(20),
//!     buy_trade NUMERIC(10,2),
//!     sell_trade NUMERIC(10,2),
//!     am_price NUMERIC(10,2),
//!     pm_price NUMERIC(10,2),
//!     last_price_update TIMESTAMPTZ,
//!     contract_descriptor JSONB,
//!     contract_resolved BOOLEAN NOT NULL DEFAULT FALSE,
//!     source_message_id VARCHAR(255),
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     UNIQUE (ticker, category)
//! );
//! ```
//!
//! 카테고리 단위 교체는 delete-before-insert 프로토콜을 따릅니다.
//! 같은 카테고리에 대한 동시 교체는 advisory lock으로 직렬화되고,
//! 다른 카테고리의 가격 갱신은 병행 진행됩니다.

use crate::error::{Result, StoreError};
use crate::records::StockRecord;
use alert_core::{Category, ExtractedRow, Stock, TradingSession};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use tracing::{debug, info, instrument};

/// 종목 스토어 서비스.
#[derive(Clone)]
pub struct StockStore {
    pool: PgPool,
}

impl StockStore {
    /// 새 스토어 서비스를 생성합니다.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 풀 참조를 반환합니다.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 카테고리의 모든 행을 새 추출 결과로 교체합니다.
    ///
    /// 단일 트랜잭션으로 실행되며, 무결성 위반 시 전체가 롤백되어
    /// 기존 내용이 보존됩니다. 다른 카테고리의 행은 건드리지 않습니다.
    #[instrument(skip(self, rows), fields(count = rows.len()))]
    pub async fn replace_category(
        &self,
        category: Category,
        rows: &[ExtractedRow],
        source_message_id: Option<&str>,
    ) -> Result<ReplaceOutcome> {
        let mut tx = self.pool.begin().await?;

        // 카테고리 범위 배타 잠금 (트랜잭션 종료 시 자동 해제)
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(category.as_str())
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM stocks WHERE category = $1")
            .bind(category.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::DeleteError(e.to_string()))?
            .rows_affected();

        let mut inserted = 0usize;
        // UNNEST 패턴으로 일괄 삽입
        for chunk in rows.chunks(500) {
            let tickers: Vec<&str> = chunk.iter().map(|r| r.ticker.as_str()).collect();
            let sentiments: Vec<&str> = chunk.iter().map(|r| r.sentiment.as_str()).collect();
            let buys: Vec<Decimal> = chunk.iter().map(|r| r.buy_trade).collect();
            let sells: Vec<Decimal> = chunk.iter().map(|r| r.sell_trade).collect();

            let result = sqlx::query(
                r#"
                INSERT INTO stocks
                    (ticker, category, sentiment, buy_trade, sell_trade, source_message_id,
                     created_at, updated_at)
                SELECT t, $2, s, b, sl, $6, NOW(), NOW()
                FROM UNNEST($1::text[], $3::text[], $4::numeric[], $5::numeric[]) AS u(t, s, b, sl)
                "#,
            )
            .bind(&tickers)
            .bind(category.as_str())
            .bind(&sentiments)
            .bind(&buys)
            .bind(&sells)
            .bind(source_message_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.code().unwrap_or_default() == "23505" => {
                    StoreError::DuplicateError(db.message().to_string())
                }
                other => StoreError::InsertError(other.to_string()),
            })?;

            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;

        info!(
            category = %category,
            deleted = deleted,
            inserted = inserted,
            "카테고리 교체 완료"
        );

        Ok(ReplaceOutcome {
            deleted: deleted as usize,
            inserted,
        })
    }

    /// 평가 대상 종목을 조회합니다.
    ///
    /// 센티먼트와 두 임계값이 모두 있는 행만 반환합니다.
    pub async fn list_active(&self, category: Option<Category>) -> Result<Vec<Stock>> {
        let records: Vec<StockRecord> = match category {
            Some(cat) => {
                sqlx::query_as(
                    r#"
                    SELECT ticker, category, sentiment, buy_trade, sell_trade,
                           am_price, pm_price, last_price_update,
                           contract_descriptor, contract_resolved
                    FROM stocks
                    WHERE category = $1
                      AND sentiment IS NOT NULL
                      AND buy_trade IS NOT NULL
                      AND sell_trade IS NOT NULL
                    ORDER BY category, ticker
                    "#,
                )
                .bind(cat.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT ticker, category, sentiment, buy_trade, sell_trade,
                           am_price, pm_price, last_price_update,
                           contract_descriptor, contract_resolved
                    FROM stocks
                    WHERE sentiment IS NOT NULL
                      AND buy_trade IS NOT NULL
                      AND sell_trade IS NOT NULL
                    ORDER BY category, ticker
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut stocks = Vec::with_capacity(records.len());
        for record in records {
            stocks.push(record.to_stock()?);
        }

        debug!(count = stocks.len(), "평가 대상 종목 조회");
        Ok(stocks)
    }

    /// 카테고리의 전체 행을 조회합니다 (validate 모드 비교용).
    pub async fn list_by_category(&self, category: Category) -> Result<Vec<Stock>> {
        let records: Vec<StockRecord> = sqlx::query_as(
            r#"
            SELECT ticker, category, sentiment, buy_trade, sell_trade,
                   am_price, pm_price, last_price_update,
                   contract_descriptor, contract_resolved
            FROM stocks
            WHERE category = $1
            ORDER BY ticker
            "#,
        )
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(|r| r.to_stock()).collect()
    }

    /// 세션 가격을 갱신합니다.
    ///
    /// `at`은 기존 `last_price_update`보다 엄격히 커야 합니다.
    /// 그렇지 않으면 행을 변경하지 않고 `StaleTimestamp`를 반환합니다.
    #[instrument(skip(self))]
    pub async fn update_price(
        &self,
        ticker: &str,
        category: Category,
        session: TradingSession,
        price: Decimal,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let query = match session {
            TradingSession::Am => {
                r#"
                UPDATE stocks
                SET am_price = $3, last_price_update = $4, updated_at = NOW()
                WHERE ticker = $1 AND category = $2
                  AND (last_price_update IS NULL OR last_price_update < $4)
                "#
            }
            TradingSession::Pm => {
                r#"
                UPDATE stocks
                SET pm_price = $3, last_price_update = $4, updated_at = NOW()
                WHERE ticker = $1 AND category = $2
                  AND (last_price_update IS NULL OR last_price_update < $4)
                "#
            }
        };

        let updated = sqlx::query(query)
            .bind(ticker)
            .bind(category.as_str())
            .bind(price)
            .bind(at)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if updated == 0 {
            // 행이 없는 경우와 타임스탬프 역행을 구분
            let exists: Option<(i64,)> =
                sqlx::query_as("SELECT id FROM stocks WHERE ticker = $1 AND category = $2")
                    .bind(ticker)
                    .bind(category.as_str())
                    .fetch_optional(&self.pool)
                    .await?;

            return Err(match exists {
                Some(_) => StoreError::StaleTimestamp {
                    ticker: ticker.to_string(),
                    category: category.to_string(),
                },
                None => StoreError::NotFound(format!("{} ({})", ticker, category)),
            });
        }

        debug!(ticker = ticker, category = %category, session = %session, price = %price, "가격 갱신");
        Ok(())
    }

    /// 해석된 계약 디스크립터를 캐시합니다.
    pub async fn cache_contract(
        &self,
        ticker: &str,
        category: Category,
        descriptor: &serde_json::Value,
    ) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE stocks
            SET contract_descriptor = $3, contract_resolved = TRUE, updated_at = NOW()
            WHERE ticker = $1 AND category = $2
            "#,
        )
        .bind(ticker)
        .bind(category.as_str())
        .bind(descriptor)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(StoreError::NotFound(format!("{} ({})", ticker, category)));
        }
        Ok(())
    }

    /// 캐시된 계약 디스크립터를 조회합니다.
    ///
    /// 해석 완료 플래그가 선 행의 디스크립터만 반환합니다.
    pub async fn get_contract(
        &self,
        ticker: &str,
        category: Category,
    ) -> Result<Option<serde_json::Value>> {
        let row: Option<(Option<serde_json::Value>, bool)> = sqlx::query_as(
            r#"
            SELECT contract_descriptor, contract_resolved
            FROM stocks
            WHERE ticker = $1 AND category = $2
            "#,
        )
        .bind(ticker)
        .bind(category.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some((descriptor, true)) => descriptor,
            _ => None,
        })
    }

    /// 카테고리별 행 수를 조회합니다.
    pub async fn count_by_category(&self, category: Category) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stocks WHERE category = $1")
            .bind(category.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// 카테고리 교체 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// 삭제된 행 수
    pub deleted: usize,
    /// 삽입된 행 수
    pub inserted: usize,
}

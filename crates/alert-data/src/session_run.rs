//! 작업 실행 기록 저장소.
//!
//! 스키마:
//!
//! ```sql
//! CREATE TABLE session_runs (
//!     id BIGSERIAL PRIMARY KEY,
//!     job VARCHAR(20) NOT NULL,
//!     session VARCHAR(2),
//!     trading_day DATE NOT NULL,
//!     started_at TIMESTAMPTZ NOT NULL,
//!     finished_at TIMESTAMPTZ,
//!     success BOOLEAN NOT NULL DEFAULT FALSE,
//!     stocks_priced INT NOT NULL DEFAULT 0,
//!     alerts_fired INT NOT NULL DEFAULT 0,
//!     error TEXT
//! );
//! ```

use crate::error::Result;
use alert_core::{JobKind, SessionRun};
use chrono::NaiveDate;
use sqlx::postgres::PgPool;
use tracing::debug;

/// session_runs 테이블 저장소.
#[derive(Clone)]
pub struct SessionRunRepository {
    pool: PgPool,
}

impl SessionRunRepository {
    /// 새 저장소를 생성합니다.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 실행 시작을 기록하고 레코드 ID를 반환합니다.
    pub async fn record_start(&self, run: &SessionRun) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO session_runs (job, session, trading_day, started_at, success)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING id
            "#,
        )
        .bind(run.job.as_str())
        .bind(run.session.map(|s| s.as_str()))
        .bind(run.trading_day)
        .bind(run.started_at)
        .fetch_one(&self.pool)
        .await?;

        debug!(id = id, job = %run.job, "작업 실행 시작 기록");
        Ok(id)
    }

    /// 실행 종료를 기록합니다.
    pub async fn record_finish(&self, id: i64, run: &SessionRun) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE session_runs
            SET finished_at = $2, success = $3, stocks_priced = $4, alerts_fired = $5, error = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(run.finished_at)
        .bind(run.success)
        .bind(run.stocks_priced)
        .bind(run.alerts_fired)
        .bind(run.error.as_deref())
        .execute(&self.pool)
        .await?;

        debug!(id = id, success = run.success, "작업 실행 종료 기록");
        Ok(())
    }

    /// 해당 거래일에 성공한 실행이 있는지 확인합니다 (재실행 멱등성 확인용).
    pub async fn has_successful_run(&self, job: JobKind, trading_day: NaiveDate) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM session_runs
            WHERE job = $1 AND trading_day = $2 AND success = TRUE
            "#,
        )
        .bind(job.as_str())
        .bind(trading_day)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }
}

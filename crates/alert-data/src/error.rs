//! 스토어 오류 타입.

use thiserror::Error;

/// 스토어 관련 오류.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 고유 제약 조건 위반
    #[error("Duplicate record: {0}")]
    DuplicateError(String),

    /// 데이터 삽입 오류
    #[error("Insert error: {0}")]
    InsertError(String),

    /// 데이터 삭제 오류
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// 가격 타임스탬프가 기존 값보다 이전
    #[error("Stale price timestamp for {ticker} ({category})")]
    StaleTimestamp { ticker: String, category: String },

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                if code == "23505" {
                    // PostgreSQL 고유 제약 조건 위반
                    StoreError::DuplicateError(db_err.message().to_string())
                } else {
                    StoreError::QueryError(db_err.message().to_string())
                }
            }
            _ => StoreError::QueryError(err.to_string()),
        }
    }
}

impl From<StoreError> for alert_core::CoreError {
    fn from(err: StoreError) -> Self {
        alert_core::CoreError::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

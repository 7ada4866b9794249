//! 추출 단계 오류 타입.

use thiserror::Error;

/// 추출 관련 오류.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// 메일 소스 접근 불가 (재시도 소진)
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// 조회 기간 내 일치하는 메시지 없음
    #[error("No message matched: {0}")]
    NoMessage(String),

    /// 메시지/행 파싱 실패
    #[error("Parse error: {0}")]
    ParseError(String),

    /// OCR 호출 실패
    #[error("OCR error: {0}")]
    OcrError(String),

    /// 스토어 오류
    #[error("Store error: {0}")]
    StoreError(#[from] alert_data::StoreError),

    /// 잘못된 설정
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl ExtractError {
    /// 재시도 가능한 오류인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractError::SourceUnavailable(_) | ExtractError::OcrError(_))
    }
}

impl From<serde_json::Error> for ExtractError {
    fn from(err: serde_json::Error) -> Self {
        ExtractError::ParseError(err.to_string())
    }
}

impl From<ExtractError> for alert_core::CoreError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::SourceUnavailable(msg) => alert_core::CoreError::SourceUnavailable(msg),
            ExtractError::NoMessage(msg) => alert_core::CoreError::NoMessage(msg),
            ExtractError::ParseError(msg) => alert_core::CoreError::Parse(msg),
            ExtractError::OcrError(msg) => alert_core::CoreError::Ocr(msg),
            ExtractError::StoreError(e) => alert_core::CoreError::Store(e.to_string()),
            ExtractError::InvalidConfig(msg) => alert_core::CoreError::Config(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;

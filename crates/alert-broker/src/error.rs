//! 브로커 오류 타입.

use thiserror::Error;

/// 브로커 관련 오류.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// 게이트웨이 연결 실패
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// 네트워크/전송 오류
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 연결이 끊김
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// 티커당 데드라인 초과
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 응답 파싱 실패
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 모든 fallback이 NaN (시세 없음)
    #[error("No quote data: {0}")]
    NoData(String),

    /// 게이트웨이가 보고한 티커 단위 오류
    #[error("Gateway error for {symbol}: {message}")]
    GatewayError { symbol: String, message: String },
}

impl BrokerError {
    /// 재시도 가능한 오류인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BrokerError::NetworkError(_) | BrokerError::Disconnected(_) | BrokerError::Timeout(_)
        )
    }
}

impl From<std::io::Error> for BrokerError {
    fn from(err: std::io::Error) -> Self {
        BrokerError::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        BrokerError::ParseError(err.to_string())
    }
}

impl From<BrokerError> for alert_core::CoreError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::NoData(msg) => alert_core::CoreError::NoQuote(msg),
            other => alert_core::CoreError::BrokerUnavailable(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;

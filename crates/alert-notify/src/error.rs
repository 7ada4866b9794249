//! 알림 발송 에러.

use thiserror::Error;

/// 알림 발송 에러.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("메일 발송 실패: {0}")]
    SendFailed(String),

    #[error("잘못된 메일 설정: {0}")]
    InvalidConfig(String),

    #[error("메일 작성 실패: {0}")]
    BuildFailed(String),

    #[error("발송 데드라인 초과")]
    Timeout,
}

impl From<lettre::error::Error> for NotifyError {
    fn from(err: lettre::error::Error) -> Self {
        NotifyError::BuildFailed(err.to_string())
    }
}

impl From<lettre::address::AddressError> for NotifyError {
    fn from(err: lettre::address::AddressError) -> Self {
        NotifyError::InvalidConfig(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for NotifyError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        NotifyError::SendFailed(err.to_string())
    }
}

impl From<NotifyError> for alert_core::CoreError {
    fn from(err: NotifyError) -> Self {
        alert_core::CoreError::Mail(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NotifyError>;

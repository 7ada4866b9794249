//! 알림 파이프라인의 에러 타입.
//!
//! 이 모듈은 파이프라인 전반에서 사용되는 최상위 에러 타입과
//! 워크플로우 러너의 종료 코드 매핑을 정의합니다.

use thiserror::Error;

/// 핵심 파이프라인 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정 에러 (시작 시 치명적)
    #[error("설정 에러: {0}")]
    Config(String),

    /// 메일 소스 접근 불가
    #[error("메일 소스 에러: {0}")]
    SourceUnavailable(String),

    /// 조회 기간 내 일치하는 메시지 없음
    #[error("일치하는 메시지 없음: {0}")]
    NoMessage(String),

    /// 행 파싱 에러
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// OCR 에러
    #[error("OCR 에러: {0}")]
    Ocr(String),

    /// 데이터베이스 에러
    #[error("스토어 에러: {0}")]
    Store(String),

    /// 브로커 게이트웨이 접근 불가
    #[error("브로커 에러: {0}")]
    BrokerUnavailable(String),

    /// 시세 없음 (모든 fallback 실패)
    #[error("시세 없음: {0}")]
    NoQuote(String),

    /// 메일 발송 에러
    #[error("메일 발송 에러: {0}")]
    Mail(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 파이프라인 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// 재시도 가능한 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::SourceUnavailable(_) | CoreError::BrokerUnavailable(_) | CoreError::Mail(_)
        )
    }

    /// 프로세스 종료 코드를 반환합니다.
    ///
    /// 수동 실행 시 워크플로우 러너가 이 코드로 종료합니다:
    /// - 2: 일치하는 메시지 없음
    /// - 3: 브로커 접근 불가
    /// - 4: 스토어 에러
    /// - 5: 메일 발송 에러
    /// - 1: 그 외 모든 실패
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::NoMessage(_) => 2,
            CoreError::BrokerUnavailable(_) => 3,
            CoreError::Store(_) => 4,
            CoreError::Mail(_) => 5,
            _ => 1,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let broker_err = CoreError::BrokerUnavailable("connection refused".to_string());
        assert!(broker_err.is_retryable());

        let parse_err = CoreError::Parse("bad row".to_string());
        assert!(!parse_err.is_retryable());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CoreError::NoMessage("daily".to_string()).exit_code(), 2);
        assert_eq!(
            CoreError::BrokerUnavailable("refused".to_string()).exit_code(),
            3
        );
        assert_eq!(CoreError::Store("deadlock".to_string()).exit_code(), 4);
        assert_eq!(CoreError::Mail("smtp 550".to_string()).exit_code(), 5);
        assert_eq!(CoreError::Config("missing".to_string()).exit_code(), 1);
        assert_eq!(CoreError::Ocr("timeout".to_string()).exit_code(), 1);
    }
}

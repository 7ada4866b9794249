//! 스케줄러 작업 실행 기록.

use crate::types::TradingSession;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 스케줄러가 실행하는 작업 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// 09:00 뉴스레터 추출
    Extraction,
    /// 10:45 오전 세션
    AmSession,
    /// 14:30 오후 세션
    PmSession,
}

impl JobKind {
    /// 데이터베이스 저장용 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Extraction => "extraction",
            JobKind::AmSession => "am_session",
            JobKind::PmSession => "pm_session",
        }
    }

    /// 작업이 속하는 트레이딩 세션 (추출 작업은 없음).
    pub fn session(&self) -> Option<TradingSession> {
        match self {
            JobKind::Extraction => None,
            JobKind::AmSession => Some(TradingSession::Am),
            JobKind::PmSession => Some(TradingSession::Pm),
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 작업 한 번의 실행 기록.
///
/// 관측성과 재실행 멱등성 확인에 사용하며, 결과와 무관하게 항상
/// 기록됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRun {
    /// 실행된 작업
    pub job: JobKind,
    /// 세션 (추출 작업은 None)
    pub session: Option<TradingSession>,
    /// 거래일 (뉴욕 기준)
    pub trading_day: NaiveDate,
    /// 시작 시각
    pub started_at: DateTime<Utc>,
    /// 종료 시각 (실행 중이면 None)
    pub finished_at: Option<DateTime<Utc>>,
    /// 성공 여부
    pub success: bool,
    /// 가격이 갱신된 종목 수
    pub stocks_priced: i32,
    /// 발송된 알림 수
    pub alerts_fired: i32,
    /// 실패 시 에러 요약
    pub error: Option<String>,
}

impl SessionRun {
    /// 시작 시점의 실행 기록을 생성합니다.
    pub fn start(job: JobKind, trading_day: NaiveDate) -> Self {
        Self {
            job,
            session: job.session(),
            trading_day,
            started_at: Utc::now(),
            finished_at: None,
            success: false,
            stocks_priced: 0,
            alerts_fired: 0,
            error: None,
        }
    }

    /// 성공으로 마감합니다.
    pub fn finish_ok(mut self, stocks_priced: i32, alerts_fired: i32) -> Self {
        self.finished_at = Some(Utc::now());
        self.success = true;
        self.stocks_priced = stocks_priced;
        self.alerts_fired = alerts_fired;
        self
    }

    /// 실패로 마감합니다.
    pub fn finish_err(mut self, error: impl Into<String>) -> Self {
        self.finished_at = Some(Utc::now());
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_session_mapping() {
        assert_eq!(JobKind::Extraction.session(), None);
        assert_eq!(JobKind::AmSession.session(), Some(TradingSession::Am));
        assert_eq!(JobKind::PmSession.session(), Some(TradingSession::Pm));
    }

    #[test]
    fn test_run_lifecycle() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let run = SessionRun::start(JobKind::AmSession, day);
        assert!(!run.success);
        assert!(run.finished_at.is_none());

        let done = run.finish_ok(42, 3);
        assert!(done.success);
        assert_eq!(done.stocks_priced, 42);
        assert_eq!(done.alerts_fired, 3);

        let failed = SessionRun::start(JobKind::Extraction, day).finish_err("source down");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("source down"));
    }
}

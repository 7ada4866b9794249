//! 데몬 스케줄러.
//!
//! America/New_York 기준 세 개의 발사 시각(추출 09:00, AM 10:45,
//! PM 14:30)을 캘린더의 `next_fire`로 계산해 가장 이른 작업까지
//! 잠들었다가 실행합니다. 휴장일 게이트는 작업 실행부에서 한 번 더
//! 확인합니다.

use crate::workflow::Workflow;
use alert_core::{CoreError, CoreResult, JobKind};
use chrono::{NaiveTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// `HH:MM` 문자열을 파싱합니다.
pub fn parse_hhmm(raw: &str) -> CoreResult<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| CoreError::Config(format!("잘못된 시각 형식: {}", raw)))
}

/// 데몬 루프를 실행합니다. ctrl-c로 종료합니다.
pub async fn run_daemon(workflow: Arc<Workflow>) -> CoreResult<()> {
    let schedule = &workflow.config.schedule;
    let jobs = [
        (JobKind::Extraction, parse_hhmm(&schedule.extraction_time)?),
        (JobKind::AmSession, parse_hhmm(&schedule.am_time)?),
        (JobKind::PmSession, parse_hhmm(&schedule.pm_time)?),
    ];

    info!(
        extraction = %schedule.extraction_time,
        am = %schedule.am_time,
        pm = %schedule.pm_time,
        timezone = %schedule.timezone,
        "데몬 시작"
    );

    loop {
        let now = Utc::now();

        // 다음으로 도래하는 작업 선택
        let (job, fire_at) = jobs
            .iter()
            .map(|&(job, time)| (job, workflow.calendar.next_fire(time, now)))
            .min_by_key(|&(_, at)| at)
            .expect("작업 목록은 비어 있지 않음");

        let wait = (fire_at - now)
            .to_std()
            .unwrap_or_else(|_| std::time::Duration::from_secs(0));
        info!(
            job = %job,
            fire_at = %fire_at.with_timezone(&workflow.calendar.timezone()),
            wait_secs = wait.as_secs(),
            "다음 작업 대기"
        );

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("종료 신호 수신, 데몬 종료");
                return Ok(());
            }
            _ = tokio::time::sleep(wait) => {
                info!(job = %job, "작업 실행");
                if let Err(e) = workflow.execute_job(job).await {
                    // 작업 하나의 실패가 데몬을 중단시키지 않음
                    warn!(job = %job, error = %e, "작업 실패, 데몬 계속 실행");
                }
            }
        }
    }
}

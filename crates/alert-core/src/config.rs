//! 설정 관리.
//!
//! 기본값 → TOML 파일 → `ALERT__` 접두사 환경 변수 순으로 로드합니다.

use crate::error::{CoreError, CoreResult};
use crate::types::Category;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 뉴스레터 소스 설정
    pub source: SourceConfig,
    /// OCR 설정
    pub ocr: OcrConfig,
    /// 브로커 게이트웨이 설정
    pub broker: BrokerConfig,
    /// 메일 발송 설정
    pub mail: MailConfig,
    /// 스케줄 설정
    pub schedule: ScheduleConfig,
    /// 런타임 설정
    pub runtime: RuntimeConfig,
    /// 카테고리 스케줄 설정
    pub categories: CategoriesConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 실행 모드 (commit, validate, test)
    #[serde(default)]
    pub mode: RunMode,
}

/// 실행 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// 추출 결과를 스토어에 커밋
    #[default]
    Commit,
    /// 비교 리포트만 생성, 스토어 변경 없음
    Validate,
    /// 테스트 모드 (메일 미발송)
    Test,
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// PostgreSQL 연결 URL
    pub url: String,
    /// 최대 연결 수
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

/// 뉴스레터 소스 (Gmail) 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// OAuth 자격증명 파일 경로
    pub credentials_path: String,
    /// 액세스 토큰 파일 경로
    pub token_path: String,
}

/// OCR (Mistral) 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OcrConfig {
    /// API 키
    pub api_key: String,
    /// 사용할 모델
    #[serde(default = "default_ocr_model")]
    pub model: String,
    /// 크립토 메일에서 OCR할 이미지의 위치 인덱스.
    ///
    /// 발행사 레이아웃 상수이므로 레이아웃이 바뀌면 설정만 수정합니다.
    #[serde(default = "default_crypto_image_indices")]
    pub crypto_image_indices: Vec<usize>,
}

fn default_ocr_model() -> String {
    "pixtral-12b-2409".to_string()
}

fn default_crypto_image_indices() -> Vec<usize> {
    vec![6, 14]
}

/// 브로커 게이트웨이 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    /// 게이트웨이 호스트
    pub host: String,
    /// 게이트웨이 포트
    pub port: u16,
    /// 클라이언트 ID
    pub client_id: i32,
}

/// 메일 발송 (SMTP) 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailConfig {
    /// SMTP 호스트
    pub host: String,
    /// SMTP 포트
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// SMTP 사용자명
    pub username: String,
    /// SMTP 비밀번호
    pub password: String,
    /// 발신자 주소
    pub from: String,
    /// 수신자 주소 목록
    pub to: Vec<String>,
}

fn default_smtp_port() -> u16 {
    587
}

/// 스케줄 설정 (거래소 로컬 시각, HH:MM).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// 뉴스레터 추출 시각
    #[serde(default = "default_extraction_time")]
    pub extraction_time: String,
    /// 오전 세션 시각
    #[serde(default = "default_am_time")]
    pub am_time: String,
    /// 오후 세션 시각
    #[serde(default = "default_pm_time")]
    pub pm_time: String,
    /// 거래소 타임존
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_extraction_time() -> String {
    "09:00".to_string()
}
fn default_am_time() -> String {
    "10:45".to_string()
}
fn default_pm_time() -> String {
    "14:30".to_string()
}
fn default_timezone() -> String {
    "America/New_York".to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            extraction_time: default_extraction_time(),
            am_time: default_am_time(),
            pm_time: default_pm_time(),
            timezone: default_timezone(),
        }
    }
}

/// 런타임 동시성 및 데드라인 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// 티커 단위 병렬 처리 한도
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// 브로커 요청 간 간격 (밀리초)
    #[serde(default = "default_broker_spacing_ms")]
    pub broker_spacing_ms: u64,
    /// 소스 요청당 데드라인 (초)
    #[serde(default = "default_source_deadline_secs")]
    pub source_deadline_secs: u64,
    /// OCR 요청당 데드라인 (초)
    #[serde(default = "default_ocr_deadline_secs")]
    pub ocr_deadline_secs: u64,
    /// 티커당 브로커 데드라인 (초)
    #[serde(default = "default_broker_deadline_secs")]
    pub broker_deadline_secs: u64,
    /// SMTP 데드라인 (초)
    #[serde(default = "default_mail_deadline_secs")]
    pub mail_deadline_secs: u64,
    /// 작업 단위 데드라인 (초)
    #[serde(default = "default_job_deadline_secs")]
    pub job_deadline_secs: u64,
    /// 추출 조회 기간 (시간)
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
}

fn default_parallelism() -> usize {
    8
}
fn default_broker_spacing_ms() -> u64 {
    500
}
fn default_source_deadline_secs() -> u64 {
    15
}
fn default_ocr_deadline_secs() -> u64 {
    30
}
fn default_broker_deadline_secs() -> u64 {
    5
}
fn default_mail_deadline_secs() -> u64 {
    20
}
fn default_job_deadline_secs() -> u64 {
    20 * 60
}
fn default_lookback_hours() -> i64 {
    72
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            broker_spacing_ms: default_broker_spacing_ms(),
            source_deadline_secs: default_source_deadline_secs(),
            ocr_deadline_secs: default_ocr_deadline_secs(),
            broker_deadline_secs: default_broker_deadline_secs(),
            mail_deadline_secs: default_mail_deadline_secs(),
            job_deadline_secs: default_job_deadline_secs(),
            lookback_hours: default_lookback_hours(),
        }
    }
}

impl RuntimeConfig {
    /// 브로커 요청 간 간격을 Duration으로 반환합니다.
    pub fn broker_spacing(&self) -> Duration {
        Duration::from_millis(self.broker_spacing_ms)
    }

    /// 티커당 브로커 데드라인을 Duration으로 반환합니다.
    pub fn broker_deadline(&self) -> Duration {
        Duration::from_secs(self.broker_deadline_secs)
    }

    /// 작업 데드라인을 Duration으로 반환합니다.
    pub fn job_deadline(&self) -> Duration {
        Duration::from_secs(self.job_deadline_secs)
    }
}

/// 카테고리 스케줄 설정.
///
/// weekly 카테고리는 주의 첫 거래일에만, daily 카테고리는 매 거래일
/// 추출됩니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoriesConfig {
    /// 주 1회 추출 카테고리
    #[serde(default = "default_weekly_categories")]
    pub weekly: Vec<Category>,
    /// 매 거래일 추출 카테고리
    #[serde(default = "default_daily_categories")]
    pub daily: Vec<Category>,
}

fn default_weekly_categories() -> Vec<Category> {
    vec![
        Category::Daily,
        Category::DigitalAssets,
        Category::Etfs,
        Category::Ideas,
    ]
}

fn default_daily_categories() -> Vec<Category> {
    vec![Category::Daily, Category::DigitalAssets]
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            weekly: default_weekly_categories(),
            daily: default_daily_categories(),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let builder = config::Config::builder()
            // 기본값으로 시작
            .set_default("schedule.extraction_time", "09:00")
            .and_then(|b| b.set_default("schedule.am_time", "10:45"))
            .and_then(|b| b.set_default("schedule.pm_time", "14:30"))
            .and_then(|b| b.set_default("schedule.timezone", "America/New_York"))
            .map_err(|e| CoreError::Config(e.to_string()))?
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("ALERT")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder
            .build()
            .map_err(|e| CoreError::Config(e.to_string()))?;
        config
            .try_deserialize()
            .map_err(|e| CoreError::Config(e.to_string()))
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> CoreResult<Self> {
        dotenvy::dotenv().ok();
        let path = std::env::var("ALERT_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
        Self::load(path)
    }

    /// 스케줄 타임존을 파싱합니다.
    pub fn timezone(&self) -> CoreResult<chrono_tz::Tz> {
        self.schedule
            .timezone
            .parse()
            .map_err(|_| CoreError::Config(format!("알 수 없는 타임존: {}", self.schedule.timezone)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_defaults() {
        let runtime = RuntimeConfig::default();
        assert_eq!(runtime.parallelism, 8);
        assert_eq!(runtime.broker_spacing(), Duration::from_millis(500));
        assert_eq!(runtime.broker_deadline(), Duration::from_secs(5));
        assert_eq!(runtime.job_deadline(), Duration::from_secs(1200));
        assert_eq!(runtime.lookback_hours, 72);
    }

    #[test]
    fn test_category_schedule_defaults() {
        let categories = CategoriesConfig::default();
        assert_eq!(categories.weekly.len(), 4);
        assert_eq!(
            categories.daily,
            vec![Category::Daily, Category::DigitalAssets]
        );
    }

    #[test]
    fn test_crypto_image_indices_default() {
        assert_eq!(default_crypto_image_indices(), vec![6, 14]);
    }

    #[test]
    fn test_run_mode_default() {
        assert_eq!(RunMode::default(), RunMode::Commit);
    }
}

//! 카테고리별 뉴스레터 파서.
//!
//! 모든 파서는 공통 수치 셀 규칙을 공유합니다: 통화 기호/천 단위
//! 구분자/공백 제거, 파싱 불가 행 거부, 중복 티커는 마지막 등장만 유지.

mod crypto;
mod html;
mod table;

pub use crypto::CryptoParser;
pub use html::HtmlLevelsParser;
pub use table::{clean_numeric, dedupe_last, normalize_rows, EXCLUDED_TICKERS};

use crate::error::Result;
use crate::source::SourceMessage;
use alert_core::{Category, ExtractedRow};
use async_trait::async_trait;

/// 뉴스레터 파서 계약.
#[async_trait]
pub trait NewsletterParser: Send + Sync {
    /// 파서가 담당하는 카테고리.
    fn category(&self) -> Category;

    /// 메시지를 추출 행 목록으로 변환합니다.
    ///
    /// 행 단위 오류는 해당 행을 버리고 진단 로그를 남긴 뒤 계속합니다.
    async fn parse(&self, message: &SourceMessage) -> Result<Vec<ExtractedRow>>;
}

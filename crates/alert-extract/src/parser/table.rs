//! 파서 공통 셀 처리 규칙.

use alert_core::{normalize_and_validate, ExtractedRow, Sentiment};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, warn};

/// 제외할 티커 (지수, 금리, 원자재, 환율 등 거래 불가 항목).
pub static EXCLUDED_TICKERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "UST30Y", "UST10Y", "UST2Y", "SPX", "COMPQ", "RUT", "SSEC", "NIKK", "BSE", "DAX", "VIX",
        "USD", "EUR.USD", "USD.YEN", "GBP.USD", "CAD.USD", "WTIC", "BRENT", "NATGAS", "GOLD",
        "COPPER", "SILVER", "BITCOIN",
    ])
});

/// `TICKER (SENTIMENT)` 형식의 셀 패턴.
pub static TICKER_SENTIMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Z0-9/.\-]+)\s*\((BULLISH|BEARISH|NEUTRAL)\)").expect("잘못된 티커 정규식")
});

/// 수치 토큰 패턴 (천 단위 구분자 포함).
pub static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\d][\d,]*\.?\d*").expect("잘못된 수치 정규식"));

/// 수치 셀을 정리하여 Decimal로 파싱합니다.
///
/// 통화 기호, 천 단위 구분자, 공백을 제거합니다. 숫자가 없거나
/// 파싱이 불가능하면 None을 반환합니다.
pub fn clean_numeric(cell: &str) -> Option<Decimal> {
    let cleaned: String = cell
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// 행 텍스트에서 수치 토큰을 순서대로 추출합니다.
pub fn extract_numbers(text: &str) -> Vec<Decimal> {
    NUMERIC_RE
        .find_iter(text)
        .filter_map(|m| clean_numeric(m.as_str()))
        .collect()
}

/// 중복 티커를 마지막 등장만 남기고 제거합니다 (발행사 관례).
pub fn dedupe_last(rows: Vec<ExtractedRow>) -> Vec<ExtractedRow> {
    let mut seen = HashSet::new();
    let mut kept: Vec<ExtractedRow> = rows
        .into_iter()
        .rev()
        .filter(|row| seen.insert(row.ticker.clone()))
        .collect();
    kept.reverse();
    kept
}

/// 행 텍스트에서 센티먼트 토큰을 찾습니다.
pub fn sentiment_in(text: &str) -> Option<Sentiment> {
    let upper = text.to_uppercase();
    if upper.contains("BULLISH") {
        Some(Sentiment::Bullish)
    } else if upper.contains("BEARISH") {
        Some(Sentiment::Bearish)
    } else if upper.contains("NEUTRAL") {
        Some(Sentiment::Neutral)
    } else {
        None
    }
}

/// 추출 행을 정규화하고 검증합니다.
///
/// 티커 정규화/검증, 행 불변식 검사를 통과하지 못한 행은 버리고
/// 진단 로그를 남깁니다. 마지막에 중복 티커를 제거합니다.
pub fn normalize_rows(rows: Vec<ExtractedRow>) -> Vec<ExtractedRow> {
    let before = rows.len();
    let validated: Vec<ExtractedRow> = rows
        .into_iter()
        .filter_map(|mut row| {
            let Some(ticker) = normalize_and_validate(&row.ticker) else {
                warn!(ticker = %row.ticker, "유효하지 않은 티커, 행 버림");
                return None;
            };
            row.ticker = ticker;

            if let Err(reason) = row.validate() {
                warn!(reason = %reason, "행 불변식 위반, 행 버림");
                return None;
            }
            Some(row)
        })
        .collect();

    let deduped = dedupe_last(validated);
    if deduped.len() != before {
        debug!(before = before, after = deduped.len(), "행 정규화 완료");
    }
    deduped
}

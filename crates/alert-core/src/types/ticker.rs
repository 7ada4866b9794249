//! 티커 정규화 및 검증.

use once_cell::sync::Lazy;
use regex::Regex;

/// 정규화 후 티커가 만족해야 하는 형식.
static TICKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9.\-]{1,20}$").expect("잘못된 티커 정규식"));

/// 원시 티커를 정규화합니다.
///
/// 공백을 제거하고 대문자로 변환하며, 슬래시 표기(`BRK/B`)는
/// 점 표기(`BRK.B`)로 통일합니다.
pub fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_uppercase().replace('/', ".")
}

/// 정규화된 티커가 유효한 형식인지 확인합니다.
pub fn is_valid_ticker(ticker: &str) -> bool {
    TICKER_RE.is_match(ticker)
}

/// 원시 티커를 정규화하고 검증합니다.
///
/// 유효하지 않으면 None을 반환하며, 호출자는 해당 행을 버리고
/// 진단 로그를 남깁니다.
pub fn normalize_and_validate(raw: &str) -> Option<String> {
    let ticker = normalize_ticker(raw);
    if is_valid_ticker(&ticker) {
        Some(ticker)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_ticker(" aapl "), "AAPL");
        assert_eq!(normalize_ticker("brk/b"), "BRK.B");
        assert_eq!(normalize_ticker("BTC-USD"), "BTC-USD");
    }

    #[test]
    fn test_validate() {
        assert!(is_valid_ticker("AAPL"));
        assert!(is_valid_ticker("BRK.B"));
        assert!(is_valid_ticker("BTC-USD"));
        assert!(!is_valid_ticker(""));
        assert!(!is_valid_ticker("TOO LONG WITH SPACES"));
        assert!(!is_valid_ticker("ABCDEFGHIJKLMNOPQRSTU")); // 21자
    }

    #[test]
    fn test_normalize_and_validate() {
        assert_eq!(normalize_and_validate(" ewj "), Some("EWJ".to_string()));
        assert_eq!(normalize_and_validate("eur/usd"), Some("EUR.USD".to_string()));
        assert_eq!(normalize_and_validate("   "), None);
    }
}

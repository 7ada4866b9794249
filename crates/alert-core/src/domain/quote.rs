//! 시세 도메인 모델.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 스냅샷 시세의 가격 출처.
///
/// `last`가 NaN이면 `close`, 그다음 호가 중간값 순으로 fallback합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    /// 최근 체결가
    Last,
    /// 전일 종가
    Close,
    /// 매수/매도 호가 중간값
    Midpoint,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::Last => write!(f, "last"),
            PriceSource::Close => write!(f, "close"),
            PriceSource::Midpoint => write!(f, "midpoint"),
        }
    }
}

/// 확정된 스냅샷 시세.
///
/// `last`는 NaN이 아닌 확정 가격이며, `source`는 어떤 필드에서
/// 왔는지를 기록합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    /// 확정 가격
    pub last: Decimal,
    /// 가격 출처
    pub source: PriceSource,
    /// 틱 타임스탬프 (UTC)
    pub at: DateTime<Utc>,
}

impl Quote {
    /// 새 시세를 생성합니다.
    pub fn new(last: Decimal, source: PriceSource, at: DateTime<Utc>) -> Self {
        Self { last, source, at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_source_display() {
        assert_eq!(PriceSource::Last.to_string(), "last");
        assert_eq!(PriceSource::Close.to_string(), "close");
        assert_eq!(PriceSource::Midpoint.to_string(), "midpoint");
    }

    #[test]
    fn test_quote_new() {
        let quote = Quote::new(dec!(410.25), PriceSource::Close, Utc::now());
        assert_eq!(quote.last, dec!(410.25));
        assert_eq!(quote.source, PriceSource::Close);
    }
}

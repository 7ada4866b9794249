//! 센티먼트(방향성) 정의.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 발행사가 부여한 종목의 방향성.
///
/// NEUTRAL은 알림 평가 시 BULLISH와 동일하게 취급됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    /// 상승 편향
    Bullish,
    /// 하락 편향
    Bearish,
    /// 중립 (BULLISH와 동일 규칙)
    Neutral,
}

impl Sentiment {
    /// 데이터베이스 저장용 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Bullish => "bullish",
            Sentiment::Bearish => "bearish",
            Sentiment::Neutral => "neutral",
        }
    }

    /// 뉴스레터 본문의 토큰에서 센티먼트를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않으며, 매칭 실패 시 None을 반환합니다.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_uppercase().as_str() {
            "BULLISH" => Some(Sentiment::Bullish),
            "BEARISH" => Some(Sentiment::Bearish),
            "NEUTRAL" => Some(Sentiment::Neutral),
            _ => None,
        }
    }

    /// 평가 규칙상 상승 편향으로 취급되는지 확인합니다.
    pub fn is_long_biased(&self) -> bool {
        matches!(self, Sentiment::Bullish | Sentiment::Neutral)
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sentiment::from_token(s).ok_or_else(|| format!("알 수 없는 센티먼트: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_token() {
        assert_eq!(Sentiment::from_token("BULLISH"), Some(Sentiment::Bullish));
        assert_eq!(Sentiment::from_token(" bearish "), Some(Sentiment::Bearish));
        assert_eq!(Sentiment::from_token("Neutral"), Some(Sentiment::Neutral));
        assert_eq!(Sentiment::from_token("SIDEWAYS"), None);
    }

    #[test]
    fn test_long_bias() {
        assert!(Sentiment::Bullish.is_long_biased());
        assert!(Sentiment::Neutral.is_long_biased());
        assert!(!Sentiment::Bearish.is_long_biased());
    }
}

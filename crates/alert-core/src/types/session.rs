//! 트레이딩 세션 정의.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 장중 평가 세션 (AM/PM).
///
/// AM 세션은 `am_price`, PM 세션은 `pm_price` 컬럼을 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradingSession {
    /// 오전 세션 (10:45 ET 실행)
    Am,
    /// 오후 세션 (14:30 ET 실행)
    Pm,
}

impl TradingSession {
    /// 데이터베이스 저장용 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingSession::Am => "AM",
            TradingSession::Pm => "PM",
        }
    }
}

impl fmt::Display for TradingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TradingSession {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "AM" => Ok(TradingSession::Am),
            "PM" => Ok(TradingSession::Pm),
            _ => Err(format!("알 수 없는 세션: {}", s)),
        }
    }
}

/// 하루를 구간으로 나눈 시장 세션 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketSession {
    /// 개장 전 (< 09:30 ET)
    Pre,
    /// 오전 구간 [09:30, 12:00)
    Am,
    /// 정오 구간 [12:00, 14:30)
    Mid,
    /// 오후 구간 [14:30, 16:30)
    Pm,
    /// 장 마감 후 (>= 16:30 ET)
    Post,
}

impl fmt::Display for MarketSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketSession::Pre => write!(f, "Pre"),
            MarketSession::Am => write!(f, "AM"),
            MarketSession::Mid => write!(f, "Mid"),
            MarketSession::Pm => write!(f, "PM"),
            MarketSession::Post => write!(f, "Post"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_parse() {
        assert_eq!("am".parse::<TradingSession>().unwrap(), TradingSession::Am);
        assert_eq!("PM".parse::<TradingSession>().unwrap(), TradingSession::Pm);
        assert!("midday".parse::<TradingSession>().is_err());
    }

    #[test]
    fn test_session_display() {
        assert_eq!(TradingSession::Am.to_string(), "AM");
        assert_eq!(MarketSession::Post.to_string(), "Post");
    }
}

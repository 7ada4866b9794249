//! 종목 및 추출 행 도메인 모델.

use crate::types::{Category, Sentiment, TradingSession};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 스토어에 저장되는 종목 행.
///
/// `(ticker, category)`가 고유 식별자입니다. 가격 필드가 없는 행도
/// 유효하지만 알림 평가 대상은 아닙니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    /// 정규화된 티커 (대문자, 1~20자)
    pub ticker: String,
    /// 뉴스레터 카테고리
    pub category: Category,
    /// 방향성
    pub sentiment: Option<Sentiment>,
    /// 매수 트리거 레벨
    pub buy_trade: Option<Decimal>,
    /// 매도 트리거 레벨
    pub sell_trade: Option<Decimal>,
    /// 오전 세션 가격
    pub am_price: Option<Decimal>,
    /// 오후 세션 가격
    pub pm_price: Option<Decimal>,
    /// 마지막 가격 갱신 시각 (UTC)
    pub last_price_update: Option<DateTime<Utc>>,
    /// 계약 디스크립터 캐시 (JSON)
    pub contract_descriptor: Option<serde_json::Value>,
    /// 계약 해석 완료 여부
    pub contract_resolved: bool,
}

impl Stock {
    /// 추출 행에서 새 종목을 생성합니다.
    pub fn from_extracted(row: &ExtractedRow) -> Self {
        Self {
            ticker: row.ticker.clone(),
            category: row.category,
            sentiment: Some(row.sentiment),
            buy_trade: Some(row.buy_trade),
            sell_trade: Some(row.sell_trade),
            am_price: None,
            pm_price: None,
            last_price_update: None,
            contract_descriptor: None,
            contract_resolved: false,
        }
    }

    /// 주어진 세션의 가격을 반환합니다.
    pub fn session_price(&self, session: TradingSession) -> Option<Decimal> {
        match session {
            TradingSession::Am => self.am_price,
            TradingSession::Pm => self.pm_price,
        }
    }

    /// 알림 평가 대상인지 확인합니다.
    ///
    /// 센티먼트와 두 임계값이 모두 있어야 합니다.
    pub fn is_evaluable(&self) -> bool {
        self.sentiment.is_some() && self.buy_trade.is_some() && self.sell_trade.is_some()
    }
}

/// 파서가 내보내는 추출 행.
///
/// 스토어 상의 식별자는 없으며 카테고리 단위 교체(reconciliation)의
/// 입력으로만 사용됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRow {
    /// 정규화된 티커
    pub ticker: String,
    /// 카테고리
    pub category: Category,
    /// 방향성
    pub sentiment: Sentiment,
    /// 매수 트리거 레벨
    pub buy_trade: Decimal,
    /// 매도 트리거 레벨
    pub sell_trade: Decimal,
    /// 원문상의 이름 (선택)
    pub raw_name: Option<String>,
}

impl ExtractedRow {
    /// 새 추출 행을 생성합니다.
    pub fn new(
        ticker: impl Into<String>,
        category: Category,
        sentiment: Sentiment,
        buy_trade: Decimal,
        sell_trade: Decimal,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            category,
            sentiment,
            buy_trade,
            sell_trade,
            raw_name: None,
        }
    }

    /// 원문 이름을 설정합니다.
    pub fn with_raw_name(mut self, name: impl Into<String>) -> Self {
        self.raw_name = Some(name.into());
        self
    }

    /// 행이 스토어 불변식을 만족하는지 검사합니다.
    ///
    /// 두 임계값은 음수가 될 수 없고, BULLISH/NEUTRAL 행은
    /// `buy_trade < sell_trade`를 만족해야 합니다. BEARISH 행은
    /// 발행사가 순서를 뒤집을 수 있으므로 순서 제약이 없습니다.
    pub fn validate(&self) -> Result<(), String> {
        if self.buy_trade.is_sign_negative() || self.sell_trade.is_sign_negative() {
            return Err(format!("{}: 음수 임계값", self.ticker));
        }
        if self.sentiment.is_long_biased() && self.buy_trade >= self.sell_trade {
            return Err(format!(
                "{}: buy {} >= sell {} ({})",
                self.ticker, self.buy_trade, self.sell_trade, self.sentiment
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(sentiment: Sentiment, buy: Decimal, sell: Decimal) -> ExtractedRow {
        ExtractedRow::new("AAPL", Category::Daily, sentiment, buy, sell)
    }

    #[test]
    fn test_validate_bullish_ordering() {
        assert!(row(Sentiment::Bullish, dec!(150), dec!(180)).validate().is_ok());
        assert!(row(Sentiment::Bullish, dec!(180), dec!(150)).validate().is_err());
        assert!(row(Sentiment::Neutral, dec!(150), dec!(150)).validate().is_err());
    }

    #[test]
    fn test_validate_bearish_inversion_allowed() {
        // BEARISH는 발행사가 순서를 뒤집을 수 있음
        assert!(row(Sentiment::Bearish, dec!(75), dec!(73)).validate().is_ok());
        assert!(row(Sentiment::Bearish, dec!(73), dec!(75)).validate().is_ok());
    }

    #[test]
    fn test_validate_negative() {
        assert!(row(Sentiment::Bullish, dec!(-1), dec!(5)).validate().is_err());
    }

    #[test]
    fn test_session_price() {
        let mut stock = Stock::from_extracted(&row(Sentiment::Bullish, dec!(150), dec!(180)));
        assert!(stock.is_evaluable());
        assert_eq!(stock.session_price(TradingSession::Am), None);

        stock.am_price = Some(dec!(149.50));
        assert_eq!(stock.session_price(TradingSession::Am), Some(dec!(149.50)));
        assert_eq!(stock.session_price(TradingSession::Pm), None);
    }
}

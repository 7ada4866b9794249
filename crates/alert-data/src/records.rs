//! 데이터베이스 레코드와 도메인 객체 간 변환.

use crate::error::{Result, StoreError};
use alert_core::{Category, Sentiment, Stock};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

/// stocks 테이블 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct StockRecord {
    pub ticker: String,
    pub category: String,
    pub sentiment: Option<String>,
    pub buy_trade: Option<Decimal>,
    pub sell_trade: Option<Decimal>,
    pub am_price: Option<Decimal>,
    pub pm_price: Option<Decimal>,
    pub last_price_update: Option<DateTime<Utc>>,
    pub contract_descriptor: Option<serde_json::Value>,
    pub contract_resolved: bool,
}

impl StockRecord {
    /// Stock 도메인 객체로 변환합니다.
    ///
    /// 알 수 없는 카테고리 값은 스토어 불변식 위반이므로 오류입니다.
    /// 알 수 없는 센티먼트는 None으로 강등되어 평가 대상에서 빠집니다.
    pub fn to_stock(&self) -> Result<Stock> {
        let category: Category = self
            .category
            .parse()
            .map_err(|e: String| StoreError::InvalidData(e))?;
        let sentiment = self
            .sentiment
            .as_deref()
            .and_then(Sentiment::from_token);

        Ok(Stock {
            ticker: self.ticker.clone(),
            category,
            sentiment,
            buy_trade: self.buy_trade,
            sell_trade: self.sell_trade,
            am_price: self.am_price,
            pm_price: self.pm_price,
            last_price_update: self.last_price_update,
            contract_descriptor: self.contract_descriptor.clone(),
            contract_resolved: self.contract_resolved,
        })
    }
}

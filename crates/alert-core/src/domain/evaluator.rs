//! 센티먼트 매트릭스 기반 알림 평가기.
//!
//! 규칙 표:
//!
//! | 센티먼트 | 조건 | 알림 |
//! |----------|------|------|
//! | BULLISH / NEUTRAL | `p <= buy_trade`  | BUY   |
//! | BULLISH / NEUTRAL | `p >= sell_trade` | SELL  |
//! | BEARISH           | `p >= sell_trade` | SHORT |
//! | BEARISH           | `p <= buy_trade`  | COVER |
//!
//! 규칙은 데이터(상수 테이블)로 정의되어 있어 정책 변경 시 코드 수정 없이
//! 테이블만 바꾸면 됩니다.

use crate::domain::{Alert, AlertKind, DedupRegistry, Stock};
use crate::types::{Sentiment, TradingSession};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// 임계값 비교 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// 가격이 임계값 이하
    AtOrBelow,
    /// 가격이 임계값 이상
    AtOrAbove,
}

impl Comparison {
    fn matches(&self, price: Decimal, threshold: Decimal) -> bool {
        match self {
            Comparison::AtOrBelow => price <= threshold,
            Comparison::AtOrAbove => price >= threshold,
        }
    }
}

/// 규칙이 참조하는 임계값 필드.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdField {
    BuyTrade,
    SellTrade,
}

/// 센티먼트 매트릭스의 한 행.
#[derive(Debug, Clone, Copy)]
pub struct MatrixRule {
    /// 규칙이 적용되는 센티먼트 (NEUTRAL은 BULLISH 규칙을 공유)
    pub long_biased: bool,
    /// 비교 방향
    pub comparison: Comparison,
    /// 참조 임계값
    pub field: ThresholdField,
    /// 트리거되는 알림 종류
    pub kind: AlertKind,
}

/// 센티먼트 매트릭스 전체.
pub const SENTIMENT_MATRIX: [MatrixRule; 4] = [
    MatrixRule {
        long_biased: true,
        comparison: Comparison::AtOrBelow,
        field: ThresholdField::BuyTrade,
        kind: AlertKind::Buy,
    },
    MatrixRule {
        long_biased: true,
        comparison: Comparison::AtOrAbove,
        field: ThresholdField::SellTrade,
        kind: AlertKind::Sell,
    },
    MatrixRule {
        long_biased: false,
        comparison: Comparison::AtOrAbove,
        field: ThresholdField::SellTrade,
        kind: AlertKind::Short,
    },
    MatrixRule {
        long_biased: false,
        comparison: Comparison::AtOrBelow,
        field: ThresholdField::BuyTrade,
        kind: AlertKind::Cover,
    },
];

/// 알림 평가기.
///
/// 순수 평가 로직과 세션 내 중복 제거를 결합합니다. 레지스트리는
/// 프로세스 전역으로 공유되며 호출자가 뮤텍스로 보호합니다.
#[derive(Debug, Default)]
pub struct AlertEvaluator {
    registry: DedupRegistry,
}

impl AlertEvaluator {
    /// 새 평가기를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 종목 집합을 평가하여 트리거된 알림 목록을 반환합니다.
    ///
    /// 해당 세션의 가격이 없는 행은 건너뜁니다. 결과는
    /// kind → category → ticker 오름차순으로 정렬됩니다. 이미 발송된
    /// 중복 키는 레지스트리가 억제합니다.
    pub fn evaluate(
        &mut self,
        stocks: &[Stock],
        session: TradingSession,
        trading_day: NaiveDate,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for stock in stocks {
            let Some(price) = stock.session_price(session) else {
                continue;
            };
            let (Some(sentiment), Some(buy), Some(sell)) =
                (stock.sentiment, stock.buy_trade, stock.sell_trade)
            else {
                continue;
            };

            // buy == sell 은 데이터 오류로 플래그 (평가는 계속 진행)
            if buy == sell {
                warn!(
                    ticker = %stock.ticker,
                    category = %stock.category,
                    threshold = %buy,
                    "buy_trade와 sell_trade가 동일함 (데이터 오류)"
                );
            }

            for rule in SENTIMENT_MATRIX {
                if rule.long_biased != sentiment.is_long_biased() {
                    continue;
                }
                let threshold = match rule.field {
                    ThresholdField::BuyTrade => buy,
                    ThresholdField::SellTrade => sell,
                };
                if !rule.comparison.matches(price, threshold) {
                    continue;
                }

                let alert = Alert {
                    ticker: stock.ticker.clone(),
                    category: stock.category,
                    kind: rule.kind,
                    price,
                    threshold,
                    sentiment,
                    session,
                    generated_at: Utc::now(),
                };

                if self.registry.try_fire(alert.dedup_key(trading_day)) {
                    debug!(
                        ticker = %alert.ticker,
                        kind = %alert.kind,
                        price = %alert.price,
                        threshold = %alert.threshold,
                        "알림 트리거"
                    );
                    alerts.push(alert);
                } else {
                    debug!(
                        ticker = %stock.ticker,
                        kind = %rule.kind,
                        "이미 발송된 알림, 억제"
                    );
                }
            }
        }

        alerts.sort_by(|a, b| {
            a.kind
                .cmp(&b.kind)
                .then(a.category.cmp(&b.category))
                .then(a.ticker.cmp(&b.ticker))
        });
        alerts
    }
}

/// 단일 종목에 대한 순수 평가 (중복 제거 없음).
///
/// 매트릭스 완전성 검사 등 테스트에서 사용합니다.
pub fn matching_kinds(
    sentiment: Sentiment,
    price: Decimal,
    buy: Decimal,
    sell: Decimal,
) -> Vec<AlertKind> {
    SENTIMENT_MATRIX
        .iter()
        .filter(|rule| rule.long_biased == sentiment.is_long_biased())
        .filter(|rule| {
            let threshold = match rule.field {
                ThresholdField::BuyTrade => buy,
                ThresholdField::SellTrade => sell,
            };
            rule.comparison.matches(price, threshold)
        })
        .map(|rule| rule.kind)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use rust_decimal_macros::dec;

    fn stock(
        ticker: &str,
        category: Category,
        sentiment: Sentiment,
        buy: Decimal,
        sell: Decimal,
        am: Option<Decimal>,
    ) -> Stock {
        Stock {
            ticker: ticker.to_string(),
            category,
            sentiment: Some(sentiment),
            buy_trade: Some(buy),
            sell_trade: Some(sell),
            am_price: am,
            pm_price: None,
            last_price_update: None,
            contract_descriptor: None,
            contract_resolved: false,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn test_bullish_buy() {
        // 시나리오: AAPL daily BULLISH buy=150 sell=180 am=149.50
        let stocks = vec![stock(
            "AAPL",
            Category::Daily,
            Sentiment::Bullish,
            dec!(150.00),
            dec!(180.00),
            Some(dec!(149.50)),
        )];
        let mut evaluator = AlertEvaluator::new();
        let alerts = evaluator.evaluate(&stocks, TradingSession::Am, day());

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Buy);
        assert_eq!(alerts[0].price, dec!(149.50));
        assert_eq!(alerts[0].threshold, dec!(150.00));
    }

    #[test]
    fn test_bearish_short() {
        // 시나리오: EWJ ideas BEARISH buy=73.65 sell=75.00 am=75.58
        let stocks = vec![stock(
            "EWJ",
            Category::Ideas,
            Sentiment::Bearish,
            dec!(73.65),
            dec!(75.00),
            Some(dec!(75.58)),
        )];
        let mut evaluator = AlertEvaluator::new();
        let alerts = evaluator.evaluate(&stocks, TradingSession::Am, day());

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Short);
        assert_eq!(alerts[0].threshold, dec!(75.00));
    }

    #[test]
    fn test_dedup_across_reruns() {
        let stocks = vec![stock(
            "AAPL",
            Category::Daily,
            Sentiment::Bullish,
            dec!(150.00),
            dec!(180.00),
            Some(dec!(149.50)),
        )];
        let mut evaluator = AlertEvaluator::new();

        let first = evaluator.evaluate(&stocks, TradingSession::Am, day());
        assert_eq!(first.len(), 1);

        // 동일 상태로 재실행하면 빈 결과
        let second = evaluator.evaluate(&stocks, TradingSession::Am, day());
        assert!(second.is_empty());
    }

    #[test]
    fn test_neutral_follows_bullish_rules() {
        let kinds = matching_kinds(Sentiment::Neutral, dec!(200), dec!(150), dec!(180));
        assert_eq!(kinds, vec![AlertKind::Sell]);

        let kinds = matching_kinds(Sentiment::Neutral, dec!(140), dec!(150), dec!(180));
        assert_eq!(kinds, vec![AlertKind::Buy]);
    }

    #[test]
    fn test_in_range_price_fires_nothing() {
        for sentiment in [Sentiment::Bullish, Sentiment::Bearish, Sentiment::Neutral] {
            let kinds = matching_kinds(sentiment, dec!(165), dec!(150), dec!(180));
            assert!(kinds.is_empty(), "{:?}", sentiment);
        }
    }

    #[test]
    fn test_bearish_inverted_thresholds_fire_both() {
        // BEARISH에서 buy > sell이 허용됨. 가격이 그 사이면 SHORT와 COVER 모두 발동.
        let kinds = matching_kinds(Sentiment::Bearish, dec!(74.00), dec!(75.00), dec!(73.00));
        assert_eq!(kinds, vec![AlertKind::Short, AlertKind::Cover]);
    }

    #[test]
    fn test_skips_rows_without_session_price() {
        let stocks = vec![stock(
            "MSFT",
            Category::Daily,
            Sentiment::Bullish,
            dec!(400),
            dec!(450),
            None,
        )];
        let mut evaluator = AlertEvaluator::new();
        assert!(evaluator.evaluate(&stocks, TradingSession::Am, day()).is_empty());
    }

    #[test]
    fn test_output_ordering() {
        let stocks = vec![
            stock("ZZZ", Category::Ideas, Sentiment::Bearish, dec!(10), dec!(20), Some(dec!(25))),
            stock("AAA", Category::Daily, Sentiment::Bullish, dec!(100), dec!(200), Some(dec!(90))),
            stock("BBB", Category::Daily, Sentiment::Bullish, dec!(50), dec!(80), Some(dec!(40))),
        ];
        let mut evaluator = AlertEvaluator::new();
        let alerts = evaluator.evaluate(&stocks, TradingSession::Pm, day());

        // 세션 가격이 PM이 아니므로 없음
        assert!(alerts.is_empty());

        let stocks: Vec<Stock> = stocks
            .into_iter()
            .map(|mut s| {
                s.pm_price = s.am_price;
                s
            })
            .collect();
        let alerts = evaluator.evaluate(&stocks, TradingSession::Pm, day());

        // BUY(AAA) < BUY(BBB) < SHORT(ZZZ)
        let order: Vec<(&str, AlertKind)> = alerts
            .iter()
            .map(|a| (a.ticker.as_str(), a.kind))
            .collect();
        assert_eq!(
            order,
            vec![
                ("AAA", AlertKind::Buy),
                ("BBB", AlertKind::Buy),
                ("ZZZ", AlertKind::Short),
            ]
        );
    }
}

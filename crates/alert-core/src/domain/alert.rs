//! 알림 레코드 및 세션 내 중복 제거.

use crate::types::{Category, Sentiment, TradingSession};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 알림 종류.
///
/// 정렬 순서는 다이제스트 출력 순서(kind → category → ticker)에 사용됩니다.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertKind {
    /// 매수 (BULLISH/NEUTRAL, 가격 <= buy_trade)
    Buy,
    /// 매도 (BULLISH/NEUTRAL, 가격 >= sell_trade)
    Sell,
    /// 공매도 진입 (BEARISH, 가격 >= sell_trade)
    Short,
    /// 공매도 청산 (BEARISH, 가격 <= buy_trade)
    Cover,
}

impl AlertKind {
    /// 표시용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Buy => "BUY",
            AlertKind::Sell => "SELL",
            AlertKind::Short => "SHORT",
            AlertKind::Cover => "COVER",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 트리거된 알림 (세션 내 append-only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// 티커
    pub ticker: String,
    /// 카테고리
    pub category: Category,
    /// 알림 종류
    pub kind: AlertKind,
    /// 트리거 시점 가격
    pub price: Decimal,
    /// 교차한 임계값
    pub threshold: Decimal,
    /// 종목의 센티먼트
    pub sentiment: Sentiment,
    /// 평가 세션
    pub session: TradingSession,
    /// 생성 시각 (UTC)
    pub generated_at: DateTime<Utc>,
}

impl Alert {
    /// 중복 제거 키를 반환합니다.
    pub fn dedup_key(&self, trading_day: NaiveDate) -> DedupKey {
        DedupKey {
            ticker: self.ticker.clone(),
            category: self.category,
            kind: self.kind,
            session: self.session,
            trading_day,
        }
    }
}

/// 알림 중복 제거 키: `(ticker, category, kind, session, trading_day)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub ticker: String,
    pub category: Category,
    pub kind: AlertKind,
    pub session: TradingSession,
    pub trading_day: NaiveDate,
}

/// 프로세스 수명 동안 유지되는 인메모리 중복 제거 레지스트리.
///
/// trading_day가 바뀌면 이전 키를 모두 비웁니다. 영속적인 중복 제거는
/// 명시적 non-goal이며, 프로세스 재시작 시 이미 발송된 알림이 다시
/// 활성화됩니다.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    current_day: Option<NaiveDate>,
    fired: HashSet<DedupKey>,
}

impl DedupRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 키를 등록하고, 처음 등록되면 true를 반환합니다.
    ///
    /// trading_day가 롤오버되면 기존 키를 먼저 비웁니다.
    pub fn try_fire(&mut self, key: DedupKey) -> bool {
        if self.current_day != Some(key.trading_day) {
            self.fired.clear();
            self.current_day = Some(key.trading_day);
        }
        self.fired.insert(key)
    }

    /// 현재 등록된 키 수.
    pub fn len(&self) -> usize {
        self.fired.len()
    }

    /// 레지스트리가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }
}

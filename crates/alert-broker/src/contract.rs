//! 계약 해석기.
//!
//! `(ticker, category)`를 상품 종류로 분류하고 게이트웨이 라우팅
//! 정보가 담긴 디스크립터를 만듭니다. 분류 우선순위:
//!
//! 1. 명시적 오버라이드 (예: digitalassets의 MSTR은 주식)
//! 2. 카테고리 기본값 (etfs → ETF, digitalassets → 크립토)
//! 3. 심볼 패턴 휴리스틱 (`=F` 선물, `^` 지수, `-USD` 크립토)
//!
//! 디스크립터는 스토어를 통해 캐시되며, 캐시는 해당 행이
//! `replace_category`로 삭제될 때만 무효화됩니다.

use alert_core::Category;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// 상품 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstrumentKind {
    /// 일반 주식
    Stock,
    /// 상장지수펀드
    Etf,
    /// 암호화폐
    Crypto,
    /// 선물
    Future,
    /// 지수
    Index,
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentKind::Stock => write!(f, "STOCK"),
            InstrumentKind::Etf => write!(f, "ETF"),
            InstrumentKind::Crypto => write!(f, "CRYPTO"),
            InstrumentKind::Future => write!(f, "FUTURE"),
            InstrumentKind::Index => write!(f, "INDEX"),
        }
    }
}

/// 게이트웨이에 전달되는 계약 디스크립터.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDescriptor {
    /// 상품 종류
    pub kind: InstrumentKind,
    /// 게이트웨이용 심볼 변형 (접두/접미사 제거 후)
    pub symbol: String,
    /// 거래소 라우팅 힌트
    pub exchange: String,
    /// 호가 통화
    pub currency: String,
}

impl ContractDescriptor {
    /// JSON 값으로 직렬화합니다 (스토어 캐시용).
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("디스크립터 직렬화 실패")
    }

    /// JSON 값에서 복원합니다.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// digitalassets 카테고리에서도 일반 주식으로 취급하는 오버라이드.
static CRYPTO_STOCK_OVERRIDES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "IBIT", "BITO", "ETHA", "BLOK", "MSTR", "MARA", "RIOT", "COIN", "CLSK", "HUT", "BITF",
    ])
});

/// 계약 해석기.
pub struct ContractResolver;

impl ContractResolver {
    /// `(ticker, category)`를 상품 종류로 분류합니다.
    pub fn classify(ticker: &str, category: Category) -> InstrumentKind {
        let ticker = ticker.to_uppercase();

        // 1. 명시적 오버라이드
        if CRYPTO_STOCK_OVERRIDES.contains(ticker.as_str()) {
            return InstrumentKind::Stock;
        }
        if ticker.ends_with("-USD") {
            return InstrumentKind::Crypto;
        }

        // 2. 카테고리 기본값
        match category {
            Category::Etfs => return InstrumentKind::Etf,
            Category::DigitalAssets => return InstrumentKind::Crypto,
            _ => {}
        }

        // 3. 심볼 패턴 휴리스틱
        if ticker.ends_with("=F") {
            InstrumentKind::Future
        } else if ticker.starts_with('^') {
            InstrumentKind::Index
        } else {
            InstrumentKind::Stock
        }
    }

    /// 디스크립터를 생성합니다.
    pub fn descriptor(ticker: &str, category: Category) -> ContractDescriptor {
        let upper = ticker.to_uppercase();
        let kind = Self::classify(&upper, category);

        match kind {
            InstrumentKind::Stock | InstrumentKind::Etf => ContractDescriptor {
                kind,
                symbol: upper,
                exchange: "SMART".to_string(),
                currency: "USD".to_string(),
            },
            InstrumentKind::Crypto => ContractDescriptor {
                kind,
                symbol: upper.trim_end_matches("-USD").to_string(),
                exchange: "PAXOS".to_string(),
                currency: "USD".to_string(),
            },
            InstrumentKind::Future => ContractDescriptor {
                kind,
                symbol: upper.trim_end_matches("=F").to_string(),
                exchange: "CME".to_string(),
                currency: "USD".to_string(),
            },
            InstrumentKind::Index => ContractDescriptor {
                kind,
                symbol: upper.trim_start_matches('^').to_string(),
                exchange: "CBOE".to_string(),
                currency: "USD".to_string(),
            },
        }
    }
}

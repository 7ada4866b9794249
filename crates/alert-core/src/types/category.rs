//! 뉴스레터 카테고리 정의.
//!
//! 카테고리는 파서, 스케줄, 카테고리 단위 교체(replace)의 범위를 결정합니다.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 뉴스레터 카테고리.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// 일간 RISK RANGE 시그널
    Daily,
    /// 크립토 QUANT 시그널 (이미지 OCR 기반)
    DigitalAssets,
    /// ETF 레벨 (주간)
    Etfs,
    /// 투자 아이디어 (주간)
    Ideas,
}

impl Category {
    /// 전체 카테고리 목록.
    pub const ALL: [Category; 4] = [
        Category::Daily,
        Category::DigitalAssets,
        Category::Etfs,
        Category::Ideas,
    ];

    /// 데이터베이스 저장용 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Daily => "daily",
            Category::DigitalAssets => "digitalassets",
            Category::Etfs => "etfs",
            Category::Ideas => "ideas",
        }
    }

    /// 카테고리별 메일 제목 검색 질의.
    ///
    /// 조회 기간 내 가장 최근 메시지 하나를 선택하는 데 사용합니다.
    pub fn subject_query(&self) -> &'static str {
        match self {
            Category::Daily => "RISK RANGE",
            Category::DigitalAssets => "CRYPTO QUANT",
            Category::Etfs => "ETF Pro Plus - Levels",
            Category::Ideas => "Investing Ideas Newsletter",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Category::Daily),
            "digitalassets" | "crypto" => Ok(Category::DigitalAssets),
            "etfs" | "etf" => Ok(Category::Etfs),
            "ideas" => Ok(Category::Ideas),
            _ => Err(format!("알 수 없는 카테고리: {}", s)),
        }
    }
}

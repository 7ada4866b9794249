//! 브로커 게이트웨이 연동.
//!
//! 이 crate는 다음을 제공합니다:
//! - `(ticker, category)` → 계약 디스크립터 해석 (오버라이드 → 카테고리
//!   기본값 → 심볼 패턴 휴리스틱)
//! - 게이트웨이 스냅샷 시세 클라이언트 (단일 영속 연결)
//! - 페이싱/동시성 제한이 적용된 일괄 가격 조회기

pub mod contract;
pub mod error;
pub mod fetcher;
pub mod gateway;

pub use contract::{ContractDescriptor, ContractResolver, InstrumentKind};
pub use error::{BrokerError, Result};
pub use fetcher::{PriceFetcher, PriceOutcome, PriceRequest, PriceResult};
pub use gateway::{QuoteGateway, RawQuote, TcpGateway};

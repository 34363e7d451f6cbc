//! Daily ranking rewards: batch processing and claiming.

pub mod claims;
pub mod processor;

pub use claims::RankingClaims;
pub use processor::RankingProcessor;

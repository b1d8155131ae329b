pub mod analyzer;
pub mod contract;

pub mod contract;
pub mod fixtures;

pub mod migrate;
pub mod storage;

pub mod dedup;
pub mod filter;

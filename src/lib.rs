pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logs;
pub mod ops;
pub mod parse;
pub mod planner;
pub mod probe;
pub mod transfer;
pub mod trie;
pub mod util;
pub mod validate;

pub use error::RemigrateError;

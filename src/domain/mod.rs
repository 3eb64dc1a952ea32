//! Core domain types and logic.

pub mod snapshot;
pub mod price;
pub mod condition;
pub mod condition_eval;
pub mod condition_parser;
pub mod scoring;
pub mod risk;
pub mod strategy;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod exit;
pub mod backtest;
pub mod metrics;
pub mod query;
pub mod screener;
pub mod forward;
pub mod config_validation;
pub mod error;

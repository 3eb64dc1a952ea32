//! Risk settings: sizing, costs, hard stops and entry gates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::SigtraderError;

/// Stop-loss applied in scoring mode when none is configured.
pub const DEFAULT_STOP_LOSS_PCT: f64 = 0.02;
/// Take-profit applied in scoring mode when none is configured.
pub const DEFAULT_TAKE_PROFIT_PCT: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSizeMode {
    /// A fixed currency amount per order.
    #[default]
    FixedNotional,
    /// A fraction (0, 1] of current equity per order.
    PercentOfEquity,
}

impl FromStr for OrderSizeMode {
    type Err = SigtraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed_notional" | "fixed_usdt" | "fixed" => Ok(OrderSizeMode::FixedNotional),
            "percent_of_equity" | "percent" => Ok(OrderSizeMode::PercentOfEquity),
            other => Err(SigtraderError::validation(format!(
                "unsupported order size mode '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for OrderSizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSizeMode::FixedNotional => write!(f, "fixed_notional"),
            OrderSizeMode::PercentOfEquity => write!(f, "percent_of_equity"),
        }
    }
}

/// Which bar's price fills an order decided on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceMode {
    CurrentClose,
    #[default]
    NextOpen,
    NextClose,
}

impl FromStr for PriceMode {
    type Err = SigtraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current_close" => Ok(PriceMode::CurrentClose),
            "next_open" => Ok(PriceMode::NextOpen),
            "next_close" => Ok(PriceMode::NextClose),
            other => Err(SigtraderError::validation(format!(
                "unsupported price mode '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for PriceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceMode::CurrentClose => write!(f, "current_close"),
            PriceMode::NextOpen => write!(f, "next_open"),
            PriceMode::NextClose => write!(f, "next_close"),
        }
    }
}

/// Percentages are fractions: `0.001` is 0.1%.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSettings {
    pub order_size_mode: OrderSizeMode,
    pub order_size_value: f64,
    pub fees_pct: f64,
    pub slippage_pct: f64,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    pub max_daily_loss_pct: Option<f64>,
    pub cooldown_days: u32,
    pub min_hold_days: u32,
    pub max_positions: u32,
    pub price_mode: PriceMode,
}

impl Default for RiskSettings {
    fn default() -> Self {
        RiskSettings {
            order_size_mode: OrderSizeMode::FixedNotional,
            order_size_value: 1000.0,
            fees_pct: 0.001,
            slippage_pct: 0.001,
            stop_loss_pct: None,
            take_profit_pct: None,
            max_daily_loss_pct: None,
            cooldown_days: 0,
            min_hold_days: 0,
            max_positions: 1,
            price_mode: PriceMode::NextOpen,
        }
    }
}

impl RiskSettings {
    /// Zero fees, zero slippage, same-day close fills.
    pub fn frictionless() -> Self {
        RiskSettings {
            fees_pct: 0.0,
            slippage_pct: 0.0,
            price_mode: PriceMode::CurrentClose,
            ..RiskSettings::default()
        }
    }

    pub fn validate(&self) -> Result<(), SigtraderError> {
        if !(self.order_size_value > 0.0) || !self.order_size_value.is_finite() {
            return Err(SigtraderError::validation(
                "order_size_value must be a positive number",
            ));
        }
        if self.order_size_mode == OrderSizeMode::PercentOfEquity && self.order_size_value > 1.0 {
            return Err(SigtraderError::validation(
                "percent_of_equity order size must be a fraction no greater than 1",
            ));
        }
        if self.fees_pct < 0.0 || !self.fees_pct.is_finite() {
            return Err(SigtraderError::validation("fees_pct must be non-negative"));
        }
        if self.slippage_pct < 0.0 || !self.slippage_pct.is_finite() {
            return Err(SigtraderError::validation(
                "slippage_pct must be non-negative",
            ));
        }
        for (name, value) in [
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
            ("max_daily_loss_pct", self.max_daily_loss_pct),
        ] {
            if let Some(v) = value {
                if !(v > 0.0) || !v.is_finite() {
                    return Err(SigtraderError::validation(format!(
                        "{} must be positive when set",
                        name
                    )));
                }
            }
        }
        if self.max_positions < 1 {
            return Err(SigtraderError::validation("max_positions must be at least 1"));
        }
        Ok(())
    }

    /// Currency amount to commit to a new order at the given equity.
    pub fn order_notional(&self, equity: f64) -> f64 {
        match self.order_size_mode {
            OrderSizeMode::FixedNotional => self.order_size_value,
            OrderSizeMode::PercentOfEquity => equity * self.order_size_value,
        }
    }
}

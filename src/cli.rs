//! CLI definition and dispatch.
//!
//! Every command follows the same pipeline: load the INI config, validate the
//! raw values, build domain objects, run the library call, then print a
//! summary to stderr. Machine-readable output (run-once records) goes to
//! stdout.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use tracing::{info, warn};

use crate::adapters::csv_adapter::{self, CsvAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult, Environment};
use crate::domain::condition::ConditionSet;
use crate::domain::condition_parser;
use crate::domain::config_validation::{
    non_empty, parse_date, parse_horizons, parse_optional, parse_optional_date, require,
    validate_backtest_config, validate_data_config, validate_screener_config,
    validate_strategy_config,
};
use crate::domain::error::SigtraderError;
use crate::domain::forward::{self, ForwardStudy, DEFAULT_HORIZONS};
use crate::domain::query::{Pagination, SortOption};
use crate::domain::risk::{OrderSizeMode, PriceMode, RiskSettings};
use crate::domain::scoring::{RuleKind, Scorer, ScoringRule};
use crate::domain::screener::{self, Screener};
use crate::domain::snapshot::{AnalyticsSnapshot, NumericField};
use crate::domain::strategy::{ScoringRules, Signals, Strategy};
use crate::logging::LogFormat;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_INITIAL_EQUITY: f64 = 10_000.0;
pub const DEFAULT_TRADES_FILE: &str = "trades.csv";

#[derive(Parser, Debug)]
#[command(name = "sigtrader", about = "Strategy backtester and cross-section screener")]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest and write trades plus the equity curve as CSV
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Screen all symbols on one date
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        preset: Option<String>,
    },
    /// Forward returns after each entry signal
    Forward {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: Option<PathBuf>,
    },
    /// Evaluate a strategy for a single day and emit live trade records
    RunOnce {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: Option<PathBuf>,
        #[arg(long)]
        env: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Validate a strategy configuration
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            strategy,
            output,
        } => run_backtest(&config, strategy.as_deref(), output.as_deref()),
        Command::Screen {
            config,
            date,
            preset,
        } => run_screen(&config, date, preset.as_deref()),
        Command::Forward { config, strategy } => run_forward(&config, strategy.as_deref()),
        Command::RunOnce {
            config,
            strategy,
            env,
            date,
        } => run_once(&config, strategy.as_deref(), &env, date),
        Command::Validate { strategy } => run_validate(&strategy),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, SigtraderError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

/// Strategy from `strategy_path` when given, else from the main config.
fn resolve_strategy(
    config: &FileConfigAdapter,
    strategy_path: Option<&Path>,
) -> Result<Strategy, SigtraderError> {
    let strategy = match strategy_path {
        Some(path) => {
            eprintln!("Loading strategy from {}", path.display());
            let adapter = FileConfigAdapter::from_file(path)?;
            validate_strategy_config(&adapter)?;
            build_strategy(&adapter)?
        }
        None => {
            validate_strategy_config(config)?;
            build_strategy(config)?
        }
    };
    eprintln!("Loading strategy: {} ({})", strategy.name, strategy.symbol);
    Ok(strategy)
}

pub fn build_data_adapter(adapter: &dyn ConfigPort) -> Result<CsvAdapter, SigtraderError> {
    let path = require(adapter, "data", "path")?;
    Ok(CsvAdapter::new(PathBuf::from(path)))
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, SigtraderError> {
    Ok(BacktestConfig {
        start_date: parse_date(adapter, "backtest", "start_date")?,
        end_date: parse_date(adapter, "backtest", "end_date")?,
        initial_equity: parse_optional(adapter, "backtest", "initial_equity")?
            .unwrap_or(DEFAULT_INITIAL_EQUITY),
    })
}

pub fn build_horizons(adapter: &dyn ConfigPort) -> Result<Vec<usize>, SigtraderError> {
    match non_empty(adapter, "backtest", "horizons") {
        Some(raw) => parse_horizons(&raw),
        None => Ok(DEFAULT_HORIZONS.to_vec()),
    }
}

/// `[risk]` over the defaults. Only keys present in the file override.
pub fn build_risk_settings(adapter: &dyn ConfigPort) -> Result<RiskSettings, SigtraderError> {
    let defaults = RiskSettings::default();
    Ok(RiskSettings {
        order_size_mode: parse_optional::<OrderSizeMode>(adapter, "risk", "order_size_mode")?
            .unwrap_or(defaults.order_size_mode),
        order_size_value: parse_optional(adapter, "risk", "order_size_value")?
            .unwrap_or(defaults.order_size_value),
        fees_pct: parse_optional(adapter, "risk", "fees_pct")?.unwrap_or(defaults.fees_pct),
        slippage_pct: parse_optional(adapter, "risk", "slippage_pct")?
            .unwrap_or(defaults.slippage_pct),
        stop_loss_pct: parse_optional(adapter, "risk", "stop_loss_pct")?
            .or(defaults.stop_loss_pct),
        take_profit_pct: parse_optional(adapter, "risk", "take_profit_pct")?
            .or(defaults.take_profit_pct),
        max_daily_loss_pct: parse_optional(adapter, "risk", "max_daily_loss_pct")?
            .or(defaults.max_daily_loss_pct),
        cooldown_days: parse_optional(adapter, "risk", "cooldown_days")?
            .unwrap_or(defaults.cooldown_days),
        min_hold_days: parse_optional(adapter, "risk", "min_hold_days")?
            .unwrap_or(defaults.min_hold_days),
        max_positions: parse_optional(adapter, "risk", "max_positions")?
            .unwrap_or(defaults.max_positions),
        price_mode: parse_optional::<PriceMode>(adapter, "risk", "price_mode")?
            .unwrap_or(defaults.price_mode),
    })
}

fn parse_conditions(adapter: &dyn ConfigPort, key: &str) -> Result<ConditionSet, SigtraderError> {
    let raw = require(adapter, "strategy", key)?;
    condition_parser::parse(&raw).map_err(|e| {
        eprintln!("error: failed to parse {}:\n{}", key, e.display_with_context(&raw));
        e.into()
    })
}

fn parse_rule_list(
    adapter: &dyn ConfigPort,
    key: &str,
    kind: RuleKind,
) -> Result<Vec<ScoringRule>, SigtraderError> {
    let raw = non_empty(adapter, "strategy", key).unwrap_or_default();
    condition_parser::parse_rules(&raw, kind).map_err(|e| {
        eprintln!("error: failed to parse {}:\n{}", key, e.display_with_context(&raw));
        e.into()
    })
}

/// Build and validate a strategy from `[strategy]` and `[risk]`.
pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<Strategy, SigtraderError> {
    let name = require(adapter, "strategy", "name")?;
    let symbol = require(adapter, "strategy", "symbol")?;
    let description = non_empty(adapter, "strategy", "description").unwrap_or_default();
    let mode = non_empty(adapter, "strategy", "mode").unwrap_or_else(|| "conditions".to_string());

    let signals = match mode.to_ascii_lowercase().as_str() {
        "scoring" => Signals::Scoring(ScoringRules {
            entry_rules: parse_rule_list(adapter, "entry_rules", RuleKind::Entry)?,
            exit_rules: parse_rule_list(adapter, "exit_rules", RuleKind::Exit)?,
            entry_threshold: require(adapter, "strategy", "entry_threshold")?
                .parse()
                .map_err(|_| SigtraderError::ConfigInvalid {
                    section: "strategy".into(),
                    key: "entry_threshold".into(),
                    reason: "entry_threshold must be a number".into(),
                })?,
            exit_threshold: parse_optional(adapter, "strategy", "exit_threshold")?.unwrap_or(0.0),
        }),
        "conditions" => Signals::Conditions {
            buy: parse_conditions(adapter, "buy")?,
            sell: parse_conditions(adapter, "sell")?,
        },
        other => {
            return Err(SigtraderError::ConfigInvalid {
                section: "strategy".into(),
                key: "mode".into(),
                reason: format!("unknown mode '{}' (expected conditions or scoring)", other),
            });
        }
    };

    let strategy = Strategy {
        name,
        description,
        symbol,
        signals,
        risk: build_risk_settings(adapter)?,
    };
    strategy.validate()?;
    Ok(strategy)
}

/// A fully resolved screen, from a preset or from `[screener]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenRequest {
    pub label: String,
    pub date: NaiveDate,
    pub conditions: ConditionSet,
    pub sort: SortOption,
    pub page: Pagination,
    /// Consecutive matching days required; 1 disables the check.
    pub streak_days: usize,
}

pub fn build_screen(
    adapter: &dyn ConfigPort,
    date_override: Option<NaiveDate>,
    preset_override: Option<&str>,
) -> Result<ScreenRequest, SigtraderError> {
    let date = match date_override {
        Some(d) => d,
        None => parse_optional_date(adapter, "screener", "date")?.ok_or_else(|| {
            SigtraderError::ConfigMissing {
                section: "screener".into(),
                key: "date".into(),
            }
        })?,
    };
    let page = Pagination::new(
        parse_optional(adapter, "screener", "offset")?.unwrap_or(0),
        parse_optional(adapter, "screener", "limit")?.unwrap_or(0),
    );
    let streak_days = parse_optional(adapter, "screener", "streak_days")?.unwrap_or(1);

    let preset_id = preset_override
        .map(str::to_string)
        .or_else(|| non_empty(adapter, "screener", "preset"));
    if let Some(id) = preset_id {
        let preset = screener::preset(&id, date).ok_or_else(|| SigtraderError::ConfigInvalid {
            section: "screener".into(),
            key: "preset".into(),
            reason: format!("unknown preset '{}'", id),
        })?;
        return Ok(ScreenRequest {
            label: preset.name.to_string(),
            date: preset.date,
            conditions: preset.conditions,
            sort: preset.sort,
            page,
            streak_days,
        });
    }

    let conditions = match non_empty(adapter, "screener", "conditions") {
        Some(raw) => condition_parser::parse(&raw).map_err(|e| {
            eprintln!(
                "error: failed to parse conditions:\n{}",
                e.display_with_context(&raw)
            );
            SigtraderError::from(e)
        })?,
        None => ConditionSet::all(Vec::new()),
    };
    let sort = match non_empty(adapter, "screener", "sort") {
        Some(field) => SortOption {
            field: NumericField::from_name(&field),
            descending: adapter.get_bool("screener", "desc", true),
        },
        None => SortOption::default(),
    };

    Ok(ScreenRequest {
        label: "custom".to_string(),
        date,
        conditions,
        sort,
        page,
        streak_days,
    })
}

/// `trades.csv` -> `trades_equity.csv`, next to it.
pub fn equity_curve_path(trades_path: &Path) -> PathBuf {
    let stem = trades_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "trades".to_string());
    trades_path.with_file_name(format!("{}_equity.csv", stem))
}

fn run_backtest(
    config_path: &Path,
    strategy_path: Option<&Path>,
    output_path: Option<&Path>,
) -> Result<(), SigtraderError> {
    let adapter = load_config(config_path)?;
    validate_data_config(&adapter)?;
    validate_backtest_config(&adapter)?;

    let strategy = resolve_strategy(&adapter, strategy_path)?;
    let bt_config = build_backtest_config(&adapter)?;
    let data = build_data_adapter(&adapter)?;

    let (history, prices) = backtest_engine::load_inputs(
        &data,
        &data,
        &strategy.symbol,
        bt_config.start_date,
        bt_config.end_date,
    )?;
    eprintln!(
        "Running backtest: {} to {}, {} snapshots, {} price bars",
        bt_config.start_date,
        bt_config.end_date,
        history.len(),
        prices.len()
    );

    let result =
        backtest_engine::run_backtest(&strategy, &bt_config, &history, &prices, &Scorer::default())?;
    print_backtest_summary(&strategy, &bt_config, &result);

    let trades_path = output_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TRADES_FILE));
    let equity_path = equity_curve_path(&trades_path);
    csv_adapter::write_trades(&trades_path, &result.trades)?;
    csv_adapter::write_equity_curve(&equity_path, &result.equity_curve)?;
    eprintln!("\nTrades written to: {}", trades_path.display());
    eprintln!("Equity curve written to: {}", equity_path.display());
    Ok(())
}

fn print_backtest_summary(strategy: &Strategy, config: &BacktestConfig, result: &BacktestResult) {
    let stats = &result.stats;
    eprintln!("\n=== Backtest Results ===");
    eprintln!("Strategy:         {} ({})", strategy.name, strategy.symbol);
    eprintln!("Period:           {} to {}", config.start_date, config.end_date);
    eprintln!("Initial Equity:   {:.2}", config.initial_equity);
    if let Some(last) = result.equity_curve.last() {
        eprintln!("Final Equity:     {:.2}", last.equity);
    }
    eprintln!("Total Return:     {:.2}%", stats.total_return * 100.0);
    eprintln!("Max Drawdown:     -{:.1}%", stats.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", stats.trade_count);
    eprintln!("Win Rate:         {:.1}%", stats.win_rate * 100.0);
    eprintln!("Avg Gain:         {:.2}", stats.avg_gain);
    eprintln!("Avg Loss:         {:.2}", stats.avg_loss);
    match stats.profit_factor {
        Some(pf) => eprintln!("Profit Factor:    {:.2}", pf),
        None => eprintln!("Profit Factor:    n/a"),
    }
    eprintln!("Avg Hold Days:    {:.1}", stats.avg_hold_days);
    eprintln!("Largest Win:      {:.2}", stats.largest_win);
    eprintln!("Largest Loss:     {:.2}", stats.largest_loss);
    if let Some(position) = &result.open_position {
        eprintln!(
            "Open Position:    {:.4} @ {:.4} since {}",
            position.quantity, position.entry_price, position.entry_date
        );
    }
}

fn run_screen(
    config_path: &Path,
    date: Option<NaiveDate>,
    preset: Option<&str>,
) -> Result<(), SigtraderError> {
    let adapter = load_config(config_path)?;
    validate_data_config(&adapter)?;
    validate_screener_config(&adapter)?;

    let request = build_screen(&adapter, date, preset)?;
    let data = build_data_adapter(&adapter)?;
    let screener = Screener::new(&data);

    eprintln!("Screening {} on {}: {}", request.label, request.date, request.conditions);
    let page = screener.run(request.date, &request.conditions, &request.sort, request.page)?;
    let results = screener.confirm_streak(
        page.results,
        request.date,
        &request.conditions,
        request.streak_days,
    )?;
    info!(
        date = %request.date,
        total = page.total,
        shown = results.len(),
        "screen finished"
    );

    print_screen_table(&results, &request.sort);
    eprintln!(
        "\n{} shown of {} matches{}",
        results.len(),
        page.total,
        if page.has_more { " (more available)" } else { "" }
    );
    Ok(())
}

fn print_screen_table(results: &[AnalyticsSnapshot], sort: &SortOption) {
    eprintln!("\n=== Screener Results ===");
    eprintln!(
        "{:<10} {:<8} {:>10} {:>8} {:>14}",
        "Symbol",
        "Market",
        "Close",
        "Score",
        sort.field.name()
    );
    for snapshot in results {
        let sort_value = snapshot
            .value(&sort.field)
            .map(|v| format!("{:.4}", v))
            .unwrap_or_else(|| "-".to_string());
        eprintln!(
            "{:<10} {:<8} {:>10.2} {:>8.1} {:>14}",
            snapshot.symbol, snapshot.market, snapshot.close, snapshot.score, sort_value
        );
    }
}

fn run_forward(config_path: &Path, strategy_path: Option<&Path>) -> Result<(), SigtraderError> {
    let adapter = load_config(config_path)?;
    validate_data_config(&adapter)?;
    validate_backtest_config(&adapter)?;

    let strategy = resolve_strategy(&adapter, strategy_path)?;
    let bt_config = build_backtest_config(&adapter)?;
    let horizons = build_horizons(&adapter)?;
    let data = build_data_adapter(&adapter)?;

    let (history, _) = backtest_engine::load_inputs(
        &data,
        &data,
        &strategy.symbol,
        bt_config.start_date,
        bt_config.end_date,
    )?;
    let study = forward::run_forward_study(&history, &strategy, &Scorer::default(), &horizons)?;
    print_forward_summary(&strategy, &study);
    Ok(())
}

fn print_forward_summary(strategy: &Strategy, study: &ForwardStudy) {
    eprintln!("\n=== Forward Study ===");
    eprintln!("Strategy:         {} ({})", strategy.name, strategy.symbol);
    eprintln!("Days:             {}", study.events.len());
    eprintln!("Triggered:        {}", study.triggered);
    eprintln!("Simulated trades: {}", study.summary.total_trades);
    eprintln!("Compounded:       {:.2}%", study.summary.total_return * 100.0);
    eprintln!("Trade win rate:   {:.1}%", study.summary.win_rate * 100.0);
    if study.stats.is_empty() {
        eprintln!("No horizon has a complete sample.");
        return;
    }
    eprintln!("\n{:>8} {:>8} {:>12} {:>10}", "Horizon", "Samples", "Avg Return", "Win Rate");
    for stats in &study.stats {
        eprintln!(
            "{:>8} {:>8} {:>11.2}% {:>9.1}%",
            stats.horizon,
            stats.samples,
            stats.avg_return * 100.0,
            stats.win_rate * 100.0
        );
    }
}

fn run_once(
    config_path: &Path,
    strategy_path: Option<&Path>,
    env: &str,
    date: Option<NaiveDate>,
) -> Result<(), SigtraderError> {
    let env = Environment::from_str(env)?;
    let adapter = load_config(config_path)?;
    validate_data_config(&adapter)?;

    let strategy = resolve_strategy(&adapter, strategy_path)?;
    let data = build_data_adapter(&adapter)?;
    let today = date.unwrap_or_else(|| chrono::Local::now().date_naive());
    if env == Environment::Real {
        warn!(strategy = %strategy.name, "records are tagged for the real environment");
    }

    let records = backtest_engine::run_once(
        &strategy,
        &data,
        &data,
        &Scorer::default(),
        today,
        env,
    )?;
    for record in &records {
        let line = serde_json::to_string(record).map_err(|e| SigtraderError::Data {
            reason: format!("failed to encode trade record: {}", e),
        })?;
        println!("{}", line);
    }
    eprintln!("{} trade record(s) for {} on {} [{}]", records.len(), strategy.symbol, today, env);
    Ok(())
}

fn run_validate(strategy_path: &Path) -> Result<(), SigtraderError> {
    eprintln!("Validating strategy: {}", strategy_path.display());
    let adapter = FileConfigAdapter::from_file(strategy_path)?;
    validate_strategy_config(&adapter)?;
    let strategy = build_strategy(&adapter)?;

    eprintln!("\nStrategy: {} ({})", strategy.name, strategy.symbol);
    match &strategy.signals {
        Signals::Conditions { buy, sell } => {
            eprintln!("  Buy:  {}", buy);
            eprintln!("  Sell: {}", sell);
        }
        Signals::Scoring(rules) => {
            eprintln!("  Entry threshold: {}", rules.entry_threshold);
            for rule in &rules.entry_rules {
                eprintln!("    {}", rule);
            }
            eprintln!("  Exit threshold:  {}", rules.exit_threshold);
            for rule in &rules.exit_rules {
                eprintln!("    {}", rule);
            }
        }
    }
    let (stop_loss, take_profit) = strategy.hard_stops();
    eprintln!(
        "  Risk: {} {} per order, stop-loss {}, take-profit {}, price mode {}",
        strategy.risk.order_size_mode,
        strategy.risk.order_size_value,
        stop_loss.map_or("none".to_string(), |v| format!("{}", v)),
        take_profit.map_or("none".to_string(), |v| format!("{}", v)),
        strategy.risk.price_mode
    );

    eprintln!("\nStrategy configuration is valid.");
    Ok(())
}

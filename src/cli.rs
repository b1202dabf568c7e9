//! CLI definition and dispatch.

use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::adapters::csv_adapter::CsvBarAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::analytics::{self, ReportingPeriod};
use crate::domain::error::SimError;
use crate::domain::rule::TradeRule;
use crate::domain::rule_parser;
use crate::domain::series::{BarRequest, BarStore};
use crate::domain::simulation::{
    Frequency, RunSummary, Simulation, SimulationConfig, TickRecord, tracked_symbols,
};
use crate::ports::config_port::ConfigPort;
use crate::runner::{RunRegistry, RunStatus};

#[derive(Parser, Debug)]
#[command(name = "portsim", about = "Rule-driven portfolio simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulation and print each tick plus a final summary
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory of per-symbol CSV bar files
        #[arg(short, long)]
        data: PathBuf,
    },
    /// Run a simulation and print only the performance report
    Report {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory of per-symbol CSV bar files
        #[arg(short, long)]
        data: PathBuf,
    },
    /// Parse trade rule text and echo the parsed rules
    CheckRules {
        #[arg(short, long)]
        rules: String,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Simulate { config, data } => run_simulate(&config, &data),
        Command::Report { config, data } => run_report(&config, &data),
        Command::CheckRules { rules } => run_check_rules(&rules),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = SimError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn run_simulate(config_path: &PathBuf, data_path: &PathBuf) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Build simulation config
    let sim_config = match build_simulation_config(&adapter) {
        Ok(c) => c,
        Err(code) => return code,
    };

    // Stage 3: Load bar data, narrowed to the simulation window
    let store = match load_bars(data_path, &sim_config) {
        Ok(s) => s,
        Err(code) => return code,
    };

    // Stage 4: Run on a background thread, polling through the registry
    let total_steps = sim_config.frequency.total_steps(sim_config.duration_days);
    eprintln!(
        "Running simulation: {} steps ({})",
        total_steps, sim_config.frequency
    );

    let registry = RunRegistry::new();
    let id = match registry.create(sim_config, Arc::new(store)) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let mut printed = 0;
    let result = loop {
        let Some(snap) = registry.snapshot(id) else {
            eprintln!("error: run {id} is gone from the registry");
            return ExitCode::from(1);
        };
        for tick in &snap.ticks[printed..] {
            print_tick(tick);
        }
        printed = snap.ticks.len();
        if snap.status.is_terminal() {
            break snap;
        }
        thread::sleep(Duration::from_millis(25));
    };
    registry.remove(id);

    eprintln!("\nRun {}: {} of {} ticks", result.status, printed, total_steps);

    if result.status == RunStatus::Failed {
        let reason = result.error.unwrap_or_else(|| "unknown panic".to_string());
        eprintln!("error: simulation failed: {reason}");
        return ExitCode::from(1);
    }

    // Complete and Stopped both carry a summary once a tick has run.
    match result.summary {
        Some(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("error: simulation produced no ticks");
            ExitCode::from(2)
        }
    }
}

fn run_report(config_path: &PathBuf, data_path: &PathBuf) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Build simulation config
    let sim_config = match build_simulation_config(&adapter) {
        Ok(c) => c,
        Err(code) => return code,
    };

    // Stage 3: Load bar data, narrowed to the simulation window
    let store = match load_bars(data_path, &sim_config) {
        Ok(s) => s,
        Err(code) => return code,
    };

    // Stage 4: Run headless and report
    let period_str = adapter
        .get_string("analytics", "period")
        .unwrap_or_else(|| "daily".to_string());
    let period = ReportingPeriod::parse_lossy(&period_str);
    let risk_free_rate = sim_config.risk_free_rate;

    let mut sim = Simulation::new(sim_config, &store);
    let ticks = sim.run();
    if ticks.is_empty() {
        eprintln!("error: simulation produced no ticks");
        return ExitCode::from(2);
    }

    match analytics::returns_summary(sim.portfolio(), risk_free_rate) {
        Some(summary) => {
            let volatility = analytics::volatility(sim.portfolio(), period)
                .map(|v| analytics::round_to(v * 100.0, 2));
            let sharpe = analytics::sharpe_ratio(sim.portfolio(), risk_free_rate, period)
                .map(|s| analytics::round_to(s, 3));

            println!("=== Performance Report ===");
            println!("Reporting Period:  {period}");
            println!("Total Return:      {:.2}%", summary.total_return_pct);
            println!(
                "Annualized Return: {:.2}%",
                summary.annualized_return * 100.0
            );
            println!("Volatility:        {}", fmt_percent(volatility));
            println!("Sharpe Ratio:      {}", fmt_ratio(sharpe));
            println!("Max Drawdown:      -{:.2}%", summary.max_drawdown_pct);
            println!("Total Trades:      {}", sim.portfolio().trade_count());
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("error: not enough history for a report (need at least 3 ticks)");
            ExitCode::from(2)
        }
    }
}

fn run_check_rules(rules_text: &str) -> ExitCode {
    match rule_parser::parse_rules(rules_text) {
        Ok(rules) => {
            eprintln!("Parsed {} rule(s)", rules.len());
            for rule in &rules {
                println!("{rule}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e.display_with_context(rules_text));
            let err = SimError::RuleParse(e);
            (&err).into()
        }
    }
}

/// Build the full run configuration, printing any error. Parse errors
/// in rule text get caret context.
fn build_simulation_config(adapter: &dyn ConfigPort) -> Result<SimulationConfig, ExitCode> {
    match simulation_config_from(adapter) {
        Ok(c) => Ok(c),
        Err(SimError::RuleParse(e)) => {
            let text = adapter.get_string("rules", "rule").unwrap_or_default();
            eprintln!(
                "error: failed to parse rules:\n{}",
                e.display_with_context(&text)
            );
            let err = SimError::RuleParse(e);
            Err((&err).into())
        }
        Err(e) => {
            eprintln!("error: {e}");
            Err((&e).into())
        }
    }
}

pub fn simulation_config_from(adapter: &dyn ConfigPort) -> Result<SimulationConfig, SimError> {
    let start_str = adapter.get_string("simulation", "start").ok_or_else(|| {
        SimError::ConfigMissing {
            section: "simulation".into(),
            key: "start".into(),
        }
    })?;
    let start_date = NaiveDate::parse_from_str(&start_str, "%Y-%m-%d").map_err(|_| {
        SimError::ConfigInvalid {
            section: "simulation".into(),
            key: "start".into(),
            reason: "invalid date format (expected YYYY-MM-DD)".into(),
        }
    })?;

    let duration = adapter.get_int("simulation", "duration_days", 30);
    if duration < 0 {
        return Err(SimError::ConfigInvalid {
            section: "simulation".into(),
            key: "duration_days".into(),
            reason: "must not be negative".into(),
        });
    }

    let frequency_str = adapter
        .get_string("simulation", "frequency")
        .unwrap_or_else(|| "daily".to_string());
    let frequency = Frequency::parse(&frequency_str).ok_or_else(|| SimError::ConfigInvalid {
        section: "simulation".into(),
        key: "frequency".into(),
        reason: format!("expected 'daily' or 'intraday', got '{frequency_str}'"),
    })?;

    Ok(SimulationConfig {
        initial_cash: adapter.get_double("simulation", "initial_cash", 100_000.0),
        start: start_date.and_time(NaiveTime::MIN),
        duration_days: duration as u32,
        frequency,
        holdings: holdings_from(adapter)?,
        rules: rules_from(adapter)?,
        risk_free_rate: adapter.get_double("analytics", "risk_free_rate", 0.05),
    })
}

/// Keys in `[holdings]` are symbols; configparser lowercases them on
/// load, so they are folded back to upper case here. Applied in sorted
/// symbol order.
pub fn holdings_from(adapter: &dyn ConfigPort) -> Result<Vec<(String, i64)>, SimError> {
    let mut holdings = Vec::new();
    for key in adapter.section_keys("holdings") {
        let raw = adapter.get_string("holdings", &key).unwrap_or_default();
        let shares: i64 = raw.trim().parse().map_err(|_| SimError::ConfigInvalid {
            section: "holdings".into(),
            key: key.clone(),
            reason: format!("invalid share count '{raw}'"),
        })?;
        if shares <= 0 {
            return Err(SimError::ConfigInvalid {
                section: "holdings".into(),
                key: key.clone(),
                reason: "share count must be positive".into(),
            });
        }
        holdings.push((key.to_uppercase(), shares));
    }
    Ok(holdings)
}

pub fn rules_from(adapter: &dyn ConfigPort) -> Result<Vec<TradeRule>, SimError> {
    let text = adapter.get_string("rules", "rule").unwrap_or_default();
    Ok(rule_parser::parse_rules(&text)?)
}

fn load_bars(data_path: &PathBuf, config: &SimulationConfig) -> Result<BarStore, ExitCode> {
    eprintln!("Loading bar data from {}", data_path.display());
    let store = CsvBarAdapter::new(data_path.clone())
        .load_all()
        .map_err(|e| {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        })?;

    narrow_store(&store, config).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

/// Narrow the loaded store to the simulation window for every symbol
/// the run will track. A tracked symbol with no bars in the window is
/// an error up front rather than a run full of no-data ticks.
pub fn narrow_store(store: &BarStore, config: &SimulationConfig) -> Result<BarStore, SimError> {
    let start = config.start.date();
    let end = start + chrono::Duration::days(i64::from(config.duration_days) + 1);
    let request = BarRequest::DateRange { start, end };

    let mut narrowed = BarStore::new();
    for symbol in tracked_symbols(config) {
        let series = store.select(&symbol, &request)?;
        if series.is_empty() {
            return Err(SimError::NoData { symbol });
        }
        narrowed.insert_series(symbol, series);
    }
    Ok(narrowed)
}

fn print_tick(tick: &TickRecord) {
    println!("{}  {}", tick.label, tick.at);

    if !tick.prices.is_empty() {
        let mut symbols: Vec<&String> = tick.prices.keys().collect();
        symbols.sort();
        let prices = symbols
            .iter()
            .map(|s| format!("{}: ${:.2}", s, tick.prices[*s]))
            .collect::<Vec<_>>()
            .join("  ");
        println!("  {prices}");
    }
    for trade in &tick.trades {
        println!("  {trade}");
    }
    println!(
        "  value: ${:.2}  cash: ${:.2}  pnl: {}",
        tick.portfolio_value,
        tick.cash,
        signed_dollars(tick.pnl)
    );
}

fn print_summary(summary: &RunSummary) {
    println!("\n=== Simulation Summary ===");
    println!("Total Return:     {:.2}%", summary.total_return_pct);
    println!("Final Value:      ${:.2}", summary.final_value);
    println!("Total PnL:        {}", signed_dollars(summary.total_pnl));
    println!("Sharpe Ratio:     {}", fmt_ratio(summary.sharpe_ratio));
    println!("Volatility:       {}", fmt_percent(summary.volatility_pct));
    println!("Total Trades:     {}", summary.total_trades);

    if !summary.final_positions.is_empty() {
        println!("\nFinal Positions:");
        let mut symbols: Vec<&String> = summary.final_positions.keys().collect();
        symbols.sort();
        for symbol in symbols {
            println!("  {}: {} shares", symbol, summary.final_positions[symbol]);
        }
    }
}

fn signed_dollars(value: f64) -> String {
    let sign = if value >= 0.0 { "+" } else { "" };
    format!("{sign}${value:.2}")
}

fn fmt_ratio(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.3}"),
        None => "n/a".to_string(),
    }
}

fn fmt_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}%"),
        None => "n/a".to_string(),
    }
}

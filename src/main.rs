use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use prettytable::{Cell, Row, Table};
use replay_backtest::data::parse_timestamp;
use replay_backtest::prelude::*;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "replay-backtest")]
#[command(about = "Bar-replay backtesting for signal strategies", long_about = None)]
struct Cli {
    //tracing filter used when REPLAY_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    //log output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    //replay one strategy version
    Run {
        #[command(flatten)]
        options: ReplayOptions,

        //strategy version (v2, v3, v4, v5)
        #[arg(long)]
        strategy: Option<String>,

        //output path for equity curve csv
        #[arg(long)]
        output_equity_csv: Option<PathBuf>,

        //output path for trades csv
        #[arg(long)]
        output_trades_csv: Option<PathBuf>,

        //output path for the full result as json
        #[arg(long)]
        output_json: Option<PathBuf>,
    },
    //replay several strategy versions over the same bars in parallel
    Compare {
        #[command(flatten)]
        options: ReplayOptions,

        //versions to compare, all when omitted
        #[arg(long, value_delimiter = ',')]
        strategies: Vec<String>,
    },
}

#[derive(Args)]
struct ReplayOptions {
    //path to csv candle file
    #[arg(long)]
    data: PathBuf,

    //json configuration file, flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    //write the resolved configuration to this path
    #[arg(long)]
    write_config: Option<PathBuf>,

    //backtest horizon in days
    #[arg(long)]
    days: Option<u32>,

    //bar interval (eg 3m, 15m, 1h)
    #[arg(long)]
    interval: Option<Interval>,

    //last bar of the horizon, defaults to the last bar in the file
    #[arg(long, value_parser = parse_end_time)]
    end_time: Option<DateTime<Utc>>,

    //fee per leg as a fraction of notional
    #[arg(long)]
    fee_rate: Option<Decimal>,

    //notional used to size the run-wide position
    #[arg(long)]
    fixed_notional: Option<Decimal>,

    //leading bars forced to hold
    #[arg(long)]
    warmup_bars: Option<usize>,

    //display window in days for long runs
    #[arg(long)]
    display_window_days: Option<u32>,

    //display and calendar timezone offset in hours
    #[arg(long, allow_hyphen_values = true)]
    utc_offset_hours: Option<i32>,
}

fn parse_end_time(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(raw).map_err(|err| err.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Commands::Run {
            options,
            strategy,
            output_equity_csv,
            output_trades_csv,
            output_json,
        } => {
            let mut configuration = resolve_configuration(&options)?;
            if let Some(name) = strategy {
                configuration.strategy_version = parse_version(&name)?;
            }
            run_backtest(
                &options,
                configuration,
                output_equity_csv,
                output_trades_csv,
                output_json,
            )?;
        }
        Commands::Compare {
            options,
            strategies,
        } => {
            let configuration = resolve_configuration(&options)?;
            let versions = if strategies.is_empty() {
                StrategyVersion::all().to_vec()
            } else {
                strategies
                    .iter()
                    .map(|name| parse_version(name))
                    .collect::<Result<Vec<_>>>()?
            };
            compare_versions(&options, configuration, &versions)?;
        }
    }

    Ok(())
}

fn init_tracing(log_level: &str, log_format: &str) -> Result<()> {
    let filter = std::env::var("REPLAY_LOG").unwrap_or_else(|_| log_level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| anyhow::anyhow!("invalid log filter: {}", err))?;

    if log_format.trim().eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
    Ok(())
}

fn parse_version(name: &str) -> Result<StrategyVersion> {
    StrategyVersion::parse(name)
        .ok_or_else(|| ConfigError::UnknownStrategy(name.to_string()).into())
}

//file values first, then flag overrides
fn resolve_configuration(options: &ReplayOptions) -> Result<BacktestConfiguration> {
    let mut configuration = match &options.config {
        Some(path) => BacktestConfiguration::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => BacktestConfiguration::default(),
    };

    if let Some(days) = options.days {
        configuration.days = days;
    }
    if let Some(interval) = options.interval {
        configuration.interval = interval;
    }
    if options.end_time.is_some() {
        configuration.end_time = options.end_time;
    }
    if let Some(fee_rate) = options.fee_rate {
        configuration.fee_rate = fee_rate;
    }
    if let Some(notional) = options.fixed_notional {
        configuration.fixed_notional = notional;
    }
    if options.warmup_bars.is_some() {
        configuration.warmup_bars = options.warmup_bars;
    }
    if let Some(window) = options.display_window_days {
        configuration.display_window_days = window;
    }
    if let Some(offset) = options.utc_offset_hours {
        configuration.utc_offset_hours = offset;
    }

    configuration.validate()?;
    Ok(configuration)
}

//loads the candle file and builds an engine over the configured horizon
fn prepare_engine(
    options: &ReplayOptions,
    configuration: &BacktestConfiguration,
) -> Result<BacktestEngine> {
    if let Some(path) = &options.write_config {
        configuration
            .to_json_file(path)
            .with_context(|| format!("Failed to write configuration to {:?}", path))?;
    }

    let engine_config = configuration.to_engine_config()?;

    println!("Loading data from {:?}...", options.data);
    let all_candles = load_csv(&options.data)
        .with_context(|| format!("Failed to load data from {:?}", options.data))?;

    let candles = slice_horizon(&all_candles, engine_config.days, configuration.end_time);
    let (first, last) = match (candles.first(), candles.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => anyhow::bail!("No candles inside the {}-day horizon", engine_config.days),
    };

    println!("Loaded {} of {} bars", candles.len(), all_candles.len());
    println!("Date range: {} to {}\n", first, last);

    Ok(BacktestEngine::new(engine_config, candles))
}

fn run_backtest(
    options: &ReplayOptions,
    configuration: BacktestConfiguration,
    output_equity_csv: Option<PathBuf>,
    output_trades_csv: Option<PathBuf>,
    output_json: Option<PathBuf>,
) -> Result<()> {
    let engine = prepare_engine(options, &configuration)?;
    let strategy = configuration.strategy_version.build();

    println!("Strategy: {}", configuration.strategy_version);
    println!(
        "Fee rate: {}  Notional: {}  Warmup: {} bars\n",
        engine.config().fee_rate,
        engine.config().fixed_notional,
        engine.config().warmup_bars
    );

    let result = engine.run(strategy.as_ref())?;

    println!("Backtest Results");
    println!("================\n");
    result.summary.pretty_print_table();

    if result.display.windowed {
        println!(
            "\nShowing the last {} days: {} bars, {} trades",
            engine.config().display_window_days,
            result.display.labels.len(),
            result.display.trades.len()
        );
    }

    print_daily_pnl(&result.daily_pnl);

    if let Some(path) = output_equity_csv {
        save_csv(&result.equity_full, &path)?;
        println!("\nEquity curve saved to {:?}", path);
    }

    if let Some(path) = output_trades_csv {
        save_csv(&result.trades_full, &path)?;
        println!("Trades saved to {:?}", path);
    }

    if let Some(path) = output_json {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write result to {:?}", path))?;
        println!("Result saved to {:?}", path);
    }

    Ok(())
}

fn compare_versions(
    options: &ReplayOptions,
    configuration: BacktestConfiguration,
    versions: &[StrategyVersion],
) -> Result<()> {
    let engine = prepare_engine(options, &configuration)?;

    println!("Comparing {} strategy versions...\n", versions.len());
    let results = engine.run_many(versions);

    comparison_table(&results).printstd();

    let failed = results.iter().filter(|(_, outcome)| outcome.is_err()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} strategy runs failed", failed, results.len());
    }
    Ok(())
}

//one row per version, failed runs included with their error
fn comparison_table(results: &[(StrategyVersion, Result<BacktestResult, BacktestError>)]) -> Table {
    let mut table = Table::new();
    table.add_row(Row::new(
        ["Strategy", "Signals", "Closed", "Win Rate", "Net PnL", "Fees", "Max DD"]
            .iter()
            .map(|h| Cell::new(h))
            .collect(),
    ));

    for (version, outcome) in results {
        match outcome {
            Ok(result) => {
                let s = &result.summary;
                table.add_row(Row::new(vec![
                    Cell::new(version.tag()),
                    Cell::new(&s.total_signals.to_string()),
                    Cell::new(&s.closed_trades.to_string()),
                    Cell::new(&format!("{:.2}%", s.win_rate)),
                    Cell::new(&format!("{:.2}", s.net_pnl_total)),
                    Cell::new(&format!("{:.2}", s.fees_total)),
                    Cell::new(&format!("{:.2}", s.max_drawdown)),
                ]));
            }
            Err(err) => {
                tracing::error!(strategy = version.tag(), error = %err, "run failed");
                table.add_row(Row::new(vec![
                    Cell::new(version.tag()),
                    Cell::new(&format!("failed: {}", err)).with_hspan(6),
                ]));
            }
        }
    }

    table
}

fn print_daily_pnl(days: &[DailyPnl]) {
    if days.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.add_row(Row::new(vec![Cell::new("Date"), Cell::new("Net PnL")]));
    for day in days {
        table.add_row(Row::new(vec![
            Cell::new(&day.date.to_string()),
            Cell::new(&format!("{:.4}", day.pnl)),
        ]));
    }

    println!("\nDaily PnL");
    table.printstd();
}

fn save_csv<T: serde::Serialize>(rows: &[T], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_runs_keep_their_row() {
        let results = vec![
            (StrategyVersion::MacdTurn, Err(BacktestError::InsufficientData)),
            (
                StrategyVersion::MacdBollinger,
                Err(BacktestError::Overflow { index: 3 }),
            ),
        ];

        let table = comparison_table(&results);
        assert_eq!(table.len(), 3);

        let row = table.get_row(2).unwrap();
        assert_eq!(row.get_cell(0).unwrap().get_content(), "v4_macd_bollinger");
        assert!(row
            .get_cell(1)
            .unwrap()
            .get_content()
            .contains("ledger values overflow at bar 3"));
    }
}

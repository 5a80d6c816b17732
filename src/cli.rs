//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_candles;
use crate::adapters::ema_cross::EmaCrossSignal;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_notifier::LogNotifier;
use crate::adapters::paper_exchange::PaperExchange;
use crate::domain::config::SessionConfig;
use crate::domain::error::PerpbotError;
use crate::domain::report::PerformanceReport;
use crate::domain::session::TradingSession;
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "perpbot", about = "Perpetual futures trading bot")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay recorded candles through the strategy
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        /// Write closed trades to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the live loop against recorded candles with simulated fills
    Paper {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
    },
    /// Validate a session configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            output,
        } => run_backtest(&config, &data, output.as_ref()),
        Command::Paper { config, data } => run_paper(&config, &data),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = PerpbotError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Read the [strategy] section. Kept separate from the session settings so
/// strategy parameters can live in their own file later.
pub fn build_signal_source(adapter: &dyn ConfigPort) -> Result<EmaCrossSignal, PerpbotError> {
    let fast = adapter.get_int("strategy", "fast_period", 9);
    let slow = adapter.get_int("strategy", "slow_period", 21);

    if fast < 1 {
        return Err(PerpbotError::ConfigInvalid {
            section: "strategy".to_string(),
            key: "fast_period".to_string(),
            reason: "fast_period must be at least 1".to_string(),
        });
    }
    if slow <= fast {
        return Err(PerpbotError::ConfigInvalid {
            section: "strategy".to_string(),
            key: "slow_period".to_string(),
            reason: "slow_period must be greater than fast_period".to_string(),
        });
    }

    Ok(EmaCrossSignal::new(fast as usize, slow as usize))
}

fn load_session_inputs(
    config_path: &PathBuf,
    data_path: &PathBuf,
) -> Result<(SessionConfig, EmaCrossSignal, Vec<crate::domain::candle::Candle>), ExitCode> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;

    let session_config = SessionConfig::from_config(&adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;

    let signal_source = build_signal_source(&adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;

    eprintln!("Loading candles from {}", data_path.display());
    let candles = csv_candles::load_candles(data_path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    eprintln!("Loaded {} candles for {}", candles.len(), session_config.symbol);

    Ok((session_config, signal_source, candles))
}

fn run_backtest(config_path: &PathBuf, data_path: &PathBuf, output: Option<&PathBuf>) -> ExitCode {
    let (session_config, signal_source, candles) =
        match load_session_inputs(config_path, data_path) {
            Ok(inputs) => inputs,
            Err(code) => return code,
        };

    if candles.is_empty() {
        eprintln!("error: no candles in {}", data_path.display());
        return ExitCode::from(5);
    }

    // The ledger prices fills off candle closes; the paper venue only
    // confirms them, so a static mark price is enough here.
    let mut exchange = PaperExchange::new(session_config.initial_balance);
    exchange.set_mark_price(candles[0].close);

    let mut session = TradingSession::new(
        session_config,
        Box::new(signal_source),
        Box::new(exchange),
        Box::new(LogNotifier),
    );

    eprintln!("Running backtest...");
    let report = session.run_backtest(&candles);
    print_report(&report);

    if let Some(output_path) = output {
        if let Err(e) = csv_candles::write_trades(output_path, session.ledger().trades()) {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
        eprintln!("Wrote {} trades to {}", report.total_trades, output_path.display());
    }

    ExitCode::SUCCESS
}

fn run_paper(config_path: &PathBuf, data_path: &PathBuf) -> ExitCode {
    let (session_config, signal_source, candles) =
        match load_session_inputs(config_path, data_path) {
            Ok(inputs) => inputs,
            Err(code) => return code,
        };

    let exchange = PaperExchange::with_candles(session_config.initial_balance, candles);
    let mut session = TradingSession::new(
        session_config,
        Box::new(signal_source),
        Box::new(exchange),
        Box::new(LogNotifier),
    );

    eprintln!("Running paper session (ends when the feed is exhausted)...");
    match session.run_live() {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let session_config = match SessionConfig::from_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };
    if let Err(e) = build_signal_source(&adapter) {
        eprintln!("error: {e}");
        return ExitCode::from(&e);
    }

    println!(
        "config ok: {} on {} (risk {:.1}% per trade, leverage {}x)",
        session_config.symbol,
        session_config.timeframe,
        session_config.risk_per_trade * 100.0,
        session_config.leverage,
    );
    ExitCode::SUCCESS
}

fn print_report(report: &PerformanceReport) {
    println!("=== Session report ===");
    println!("Initial balance:  {:>14.2}", report.initial_balance);
    println!("Final balance:    {:>14.2}", report.final_balance);
    println!("Total return:     {:>13.2}%", report.total_return * 100.0);
    println!("Max drawdown:     {:>13.2}%", report.max_drawdown * 100.0);
    println!("Sharpe ratio:     {:>14.4}", report.sharpe_ratio);
    println!("Trades:           {:>14}", report.total_trades);
    println!(
        "Win rate:         {:>13.2}% ({} won / {} lost)",
        report.win_rate * 100.0,
        report.winning_trades,
        report.losing_trades
    );
    if report.profit_factor.is_finite() {
        println!("Profit factor:    {:>14.2}", report.profit_factor);
    } else {
        println!("Profit factor:    {:>14}", "inf");
    }
    println!("Avg trade pnl:    {:>14.2}", report.avg_trade_pnl);
    println!("Best trade:       {:>14.2}", report.best_trade);
    println!("Worst trade:      {:>14.2}", report.worst_trade);
}

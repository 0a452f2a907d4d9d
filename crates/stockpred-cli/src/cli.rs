//! CLI argument definitions for stockpred.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `predict` | Forecast the next close for a ticker |
//! | `history` | List recorded predictions for a ticker |
//! | `serve` | Run the HTTP prediction service |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--mock` | `false` | Serve synthetic market data instead of calling Yahoo |
//! | `--model` | `$STOCKPRED_HOME/model.json` | LSTM weight artifact |
//! | `--timeout-ms` | `10000` | Market-data fetch timeout |
//! | `--lookback-days` | `730` | Calendar days of history to fetch |
//!
//! # Examples
//!
//! ```bash
//! stockpred predict AAPL --model ./model.json --pretty
//! stockpred history AAPL --limit 5
//! stockpred serve --addr 127.0.0.1:5000
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Next-close stock price forecasting with a trained LSTM.
#[derive(Debug, Parser)]
#[command(
    name = "stockpred",
    author,
    version,
    about = "Next-close stock price forecasting",
    long_about = "stockpred fetches recent daily closes for a ticker, normalizes the last \
60 of them into a model window, runs a trained LSTM, and reports the de-normalized \
forecast together with the history it was computed from. Every forecast is recorded \
in a local DuckDB prediction log.\n\
\n\
Use 'stockpred <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Use deterministic synthetic market data (no network).
    ///
    /// Without a model artifact, mock mode falls back to a naive
    /// last-value model.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Path to the LSTM weight artifact (JSON).
    #[arg(long, global = true)]
    pub model: Option<PathBuf>,

    /// Market-data fetch timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Calendar days of history requested per prediction.
    #[arg(long, global = true)]
    pub lookback_days: Option<u32>,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Forecast the next closing price for a ticker.
    Predict(PredictArgs),
    /// List recorded predictions for a ticker, newest first.
    History(HistoryArgs),
    /// Run the HTTP prediction service.
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
pub struct PredictArgs {
    /// Ticker symbol, e.g. AAPL, BRK-B, ^GSPC.
    pub ticker: String,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Ticker symbol.
    pub ticker: String,

    /// Maximum number of rows.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Socket address to bind.
    #[arg(long, default_value = "0.0.0.0:5000")]
    pub addr: SocketAddr,
}

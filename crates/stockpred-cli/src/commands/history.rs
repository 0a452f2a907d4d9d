use stockpred_core::Ticker;
use stockpred_warehouse::{Warehouse, WarehouseConfig};

use crate::cli::{Cli, HistoryArgs};
use crate::error::CliError;

use super::print_json;

pub fn run(cli: &Cli, args: &HistoryArgs) -> Result<(), CliError> {
    let ticker = Ticker::parse(&args.ticker)?;
    let warehouse = Warehouse::open(WarehouseConfig::default())?;
    let rows = warehouse.recent_predictions(ticker.as_str(), args.limit)?;

    tracing::debug!(%ticker, rows = rows.len(), "listed predictions");
    print_json(&rows, cli.pretty)
}

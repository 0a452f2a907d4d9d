use std::sync::Arc;

use crate::cli::{Cli, ServeArgs};
use crate::error::CliError;

use super::build_engine;

pub async fn run(cli: &Cli, args: &ServeArgs) -> Result<(), CliError> {
    let engine = build_engine(cli)?;
    stockpred_web::serve(args.addr, Arc::new(engine)).await?;
    Ok(())
}

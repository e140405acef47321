//! Entry point: parses the CLI, installs tracing, and dispatches to the
//! windowed slideshow or one of the `check`, `simulate` and `where`
//! utility commands.

mod cli;
mod paths;
mod run;
mod simulate;

use anyhow::Result;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();
    run::run(cli)
}

use clap::Parser;

use xtailor::cli::Cli;
use xtailor::infra::logging::{self, LogTarget};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let target = if cli.is_interactive() {
        LogTarget::File
    } else {
        LogTarget::Stderr
    };
    logging::init(target)?;

    xtailor::cli::run(cli)
}

use clap::Parser;

use minidb::cli::{self, Args};
use minidb::logging;

fn main() {
    let args = Args::parse();
    logging::init_cli_logger(args.verbose);

    std::process::exit(cli::run(args));
}

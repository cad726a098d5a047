use clap::Parser;
use evgate_cli::EvGateCli;

fn main() {
    let cli = EvGateCli::parse();
    evgate_cli::init_logging(cli.verbose);
    std::process::exit(cli.run());
}

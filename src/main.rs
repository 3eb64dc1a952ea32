use clap::Parser;
use sigtrader::cli::{run, Cli};
use sigtrader::logging::init_logging;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli.log_level, cli.log_format) {
        eprintln!("warning: logging disabled: {e}");
    }
    run(cli)
}

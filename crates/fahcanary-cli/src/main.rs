mod cli;

use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    // Startup failures (log sink, config) are fatal; a failed check is just
    // a non-zero exit code.
    let code = match cli.run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("fahcanary error: {:#}", err);
            cli::EXIT_STARTUP_FAILURE
        }
    };
    std::process::exit(code);
}

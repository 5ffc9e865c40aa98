use clap::Parser;
use recall_cli::{CliArgs, RecallCli};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let result = match RecallCli::from_args(&args) {
        Ok(cli) => cli.run(args).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

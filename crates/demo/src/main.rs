mod cli;
mod logging;
mod session;

use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = session::run(cli.transport, cli.delay_ms).await {
		eprintln!("error: {err:#}");
		std::process::exit(1);
	}
}

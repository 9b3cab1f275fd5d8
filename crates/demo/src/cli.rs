use clap::{Parser, ValueEnum};

/// Two collab engines calling each other over one channel.
#[derive(Parser, Debug)]
#[command(name = "collab-demo")]
#[command(about = "Run a main/worker pair of collab engines and exchange calls")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Channel connecting the two engines
	#[arg(short, long, value_enum, default_value = "memory")]
	pub transport: Transport,

	/// How long the worker's asynchronous method sleeps before answering
	#[arg(long, value_name = "MS", default_value_t = 50)]
	pub delay_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Transport {
	/// In-process channel pair
	Memory,
	/// Length-prefixed JSON over an in-memory byte pipe
	Pipe,
	/// JSON text frames over a loopback WebSocket
	Websocket,
}

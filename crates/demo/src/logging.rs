use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Overrides the `-v` flags when set, e.g. `COLLAB_LOG=collab::engine=debug`.
const FILTER_ENV: &str = "COLLAB_LOG";

/// Filter for the demo's `-v` count. Engine warnings (unknown methods) and
/// protocol faults always get through; `-vv` traces every envelope.
fn verbosity_filter(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "warn",
		1 => "info,collab=warn",
		_ => "debug",
	}
}

pub fn init_logging(verbosity: u8) {
	let env_filter = EnvFilter::try_from_env(FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(verbosity_filter(verbosity)));

	// stdout carries the demo transcript.
	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr.with_max_level(tracing::Level::TRACE))
		.with_target(true)
		.compact()
		.init();
}

use std::{path::PathBuf, time::Duration};

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "iotrace", about = "Trace openat, write and rename syscalls")]
pub struct Cli {
	/// File name of the daily rolling log.
	#[arg(long, default_value = "iotrace.log")]
	pub log_file: String,

	#[arg(long, default_value = "/var/log/iotrace")]
	pub log_dir: PathBuf,

	/// Log to stdout instead of the rolling file.
	#[arg(long)]
	pub stdout: bool,

	/// Stop after this many seconds. Runs until Ctrl-C when omitted.
	#[arg(long, value_name = "SECS")]
	pub time: Option<u64>,

	/// How often the dropped event counter is checked.
	#[arg(long, value_name = "SECS", default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
	pub stats_interval: u64,
}

impl Cli {
	pub fn run_time(&self) -> Option<Duration> {
		self.time.map(Duration::from_secs)
	}

	pub fn stats_interval(&self) -> Duration {
		Duration::from_secs(self.stats_interval)
	}
}

// region:    --- Tests


// endregion: --- Tests

mod cli;
mod error;
mod event;
mod hooks;
mod supervisor;
mod trx;
mod worker;

use std::time::Duration;

use crate::{
	cli::args::Cli,
	hooks::Tracker,
	supervisor::Supervisor,
	trx::new_trx_pair,
	worker::{run_event_sink, DropMonitor, RingBufWorker},
};

pub use self::error::{Error, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::EnvFilter;

fn init_tracing(args: &Cli) -> Option<WorkerGuard> {
	if args.stdout {
		tracing_subscriber::fmt()
			.with_target(false)
			.with_env_filter(EnvFilter::from_default_env())
			.init();
		return None;
	}

	let file_appender = rolling::daily(&args.log_dir, &args.log_file);
	let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

	tracing_subscriber::fmt()
		.with_writer(non_blocking_writer)
		.with_target(false)
		.with_env_filter(EnvFilter::from_default_env())
		.init();

	Some(guard)
}

async fn wait_for_exit(run_time: Option<Duration>) -> Result<()> {
	match run_time {
		Some(run_time) => tokio::select! {
			res = tokio::signal::ctrl_c() => res?,
			_ = tokio::time::sleep(run_time) => info!("run time of {run_time:?} elapsed"),
		},
		None => tokio::signal::ctrl_c().await?,
	}
	Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Cli::parse();

	let _tracing_guard = init_tracing(&args);

	// Bump the memlock rlimit. This is needed for older kernels that don't use the
	// new memcg based accounting, see https://lwn.net/Articles/837122/
	let rlim = libc::rlimit {
		rlim_cur: libc::RLIM_INFINITY,
		rlim_max: libc::RLIM_INFINITY,
	};
	let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
	if ret != 0 {
		debug!("remove limit on locked memory failed, ret is: {ret}");
	}

	let mut tracker = Tracker::load()?;
	tracker.attach()?;
	let ringbuf_fd = tracker.take_events()?;
	let drop_counter = tracker.take_drop_counter()?;

	let (evt_tx, evt_rx) = new_trx_pair();

	let mut supervisor = Supervisor::new();
	supervisor.spawn(RingBufWorker::new(ringbuf_fd, evt_tx).run(supervisor.token()));
	supervisor.spawn(async move { run_event_sink(evt_rx).await.map(|_| ()) });
	supervisor.spawn(DropMonitor::new(drop_counter, args.stats_interval()).run(supervisor.token()));
	info!("tracing openat, write and rename");

	wait_for_exit(args.run_time()).await?;

	supervisor.shutdown().await?;
	drop(tracker);

	Ok(())
}

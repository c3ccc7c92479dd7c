use std::future::Future;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::Result;

/// Owns the worker tasks and their shared shutdown token.
pub struct Supervisor {
	shutdown: CancellationToken,
	tasks: JoinSet<Result<()>>,
}

impl Supervisor {
	pub fn new() -> Self {
		Self {
			shutdown: CancellationToken::new(),
			tasks: JoinSet::new(),
		}
	}

	pub fn token(&self) -> CancellationToken {
		self.shutdown.clone()
	}

	pub fn spawn<F>(&mut self, fut: F)
	where
		F: Future<Output = Result<()>> + Send + 'static,
	{
		self.tasks.spawn(fut);
	}

	/// Cancels every worker and waits for all of them. The first worker error
	/// is returned.
	pub async fn shutdown(mut self) -> Result<()> {
		info!("supervisor shutdown starting");
		self.shutdown.cancel();

		while let Some(res) = self.tasks.join_next().await {
			res??;
		}
		info!("supervisor shutdown complete");

		Ok(())
	}
}

// region:    --- Tests

#[cfg(test)]
mod tests {
	type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>; // For tests.

	use super::*;
	use crate::error::Error;
	use std::sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	};

	#[tokio::test]
	async fn shutdown_cancels_and_joins_workers() -> Result<()> {
		// -- Setup & Fixtures
		let mut supervisor = Supervisor::new();
		let stopped = Arc::new(AtomicUsize::new(0));
		for _ in 0..3 {
			let token = supervisor.token();
			let stopped = stopped.clone();
			supervisor.spawn(async move {
				token.cancelled().await;
				stopped.fetch_add(1, Ordering::SeqCst);
				Ok(())
			});
		}

		// -- Exec
		supervisor.shutdown().await?;

		// -- Check
		assert_eq!(stopped.load(Ordering::SeqCst), 3);

		Ok(())
	}

	#[tokio::test]
	async fn shutdown_reports_worker_error() -> Result<()> {
		let mut supervisor = Supervisor::new();
		supervisor.spawn(async { Err(Error::from("ring worker failed")) });

		let res = supervisor.shutdown().await;

		assert!(matches!(res, Err(Error::Custom(msg)) if msg == "ring worker failed"));

		Ok(())
	}
}

// endregion: --- Tests

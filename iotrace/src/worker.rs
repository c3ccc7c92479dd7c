use std::time::Duration;

use crate::{
	error::Result,
	event::{parse_event_from_bytes, TraceEvent},
	trx::{EventRx, EventTx},
};
use aya::maps::{MapData, PerCpuArray, RingBuf};
use iotrace_common::SyscallKind;
use tokio::io::unix::AsyncFd;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct RingBufWorker {
	ringbuf_fd: AsyncFd<RingBuf<MapData>>,
	tx: EventTx,
}

impl RingBufWorker {
	pub fn new(ringbuf_fd: AsyncFd<RingBuf<MapData>>, tx: EventTx) -> Self {
		Self { ringbuf_fd, tx }
	}

	/// Drains the ring in commit order every time it becomes readable. On
	/// cancel, drains once more and drops the sender so the sink can finish.
	pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
		loop {
			let mut guard = tokio::select! {
				_ = shutdown.cancelled() => break,
				guard = self.ringbuf_fd.readable_mut() => guard?,
			};
			drain_ring(guard.get_inner_mut(), &self.tx)?;
			guard.clear_ready();
		}

		drain_ring(self.ringbuf_fd.get_mut(), &self.tx)?;
		info!("ring buffer worker stopped");
		Ok(())
	}
}

fn drain_ring(ring_buf: &mut RingBuf<MapData>, tx: &EventTx) -> Result<()> {
	while let Some(item) = ring_buf.next() {
		match parse_event_from_bytes(&item) {
			Ok(evt) => tx.send_sync(evt)?,
			Err(e) => info!("Failed to parse event: {:?}", e),
		}
	}
	Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventCounts {
	pub open: u64,
	pub write: u64,
	pub rename: u64,
	pub write_bytes: u64,
}

impl EventCounts {
	pub fn record(&mut self, evt: &TraceEvent) {
		match evt {
			TraceEvent::Open { .. } => self.open += 1,
			TraceEvent::Write { byte_count, .. } => {
				self.write += 1;
				self.write_bytes = self.write_bytes.saturating_add(*byte_count);
			}
			TraceEvent::Rename { .. } => self.rename += 1,
		}
	}

	pub fn get(&self, kind: SyscallKind) -> u64 {
		match kind {
			SyscallKind::Open => self.open,
			SyscallKind::Write => self.write,
			SyscallKind::Rename => self.rename,
		}
	}

	pub fn total(&self) -> u64 {
		self.open + self.write + self.rename
	}
}

/// Logs every decoded event until all senders are gone, then a per-syscall
/// summary.
///
/// Not cancellable: queued events were already consumed from the ring, so
/// the sink always runs the channel dry.
pub async fn run_event_sink(rx: EventRx) -> Result<EventCounts> {
	let mut counts = EventCounts::default();

	while let Ok(evt) = rx.recv().await {
		counts.record(&evt);
		info!(target: "event", "{evt}");
	}

	info!(
		total = counts.total(),
		open = counts.get(SyscallKind::Open),
		write = counts.get(SyscallKind::Write),
		rename = counts.get(SyscallKind::Rename),
		write_bytes = counts.write_bytes,
		"event sink stopped"
	);
	Ok(counts)
}

/// Polls the per-CPU `DROPPED` counter and warns when it grows.
pub struct DropMonitor {
	counter: PerCpuArray<MapData, u64>,
	period: Duration,
	last_total: u64,
}

impl DropMonitor {
	pub fn new(counter: PerCpuArray<MapData, u64>, period: Duration) -> Self {
		Self {
			counter,
			period,
			last_total: 0,
		}
	}

	pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
		let mut ticker = tokio::time::interval(self.period);

		loop {
			tokio::select! {
				_ = shutdown.cancelled() => break,
				_ = ticker.tick() => self.report()?,
			}
		}

		self.report()?;
		info!(dropped = self.last_total, "drop monitor stopped");
		Ok(())
	}

	fn report(&mut self) -> Result<()> {
		let total: u64 = self.counter.get(&0, 0)?.iter().sum();

		if let Some(delta) = drop_delta(self.last_total, total) {
			warn!(total, delta, "ring buffer full, events dropped");
		}
		self.last_total = total;

		Ok(())
	}
}

fn drop_delta(last_total: u64, total: u64) -> Option<u64> {
	(total > last_total).then(|| total - last_total)
}

// region:    --- Tests

#[cfg(test)]
mod tests {
	type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>; // For tests.

	use super::*;
	use crate::{event::EventHeader, trx::new_trx_pair};
	use std::sync::Arc;

	fn header() -> EventHeader {
		EventHeader {
			timestamp: 1,
			pid: 2,
			tid: 3,
			comm: Arc::from("touch"),
		}
	}

	#[test]
	fn event_counts_per_kind() -> Result<()> {
		// -- Setup & Fixtures
		let events = [
			TraceEvent::Open {
				header: header(),
				path: Arc::from("/tmp/test.txt"),
			},
			TraceEvent::Write {
				header: header(),
				byte_count: 128,
				path: None,
			},
			TraceEvent::Write {
				header: header(),
				byte_count: 64,
				path: None,
			},
			TraceEvent::Rename {
				header: header(),
				path: Arc::from("/tmp/a"),
				new_path: Arc::from("/tmp/b"),
			},
		];
		let mut counts = EventCounts::default();

		// -- Exec
		for evt in &events {
			counts.record(evt);
		}

		// -- Check
		assert_eq!(counts.get(SyscallKind::Open), 1);
		assert_eq!(counts.get(SyscallKind::Write), 2);
		assert_eq!(counts.get(SyscallKind::Rename), 1);
		assert_eq!(counts.write_bytes, 192);
		assert_eq!(counts.total(), 4);

		Ok(())
	}

	#[test]
	fn drop_delta_only_on_growth() -> Result<()> {
		assert_eq!(drop_delta(0, 0), None);
		assert_eq!(drop_delta(0, 7), Some(7));
		assert_eq!(drop_delta(7, 7), None);
		assert_eq!(drop_delta(7, 10), Some(3));

		Ok(())
	}

	#[tokio::test]
	async fn event_sink_stops_when_senders_close() -> Result<()> {
		// -- Setup & Fixtures
		let (tx, rx) = new_trx_pair();
		tx.send_sync(TraceEvent::Open {
			header: header(),
			path: Arc::from("/etc/passwd"),
		})?;
		drop(tx);

		// -- Exec
		let counts = run_event_sink(rx).await?;

		// -- Check
		assert_eq!(counts.get(SyscallKind::Open), 1);
		assert_eq!(counts.total(), 1);

		Ok(())
	}

	#[tokio::test]
	async fn shutdown_keeps_queued_and_final_drain_events() -> Result<()> {
		// -- Setup & Fixtures
		let (tx, rx) = new_trx_pair();
		for n in 0..50 {
			tx.send_sync(TraceEvent::Write {
				header: header(),
				byte_count: n,
				path: None,
			})?;
		}
		let token = CancellationToken::new();
		let sink = tokio::spawn(run_event_sink(rx));
		// Stands in for the ring worker: one last drain after cancel, then
		// the sender goes away.
		let producer = {
			let token = token.clone();
			tokio::spawn(async move {
				token.cancelled().await;
				let res = tx.send_sync(TraceEvent::Rename {
					header: header(),
					path: Arc::from("/tmp/a"),
					new_path: Arc::from("/tmp/b"),
				});
				drop(tx);
				res
			})
		};

		// -- Exec
		token.cancel();
		let late_send = producer.await?;
		let counts = sink.await??;

		// -- Check
		assert!(late_send.is_ok());
		assert_eq!(counts.get(SyscallKind::Write), 50);
		assert_eq!(counts.get(SyscallKind::Rename), 1);
		assert_eq!(counts.total(), 51);

		Ok(())
	}
}

// endregion: --- Tests

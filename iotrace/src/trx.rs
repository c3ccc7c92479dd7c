use crate::{event::TraceEvent, Result};
use flume::{Receiver, Sender};

#[derive(Clone)]
pub struct EventTx {
	tx: Sender<TraceEvent>,
}

impl EventTx {
	/// The channel is unbounded, so this never waits. Called from the ring
	/// drain loop, which must not await while it holds the ring guard.
	pub fn send_sync(&self, item: TraceEvent) -> Result<()> {
		self.tx.send(item)?;
		Ok(())
	}
}

pub struct EventRx {
	rx: Receiver<TraceEvent>,
}

impl EventRx {
	pub async fn recv(&self) -> Result<TraceEvent> {
		let res = self.rx.recv_async().await?;
		Ok(res)
	}
}

pub fn new_trx_pair() -> (EventTx, EventRx) {
	let (tx, rx) = flume::unbounded::<TraceEvent>();

	let evt_tx = EventTx { tx };

	let evt_rx = EventRx { rx };

	(evt_tx, evt_rx)
}

// region:    --- Tests


// endregion: --- Tests

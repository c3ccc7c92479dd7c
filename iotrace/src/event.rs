use std::{fmt, sync::Arc};

use iotrace_common::{Event, SyscallKind};
use zerocopy::FromBytes;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHeader {
	pub timestamp: u64,
	pub pid: u32,
	pub tid: u32,
	pub comm: Arc<str>,
}

/// A decoded ring buffer record. Only the fields meaningful for the syscall
/// are carried over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
	Open {
		header: EventHeader,
		path: Arc<str>,
	},
	Write {
		header: EventHeader,
		byte_count: u64,
		/// `None` until the write handler resolves descriptors to paths.
		path: Option<Arc<str>>,
	},
	Rename {
		header: EventHeader,
		path: Arc<str>,
		new_path: Arc<str>,
	},
}

impl TraceEvent {
	pub fn header(&self) -> &EventHeader {
		match self {
			TraceEvent::Open { header, .. } | TraceEvent::Write { header, .. } | TraceEvent::Rename { header, .. } => header,
		}
	}

	pub fn kind(&self) -> SyscallKind {
		match self {
			TraceEvent::Open { .. } => SyscallKind::Open,
			TraceEvent::Write { .. } => SyscallKind::Write,
			TraceEvent::Rename { .. } => SyscallKind::Rename,
		}
	}
}

impl TryFrom<&Event> for TraceEvent {
	type Error = Error;

	fn try_from(evt: &Event) -> Result<Self> {
		let kind = evt.kind().map_err(Error::UnknownSyscallKind)?;

		let header = EventHeader {
			timestamp: evt.timestamp,
			pid: evt.pid,
			tid: evt.tid,
			comm: c_str(&evt.comm),
		};

		let trace_evt = match kind {
			SyscallKind::Open => TraceEvent::Open {
				header,
				path: c_str(&evt.path),
			},
			SyscallKind::Write => TraceEvent::Write {
				header,
				byte_count: evt.byte_count,
				path: (evt.path[0] != 0).then(|| c_str(&evt.path)),
			},
			SyscallKind::Rename => TraceEvent::Rename {
				header,
				path: c_str(&evt.path),
				new_path: c_str(&evt.new_path),
			},
		};

		Ok(trace_evt)
	}
}

impl fmt::Display for TraceEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let h = self.header();
		write!(
			f,
			"[{}] TS:{} | PID:{} | TID:{} | CMD:{}",
			self.kind().name(),
			h.timestamp,
			h.pid,
			h.tid,
			h.comm
		)?;

		match self {
			TraceEvent::Open { path, .. } => write!(f, " | PATH:{path}"),
			TraceEvent::Write { byte_count, path, .. } => {
				write!(f, " | BYTES:{byte_count}")?;
				match path {
					Some(path) => write!(f, " | PATH:{path}"),
					None => Ok(()),
				}
			}
			TraceEvent::Rename { path, new_path, .. } => write!(f, " | PATH:{path} → {new_path}"),
		}
	}
}

pub fn parse_event_from_bytes(data: &[u8]) -> Result<TraceEvent> {
	let (evt, _) = Event::read_from_prefix(data).map_err(|_| Error::InvalidEventSize(data.len()))?;
	TraceEvent::try_from(&evt)
}

/// Fixed-width, NUL padded kernel string to text. Invalid UTF-8 is replaced.
fn c_str(raw: &[u8]) -> Arc<str> {
	let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
	Arc::from(String::from_utf8_lossy(&raw[..end]).as_ref())
}

// region:    --- Tests

#[cfg(test)]
mod tests {
	type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>; // For tests.

	use super::*;
	use iotrace_common::{COMM_LEN, EVENT_SIZE, PATH_LEN};
	use zerocopy::{FromZeros, IntoBytes};

	fn fixed<const N: usize>(s: &[u8]) -> [u8; N] {
		let mut buf = [0u8; N];
		buf[..s.len()].copy_from_slice(s);
		buf
	}

	fn raw_event(kind: u32) -> Event {
		let mut evt = Event::new_zeroed();
		evt.timestamp = 77;
		evt.pid = 10;
		evt.tid = 11;
		evt.comm = fixed::<COMM_LEN>(b"bash");
		evt.syscall_kind = kind;
		evt
	}

	#[test]
	fn parse_open_event() -> Result<()> {
		// -- Setup & Fixtures
		let mut evt = raw_event(1);
		evt.path = fixed::<PATH_LEN>(b"/tmp/test.txt");

		// -- Exec
		let parsed = parse_event_from_bytes(evt.as_bytes())?;

		// -- Check
		let TraceEvent::Open { header, path } = parsed else {
			return Err("expected open event".into());
		};
		assert_eq!(&*path, "/tmp/test.txt");
		assert_eq!(header.timestamp, 77);
		assert_eq!(header.pid, 10);
		assert_eq!(header.tid, 11);
		assert_eq!(&*header.comm, "bash");

		Ok(())
	}

	#[test]
	fn parse_write_event_without_path() -> Result<()> {
		// -- Setup & Fixtures
		let mut evt = raw_event(2);
		evt.byte_count = 128;

		// -- Exec
		let parsed = parse_event_from_bytes(evt.as_bytes())?;

		// -- Check
		assert_eq!(parsed.kind(), SyscallKind::Write);
		let TraceEvent::Write { byte_count, path, .. } = parsed else {
			return Err("expected write event".into());
		};
		assert_eq!(byte_count, 128);
		assert!(path.is_none());

		Ok(())
	}

	#[test]
	fn parse_rename_event() -> Result<()> {
		// -- Setup & Fixtures
		let mut evt = raw_event(3);
		evt.path = fixed::<PATH_LEN>(b"/tmp/a");
		evt.new_path = fixed::<PATH_LEN>(b"/tmp/b");

		// -- Exec
		let parsed = parse_event_from_bytes(evt.as_bytes())?;

		// -- Check
		let TraceEvent::Rename { path, new_path, .. } = &parsed else {
			return Err("expected rename event".into());
		};
		assert_eq!(&**path, "/tmp/a");
		assert_eq!(&**new_path, "/tmp/b");
		assert_eq!(
			parsed.to_string(),
			"[RENAME] TS:77 | PID:10 | TID:11 | CMD:bash | PATH:/tmp/a → /tmp/b"
		);

		Ok(())
	}

	#[test]
	fn parse_rejects_unknown_kind() -> Result<()> {
		let evt = raw_event(9);

		let res = parse_event_from_bytes(evt.as_bytes());

		assert!(matches!(res, Err(Error::UnknownSyscallKind(9))));

		Ok(())
	}

	#[test]
	fn parse_rejects_short_record() -> Result<()> {
		let evt = raw_event(1);
		let short = &evt.as_bytes()[..EVENT_SIZE - 1];

		let res = parse_event_from_bytes(short);

		assert!(matches!(res, Err(Error::InvalidEventSize(len)) if len == EVENT_SIZE - 1));

		Ok(())
	}

	#[test]
	fn c_str_stops_at_nul_and_replaces_invalid_utf8() -> Result<()> {
		let raw = [b'a', 0xff, b'b', 0, b'z', b'z'];

		let res = c_str(&raw);

		assert_eq!(&*res, "a\u{fffd}b");

		Ok(())
	}

	#[test]
	fn c_str_handles_unterminated_field() -> Result<()> {
		let raw = [b'x'; COMM_LEN];

		let res = c_str(&raw);

		assert_eq!(res.len(), COMM_LEN);

		Ok(())
	}
}

// endregion: --- Tests

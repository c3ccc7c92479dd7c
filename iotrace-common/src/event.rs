use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const COMM_LEN: usize = 16;
pub const PATH_LEN: usize = 256;

/// Byte size of the `EVENTS` ring buffer shared by every tracepoint handler.
pub const RING_BYTE_SIZE: u32 = 256 * 1024;

pub const EVENT_SIZE: usize = 568;

// 1 => "OPEN" (openat)
// 2 => "WRITE"
// 3 => "RENAME"

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyscallKind {
	Open = 1,
	Write = 2,
	Rename = 3,
}

impl SyscallKind {
	pub const fn name(self) -> &'static str {
		match self {
			SyscallKind::Open => "OPEN",
			SyscallKind::Write => "WRITE",
			SyscallKind::Rename => "RENAME",
		}
	}
}

impl TryFrom<u32> for SyscallKind {
	type Error = u32;

	fn try_from(value: u32) -> Result<Self, Self::Error> {
		match value {
			1 => Ok(SyscallKind::Open),
			2 => Ok(SyscallKind::Write),
			3 => Ok(SyscallKind::Rename),
			other => Err(other),
		}
	}
}

/// One captured syscall, exactly as it sits in a ring buffer slot.
///
/// Fields that do not apply to `syscall_kind` are always zero.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct Event {
	pub timestamp: u64,             // 0..8     | bpf_ktime_get_ns
	pub pid: u32,                   // 8..12    | tgid
	pub tid: u32,                   // 12..16
	pub comm: [u8; COMM_LEN],       // 16..32
	pub syscall_kind: u32,          // 32..36
	pub _pad0: [u8; 4],             // 36..40
	pub return_value: i64,          // 40..48   | reserved, entry hooks only
	pub byte_count: u64,            // 48..56   | write only
	pub path: [u8; PATH_LEN],       // 56..312
	pub new_path: [u8; PATH_LEN],   // 312..568 | rename only
}

const _: () = assert!(core::mem::size_of::<Event>() == EVENT_SIZE);
const _: () = assert!(core::mem::align_of::<Event>() == 8);
const _: () = assert!(core::mem::offset_of!(Event, timestamp) == 0);
const _: () = assert!(core::mem::offset_of!(Event, pid) == 8);
const _: () = assert!(core::mem::offset_of!(Event, tid) == 12);
const _: () = assert!(core::mem::offset_of!(Event, comm) == 16);
const _: () = assert!(core::mem::offset_of!(Event, syscall_kind) == 32);
const _: () = assert!(core::mem::offset_of!(Event, _pad0) == 36);
const _: () = assert!(core::mem::offset_of!(Event, return_value) == 40);
const _: () = assert!(core::mem::offset_of!(Event, byte_count) == 48);
const _: () = assert!(core::mem::offset_of!(Event, path) == 56);
const _: () = assert!(core::mem::offset_of!(Event, new_path) == 312);

impl Event {
	pub fn kind(&self) -> Result<SyscallKind, u32> {
		SyscallKind::try_from(self.syscall_kind)
	}
}

// region:    --- Tests

#[cfg(test)]
mod tests {
	type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>; // For tests.

	use super::*;
	use zerocopy::{FromZeros, IntoBytes};

	fn le_u64(bytes: &[u8], at: usize) -> Result<u64> {
		Ok(u64::from_le_bytes(bytes[at..at + 8].try_into()?))
	}

	fn le_u32(bytes: &[u8], at: usize) -> Result<u32> {
		Ok(u32::from_le_bytes(bytes[at..at + 4].try_into()?))
	}

	#[test]
	fn event_fields_sit_at_wire_offsets() -> Result<()> {
		// -- Setup & Fixtures
		let mut evt = Event::new_zeroed();
		evt.timestamp = 0x0102_0304_0506_0708;
		evt.pid = 0x1111_1111;
		evt.tid = 0x2222_2222;
		evt.comm = [b'c'; COMM_LEN];
		evt.syscall_kind = SyscallKind::Rename as u32;
		evt.return_value = -2;
		evt.byte_count = 0x3333_3333_3333_3333;
		evt.path = [b'p'; PATH_LEN];
		evt.new_path = [b'n'; PATH_LEN];

		// -- Exec
		let bytes = evt.as_bytes();

		// -- Check
		assert_eq!(bytes.len(), EVENT_SIZE);
		assert_eq!(le_u64(bytes, 0)?, 0x0102_0304_0506_0708);
		assert_eq!(le_u32(bytes, 8)?, 0x1111_1111);
		assert_eq!(le_u32(bytes, 12)?, 0x2222_2222);
		assert!(bytes[16..32].iter().all(|&b| b == b'c'));
		assert_eq!(le_u32(bytes, 32)?, 3);
		assert_eq!(&bytes[36..40], &[0u8; 4]);
		assert_eq!(le_u64(bytes, 40)? as i64, -2);
		assert_eq!(le_u64(bytes, 48)?, 0x3333_3333_3333_3333);
		assert!(bytes[56..312].iter().all(|&b| b == b'p'));
		assert!(bytes[312..568].iter().all(|&b| b == b'n'));

		Ok(())
	}
}

// endregion: --- Tests

//! Per-syscall capture logic shared by every tracepoint handler.
//!
//! Handlers never touch kernel facilities directly. The clock and task
//! identity, user memory, the ring buffer and fd resolution are handed in as
//! capabilities so the same code runs in the eBPF program and in host tests.

use crate::{Event, SyscallKind, COMM_LEN, PATH_LEN};

/// Identity and clock of the task that triggered the handler.
pub trait TaskContext {
	fn ktime_ns(&self) -> u64;
	/// `tgid << 32 | pid`, as returned by `bpf_get_current_pid_tgid`.
	fn pid_tgid(&self) -> u64;
	/// Best-effort command name, zero-padded.
	fn comm(&self) -> [u8; COMM_LEN];
}

/// Fault-tolerant reads from the traced task's address space.
pub trait UserMemory {
	/// Copies the NUL-terminated string at `addr` into `dst`.
	///
	/// At most `dst.len() - 1` bytes are copied and the result is always NUL
	/// terminated. Returns the number of bytes written including the NUL. On
	/// error `dst` holds an empty or partial string.
	fn read_str(&self, addr: u64, dst: &mut [u8]) -> Result<usize, i64>;
}

/// Maps a file descriptor of the current task to a path.
pub trait FdPathResolver {
	/// Returns `true` if `dst` was filled.
	fn resolve(&self, fd: u64, dst: &mut [u8; PATH_LEN]) -> bool;
}

/// Resolver used by the write handler: sys_enter tracepoints give no access to
/// the task's file table, so nothing is written.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unresolved;

impl FdPathResolver for Unresolved {
	#[inline(always)]
	fn resolve(&self, _fd: u64, _dst: &mut [u8; PATH_LEN]) -> bool {
		false
	}
}

/// A reserved ring buffer slot holding exactly one [`Event`].
///
/// `submit` and `discard` consume the slot, so every reservation ends with
/// exactly one terminal action.
///
/// # Safety
///
/// `as_mut_ptr` must return a pointer that is valid for writes of one
/// `Event` and properly aligned for as long as the slot is alive.
pub unsafe trait EventSlot {
	fn as_mut_ptr(&mut self) -> *mut Event;
	fn submit(self);
	fn discard(self);
}

/// Bounded multi-producer channel. `reserve` never blocks: when there is no
/// room it fails and the caller drops the event.
pub trait EventChannel {
	type Slot: EventSlot;

	fn reserve(&self) -> Option<Self::Slot>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capture {
	Submitted,
	/// Channel was full, nothing was written.
	Dropped,
}

/// Whether a drop should also be logged, given the per-CPU drop count after
/// this drop. Logs the 1st, 2nd, 4th, 8th... drop so a saturated ring does
/// not add a log record per lost event.
#[inline(always)]
pub fn drop_log_due(drops: u64) -> bool {
	drops != 0 && drops & (drops - 1) == 0
}

/// Ring slots are reused, so clear the whole record before filling it.
#[inline(always)]
fn zeroed<S: EventSlot>(slot: &mut S) -> &mut Event {
	let ptr = slot.as_mut_ptr();
	// SAFETY: the slot guarantees `ptr` is valid for one `Event`, and an
	// all-zero `Event` is a valid value.
	unsafe {
		core::ptr::write_bytes(ptr, 0, 1);
		&mut *ptr
	}
}

#[inline(always)]
pub fn fill_common<T: TaskContext>(event: &mut Event, task: &T) {
	let pid_tgid = task.pid_tgid();

	event.timestamp = task.ktime_ns();
	event.pid = (pid_tgid >> 32) as u32;
	event.tid = pid_tgid as u32;
	event.comm = task.comm();
}

#[inline(always)]
pub fn capture_open<C, T, M>(channel: &C, task: &T, mem: &M, path_addr: u64) -> Capture
where
	C: EventChannel,
	T: TaskContext,
	M: UserMemory,
{
	let Some(mut slot) = channel.reserve() else {
		return Capture::Dropped;
	};

	let event = zeroed(&mut slot);
	fill_common(event, task);
	event.syscall_kind = SyscallKind::Open as u32;
	let _ = mem.read_str(path_addr, &mut event.path);

	slot.submit();
	Capture::Submitted
}

/// `count` is the requested length, the bytes actually written are only
/// known at syscall exit.
#[inline(always)]
pub fn capture_write<C, T, R>(channel: &C, task: &T, resolver: &R, fd: u64, count: u64) -> Capture
where
	C: EventChannel,
	T: TaskContext,
	R: FdPathResolver,
{
	let Some(mut slot) = channel.reserve() else {
		return Capture::Dropped;
	};

	let event = zeroed(&mut slot);
	fill_common(event, task);
	event.syscall_kind = SyscallKind::Write as u32;
	event.byte_count = count;
	let _ = resolver.resolve(fd, &mut event.path);

	slot.submit();
	Capture::Submitted
}

#[inline(always)]
pub fn capture_rename<C, T, M>(channel: &C, task: &T, mem: &M, old_addr: u64, new_addr: u64) -> Capture
where
	C: EventChannel,
	T: TaskContext,
	M: UserMemory,
{
	let Some(mut slot) = channel.reserve() else {
		return Capture::Dropped;
	};

	let event = zeroed(&mut slot);
	fill_common(event, task);
	event.syscall_kind = SyscallKind::Rename as u32;
	let _ = mem.read_str(old_addr, &mut event.path);
	let _ = mem.read_str(new_addr, &mut event.new_path);

	slot.submit();
	Capture::Submitted
}

// region:    --- Tests


// endregion: --- Tests

use aya_ebpf::programs::TracePointContext;
use aya_log_ebpf::debug;
use iotrace_common::{
	capture::{capture_open, capture_rename, capture_write, drop_log_due, Capture, Unresolved},
	SyscallKind,
};

use crate::kernel::{count_drop, CurrentTask, EventRing, UserSpace};

// sys_enter_* records: 8 byte common header, syscall nr at 8, then six
// 8 byte argument slots.
const ARG0: usize = 16;
const ARG1: usize = 24;
const ARG2: usize = 32;

macro_rules! try_read {
	($ctx:expr, $offset:expr) => {
		match $ctx.read_at::<u64>($offset) {
			Ok(val) => val,
			Err(_) => return Err(1),
		}
	};
}

fn on_drop(ctx: &TracePointContext, kind: SyscallKind) {
	let drops = count_drop();
	if drop_log_due(drops) {
		debug!(ctx, "ring buffer full, dropped {} event ({} on this cpu)", kind.name(), drops);
	}
}

// openat(int dfd, const char *filename, int flags, umode_t mode)
pub fn try_sys_enter_openat(ctx: TracePointContext) -> Result<u32, u32> {
	let filename = unsafe { try_read!(ctx, ARG1) };

	if capture_open(&EventRing, &CurrentTask, &UserSpace, filename) == Capture::Dropped {
		on_drop(&ctx, SyscallKind::Open);
	}

	Ok(0)
}

// write(unsigned int fd, const char *buf, size_t count)
pub fn try_sys_enter_write(ctx: TracePointContext) -> Result<u32, u32> {
	let fd = unsafe { try_read!(ctx, ARG0) };
	let count = unsafe { try_read!(ctx, ARG2) };

	if capture_write(&EventRing, &CurrentTask, &Unresolved, fd, count) == Capture::Dropped {
		on_drop(&ctx, SyscallKind::Write);
	}

	Ok(0)
}

// rename(const char *oldname, const char *newname)
pub fn try_sys_enter_rename(ctx: TracePointContext) -> Result<u32, u32> {
	let oldname = unsafe { try_read!(ctx, ARG0) };
	let newname = unsafe { try_read!(ctx, ARG1) };

	if capture_rename(&EventRing, &CurrentTask, &UserSpace, oldname, newname) == Capture::Dropped {
		on_drop(&ctx, SyscallKind::Rename);
	}

	Ok(0)
}

use aya_ebpf::{
	cty::c_void,
	helpers::{
		bpf_get_current_comm, bpf_get_current_pid_tgid,
		r#gen::{bpf_ktime_get_ns, bpf_probe_read_user_str},
	},
	maps::ring_buf::RingBufEntry,
};
use iotrace_common::{
	capture::{EventChannel, EventSlot, TaskContext, UserMemory},
	Event, COMM_LEN,
};

use crate::{DROPPED, EVENTS};

pub struct CurrentTask;

impl TaskContext for CurrentTask {
	#[inline(always)]
	fn ktime_ns(&self) -> u64 {
		unsafe { bpf_ktime_get_ns() }
	}

	#[inline(always)]
	fn pid_tgid(&self) -> u64 {
		bpf_get_current_pid_tgid()
	}

	#[inline(always)]
	fn comm(&self) -> [u8; COMM_LEN] {
		bpf_get_current_comm().unwrap_or([0u8; COMM_LEN])
	}
}

pub struct UserSpace;

impl UserMemory for UserSpace {
	#[inline(always)]
	fn read_str(&self, addr: u64, dst: &mut [u8]) -> Result<usize, i64> {
		// bpf_probe_read_user_str never faults: bad pointers come back as an
		// error with `dst` cleared. On success the count includes the NUL.
		let ret = unsafe { bpf_probe_read_user_str(dst.as_mut_ptr() as *mut c_void, dst.len() as u32, addr as *const c_void) };
		if ret < 0 {
			return Err(ret);
		}
		Ok(ret as usize)
	}
}

pub struct EventRing;

pub struct Entry(RingBufEntry<Event>);

unsafe impl EventSlot for Entry {
	#[inline(always)]
	fn as_mut_ptr(&mut self) -> *mut Event {
		self.0.as_mut_ptr()
	}

	#[inline(always)]
	fn submit(self) {
		self.0.submit(0);
	}

	#[inline(always)]
	fn discard(self) {
		self.0.discard(0);
	}
}

impl EventChannel for EventRing {
	type Slot = Entry;

	#[inline(always)]
	fn reserve(&self) -> Option<Entry> {
		EVENTS.reserve::<Event>(0).map(Entry)
	}
}

/// Bumps this CPU's drop counter and returns the new value.
#[inline(always)]
pub fn count_drop() -> u64 {
	match DROPPED.get_ptr_mut(0) {
		// per-CPU slot, no other writer
		Some(count) => unsafe {
			*count += 1;
			*count
		},
		None => 0,
	}
}

#![no_std]
#![no_main]

use aya_ebpf::{
	macros::{map, tracepoint},
	maps::{PerCpuArray, RingBuf},
	programs::TracePointContext,
};
use iotrace_common::RING_BYTE_SIZE;

mod hooks;
mod kernel;

#[map]
static EVENTS: RingBuf = RingBuf::with_byte_size(RING_BYTE_SIZE, 0);

// Reservation failures, one slot per CPU.
#[map]
static DROPPED: PerCpuArray<u64> = PerCpuArray::with_max_entries(1, 0);

#[tracepoint]
pub fn sys_enter_openat(ctx: TracePointContext) -> u32 {
	match hooks::try_sys_enter_openat(ctx) {
		Ok(ret) => ret,
		Err(_) => 0,
	}
}

#[tracepoint]
pub fn sys_enter_write(ctx: TracePointContext) -> u32 {
	match hooks::try_sys_enter_write(ctx) {
		Ok(ret) => ret,
		Err(_) => 0,
	}
}

#[tracepoint]
pub fn sys_enter_rename(ctx: TracePointContext) -> u32 {
	match hooks::try_sys_enter_rename(ctx) {
		Ok(ret) => ret,
		Err(_) => 0,
	}
}

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
	loop {}
}

#[link_section = "license"]
#[no_mangle]
static LICENSE: [u8; 13] = *b"Dual MIT/GPL\0";

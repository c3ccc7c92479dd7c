use aya::{
	maps::{MapData, PerCpuArray, RingBuf},
	programs::TracePoint,
	Ebpf,
};
use tokio::io::unix::AsyncFd;
use tracing::{info, warn};

use crate::error::{Error, Result};

pub const EVENTS_MAP: &str = "EVENTS";
pub const DROPPED_MAP: &str = "DROPPED";

/// (program, tracepoint category, tracepoint name)
pub const HOOKS: [(&str, &str, &str); 3] = [
	("sys_enter_openat", "syscalls", "sys_enter_openat"),
	("sys_enter_write", "syscalls", "sys_enter_write"),
	("sys_enter_rename", "syscalls", "sys_enter_rename"),
];

/// The loaded eBPF object. Programs stay attached and maps stay pinned in
/// the kernel for as long as this value lives; dropping it detaches every
/// program and releases the maps.
pub struct Tracker {
	ebpf: Ebpf,
}

impl Tracker {
	pub fn load() -> Result<Self> {
		// This will include your eBPF object file as raw bytes at compile-time and load it at
		// runtime.
		let mut ebpf = Ebpf::load(aya::include_bytes_aligned!(concat!(env!("OUT_DIR"), "/iotrace")))?;
		if let Err(e) = aya_log::EbpfLogger::init(&mut ebpf) {
			// This can happen if you remove all log statements from your eBPF program.
			warn!("failed to initialize eBPF logger: {e}");
		}

		Ok(Self { ebpf })
	}

	pub fn attach(&mut self) -> Result<()> {
		for (prog, category, name) in HOOKS {
			let tp: &mut TracePoint = self.ebpf.program_mut(prog).ok_or(Error::EbpfProgNotFound(prog))?.try_into()?;
			tp.load()?;
			tp.attach(category, name)?;
			info!("attached {prog} to {category}/{name}");
		}

		Ok(())
	}

	pub fn take_events(&mut self) -> Result<AsyncFd<RingBuf<MapData>>> {
		let map = self.ebpf.take_map(EVENTS_MAP).ok_or(Error::EbpfMapNotFound(EVENTS_MAP))?;
		let ring_buf = RingBuf::try_from(map)?;
		let fd = AsyncFd::new(ring_buf)?;
		Ok(fd)
	}

	pub fn take_drop_counter(&mut self) -> Result<PerCpuArray<MapData, u64>> {
		let map = self.ebpf.take_map(DROPPED_MAP).ok_or(Error::EbpfMapNotFound(DROPPED_MAP))?;
		let counter = PerCpuArray::try_from(map)?;
		Ok(counter)
	}
}

impl Drop for Tracker {
	fn drop(&mut self) {
		info!("detaching tracepoints");
	}
}

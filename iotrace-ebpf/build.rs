use which::which;

/// Rebuild the eBPF programs when `bpf-linker` changes; cargo does not track the
/// linker on its own.
fn main() {
	match which("bpf-linker") {
		Ok(bpf_linker) => println!("cargo:rerun-if-changed={}", bpf_linker.display()),
		Err(err) => println!("cargo:warning=bpf-linker not found: {err}"),
	}
}

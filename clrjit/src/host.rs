//! Host abstraction (spec.md §6, "Host-facing surface consumed by the
//! core"). Logging, allocation, executable mapping, GC hooks and file I/O
//! are all out-of-scope collaborators (spec.md §1); this trait gives them a
//! concrete Rust shape so a translator session can be handed a `&dyn Host`
//! for diagnostics, the way `cilium::structured::resolver` takes a
//! `&dyn AssemblyResolver` rather than hard-coding one lookup strategy.

use std::cell::{Cell, RefCell};

use fxhash::FxHashMap;

use crate::error::{JitError, JitResult};

/// Opaque handle standing in for the original's `tdn_file_t`.
pub type FileHandle = u64;

pub trait Host {
	fn log_trace(&self, message: &str);
	fn log_warn(&self, message: &str);
	fn log_error(&self, message: &str);

	/// Zero-initialized allocator for translator scratch memory.
	fn mallocz(&self, size: usize) -> *mut u8;
	fn realloc(&self, ptr: *mut u8, new_size: usize) -> *mut u8;
	fn free(&self, ptr: *mut u8);

	/// Request a read-write region, later transitioned to read+execute for
	/// JIT output pages.
	fn map(&self, size: usize) -> *mut u8;
	fn map_rx(&self, ptr: *mut u8, size: usize);

	/// Managed heap, used by the string collaborator rather than the
	/// translator directly (spec.md §6).
	fn gc_alloc(&self, size: usize) -> *mut u8;
	fn gc_register_root(&self, root: *mut u8);

	fn resolve_assembly(&self, name: &str, major_version: u16) -> JitResult<FileHandle>;
	fn read_file(&self, file: FileHandle, offset: usize, buffer: &mut [u8]) -> JitResult<()>;
	fn close_file(&self, file: FileHandle);

	fn error_to_string(&self, code: i32) -> String;
}

/// The crate's only concrete [`Host`]. Logging forwards to `tracing`
/// exactly as `cilium`'s own resolver and assembly-reading code does behind
/// `#[cfg_attr(feature = "tracing", tracing::instrument(...))]`; allocation
/// hooks use plain heap allocation since nothing in this crate's core calls
/// them — they exist purely so diagnostics have somewhere to go.
#[derive(Default)]
pub struct TracingHost {
	files: RefCell<FxHashMap<FileHandle, Vec<u8>>>,
	next_handle: Cell<FileHandle>,
}

impl TracingHost {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an in-memory file a test or demo can later "resolve" by
	/// name, since this host has no real assembly loader behind it.
	pub fn register_file(&self, contents: Vec<u8>) -> FileHandle {
		let handle = self.next_handle.get();
		self.next_handle.set(handle + 1);
		self.files.borrow_mut().insert(handle, contents);
		handle
	}
}

impl Host for TracingHost {
	fn log_trace(&self, message: &str) {
		#[cfg(feature = "tracing")]
		tracing::trace!("{message}");
		#[cfg(not(feature = "tracing"))]
		let _ = message;
	}

	fn log_warn(&self, message: &str) {
		#[cfg(feature = "tracing")]
		tracing::warn!("{message}");
		#[cfg(not(feature = "tracing"))]
		let _ = message;
	}

	fn log_error(&self, message: &str) {
		#[cfg(feature = "tracing")]
		tracing::error!("{message}");
		#[cfg(not(feature = "tracing"))]
		let _ = message;
	}

	fn mallocz(&self, size: usize) -> *mut u8 {
		let mut buf = vec![0u8; size].into_boxed_slice();
		let ptr = buf.as_mut_ptr();
		std::mem::forget(buf);
		ptr
	}

	fn realloc(&self, ptr: *mut u8, new_size: usize) -> *mut u8 {
		// Without a tracked prior length there is no length-safe way to copy
		// the old contents forward, so this stub only ever hands back fresh
		// zeroed memory; `ptr`'s old contents are dropped, not preserved.
		let _ = ptr;
		self.mallocz(new_size)
	}

	fn free(&self, ptr: *mut u8) {
		let _ = ptr;
	}

	fn map(&self, size: usize) -> *mut u8 {
		self.mallocz(size)
	}

	fn map_rx(&self, _ptr: *mut u8, _size: usize) {}

	fn gc_alloc(&self, size: usize) -> *mut u8 {
		self.mallocz(size)
	}

	fn gc_register_root(&self, _root: *mut u8) {}

	fn resolve_assembly(&self, name: &str, major_version: u16) -> JitResult<FileHandle> {
		self.log_trace(&format!("resolving assembly {name} v{major_version}"));
		Err(JitError::Host(format!("no assembly loader configured for '{name}'")))
	}

	fn read_file(&self, file: FileHandle, offset: usize, buffer: &mut [u8]) -> JitResult<()> {
		let files = self.files.borrow();
		let contents = files.get(&file).ok_or_else(|| JitError::Host("unknown file handle".to_string()))?;
		let end = offset.checked_add(buffer.len()).filter(|end| *end <= contents.len());
		match end {
			Some(end) => {
				buffer.copy_from_slice(&contents[offset..end]);
				Ok(())
			}
			None => Err(JitError::Host("read past end of file".to_string())),
		}
	}

	fn close_file(&self, file: FileHandle) {
		self.files.borrow_mut().remove(&file);
	}

	fn error_to_string(&self, code: i32) -> String {
		format!("error code {code}")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn registered_files_round_trip_through_read_file() {
		let host = TracingHost::new();
		let handle = host.register_file(b"hello world".to_vec());
		let mut buf = [0u8; 5];
		host.read_file(handle, 6, &mut buf).unwrap();
		assert_eq!(&buf, b"world");
		host.close_file(handle);
		assert!(host.read_file(handle, 0, &mut buf).is_err());
	}

	#[test]
	fn unresolved_assembly_is_a_host_error() {
		let host = TracingHost::new();
		assert!(host.resolve_assembly("System.Private.CoreLib", 8).is_err());
	}
}

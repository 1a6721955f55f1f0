use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Opaque handle returned by a delegate's `create`.
///
/// Only meaningful to the delegate that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RawHandle(pub usize);

/// The four operations consumed from an external native Markov library.
///
/// Calls are blocking. A delegate may assume it is never entered
/// concurrently for the same handle: [`NativeModel`] takes `&mut self`
/// and the backend keeps it behind a mutex.
///
/// Failures are reported as `BackendUnavailable`.
pub trait NativeDelegate: Send + Sync {
	/// Short identifier for logs.
	fn name(&self) -> &str;

	fn create(&self, order: usize) -> Result<RawHandle>;

	fn train(&self, handle: RawHandle, text: &str) -> Result<()>;

	fn generate(&self, handle: RawHandle, length: usize, start: &str) -> Result<String>;

	fn free(&self, handle: RawHandle);
}

/// A trained native model, freed when dropped.
pub struct NativeModel {
	delegate: Arc<dyn NativeDelegate>,
	handle: RawHandle,
}

impl NativeModel {
	pub fn create(delegate: Arc<dyn NativeDelegate>, order: usize) -> Result<Self> {
		let handle = delegate.create(order)?;
		Ok(Self { delegate, handle })
	}

	pub fn train(&mut self, text: &str) -> Result<()> {
		self.delegate.train(self.handle, text)
	}

	pub fn generate(&mut self, length: usize, start: &str) -> Result<String> {
		self.delegate.generate(self.handle, length, start)
	}
}

impl Drop for NativeModel {
	fn drop(&mut self) {
		self.delegate.free(self.handle);
	}
}

impl fmt::Debug for NativeModel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NativeModel")
			.field("delegate", &self.delegate.name())
			.field("handle", &self.handle)
			.finish()
	}
}

#[cfg(feature = "native")]
pub use dylib::DylibDelegate;

#[cfg(feature = "native")]
mod dylib {
	use std::ffi::{CStr, CString, c_char, c_int, c_void};

	use libloading::Library;

	use super::{NativeDelegate, RawHandle};
	use crate::config::NativeConfig;
	use crate::error::{MarkovError, Result};

	type CreateFn = unsafe extern "C" fn(c_int) -> *mut c_void;
	type TrainFn = unsafe extern "C" fn(*mut c_void, *const c_char);
	type GenerateFn = unsafe extern "C" fn(*mut c_void, c_int, *const c_char) -> *mut c_char;
	type FreeFn = unsafe extern "C" fn(*mut c_void);

	// The library allocates generated text with malloc and exports no
	// matching release function.
	unsafe extern "C" {
		fn free(ptr: *mut c_void);
	}

	fn unavailable(message: impl Into<String>) -> MarkovError {
		MarkovError::BackendUnavailable(message.into())
	}

	/// Delegate backed by a shared library loaded at runtime.
	///
	/// Expects the `markov_create_model`, `markov_train_model`,
	/// `markov_generate_text` and `markov_free_model` symbols.
	pub struct DylibDelegate {
		create: CreateFn,
		train: TrainFn,
		generate: GenerateFn,
		free: FreeFn,
		name: String,
		// Keeps the symbols above valid.
		_library: Library,
	}

	impl DylibDelegate {
		/// Loads `library_path` if it exists, otherwise `library_name`
		/// through the system loader.
		///
		/// # Errors
		/// Returns `BackendUnavailable` if the library or one of its
		/// symbols cannot be found.
		pub fn load(config: &NativeConfig) -> Result<Self> {
			let (library, name) = if config.library_path.exists() {
				// SAFETY: loading runs the library initializers, the library
				// is trusted configuration.
				let library = unsafe { Library::new(&config.library_path) };
				(library, config.library_path.display().to_string())
			} else {
				let filename = libloading::library_filename(&config.library_name);
				let name = filename.to_string_lossy().into_owned();
				// SAFETY: as above.
				(unsafe { Library::new(filename) }, name)
			};
			let library = library.map_err(|e| unavailable(format!("cannot load {name}: {e}")))?;

			// SAFETY: the signatures match the exported C declarations.
			unsafe {
				let create = *library
					.get::<CreateFn>(b"markov_create_model\0")
					.map_err(|e| unavailable(e.to_string()))?;
				let train = *library
					.get::<TrainFn>(b"markov_train_model\0")
					.map_err(|e| unavailable(e.to_string()))?;
				let generate = *library
					.get::<GenerateFn>(b"markov_generate_text\0")
					.map_err(|e| unavailable(e.to_string()))?;
				let free = *library
					.get::<FreeFn>(b"markov_free_model\0")
					.map_err(|e| unavailable(e.to_string()))?;

				Ok(Self { create, train, generate, free, name, _library: library })
			}
		}
	}

	impl NativeDelegate for DylibDelegate {
		fn name(&self) -> &str {
			&self.name
		}

		fn create(&self, order: usize) -> Result<RawHandle> {
			let order = c_int::try_from(order).map_err(|_| unavailable("order out of range"))?;
			// SAFETY: plain value argument.
			let model = unsafe { (self.create)(order) };
			if model.is_null() {
				return Err(unavailable("markov_create_model returned null"));
			}
			Ok(RawHandle(model as usize))
		}

		fn train(&self, handle: RawHandle, text: &str) -> Result<()> {
			let text = CString::new(text).map_err(|_| unavailable("training text contains NUL"))?;
			// SAFETY: the handle came from `create` and has not been freed,
			// `text` outlives the call.
			unsafe { (self.train)(handle.0 as *mut c_void, text.as_ptr()) };
			Ok(())
		}

		fn generate(&self, handle: RawHandle, length: usize, start: &str) -> Result<String> {
			let length = c_int::try_from(length).map_err(|_| unavailable("length out of range"))?;
			let start = CString::new(start).map_err(|_| unavailable("start text contains NUL"))?;
			// SAFETY: as in `train`.
			let text = unsafe { (self.generate)(handle.0 as *mut c_void, length, start.as_ptr()) };
			if text.is_null() {
				return Err(unavailable("markov_generate_text returned null"));
			}
			// SAFETY: non-null, NUL-terminated, malloc'd by the library and
			// owned by us from here on.
			unsafe {
				let generated = CStr::from_ptr(text).to_string_lossy().into_owned();
				free(text.cast());
				Ok(generated)
			}
		}

		fn free(&self, handle: RawHandle) {
			// SAFETY: `NativeModel` frees each handle exactly once.
			unsafe { (self.free)(handle.0 as *mut c_void) }
		}
	}
}

#[cfg(test)]
pub(crate) mod testing {
	use std::collections::HashMap;
	use std::sync::Mutex;
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

	use super::{NativeDelegate, RawHandle};
	use crate::error::{MarkovError, Result};

	/// Scripted delegate: echoes a fixed text, can be told to fail, and
	/// tracks live handles.
	#[derive(Default)]
	pub struct ScriptedDelegate {
		pub reply: String,
		pub fail_train: AtomicBool,
		pub fail_generate: AtomicBool,
		pub generate_calls: AtomicUsize,
		next: AtomicUsize,
		live: Mutex<HashMap<usize, usize>>,
		starts: Mutex<Vec<String>>,
	}

	impl ScriptedDelegate {
		pub fn replying(reply: &str) -> Self {
			Self { reply: reply.to_owned(), ..Self::default() }
		}

		pub fn live_handles(&self) -> usize {
			self.live.lock().map(|live| live.len()).unwrap_or(0)
		}

		/// Start texts received by `generate`, in call order.
		pub fn starts(&self) -> Vec<String> {
			self.starts.lock().unwrap().clone()
		}
	}

	impl NativeDelegate for ScriptedDelegate {
		fn name(&self) -> &str {
			"scripted"
		}

		fn create(&self, order: usize) -> Result<RawHandle> {
			let id = self.next.fetch_add(1, Ordering::SeqCst) + 1;
			self.live.lock().unwrap().insert(id, order);
			Ok(RawHandle(id))
		}

		fn train(&self, _handle: RawHandle, _text: &str) -> Result<()> {
			if self.fail_train.load(Ordering::SeqCst) {
				return Err(MarkovError::BackendUnavailable("scripted train failure".to_owned()));
			}
			Ok(())
		}

		fn generate(&self, handle: RawHandle, length: usize, start: &str) -> Result<String> {
			self.generate_calls.fetch_add(1, Ordering::SeqCst);
			self.starts.lock().unwrap().push(start.to_owned());
			if self.fail_generate.load(Ordering::SeqCst) {
				return Err(MarkovError::BackendUnavailable("scripted generate failure".to_owned()));
			}
			assert!(self.live.lock().unwrap().contains_key(&handle.0), "generate on a freed handle");
			Ok(self.reply.split_whitespace().take(length).collect::<Vec<_>>().join(" "))
		}

		fn free(&self, handle: RawHandle) {
			let removed = self.live.lock().unwrap().remove(&handle.0);
			assert!(removed.is_some(), "double free of {handle:?}");
		}
	}

	/// Behaves like the C library: lowercases the corpus, drops punctuation
	/// and continues after the first occurrence of the start words.
	#[derive(Default)]
	pub struct FoldingDelegate {
		next: AtomicUsize,
		corpora: Mutex<HashMap<usize, Vec<String>>>,
		starts: Mutex<Vec<String>>,
	}

	impl FoldingDelegate {
		pub fn starts(&self) -> Vec<String> {
			self.starts.lock().unwrap().clone()
		}
	}

	fn fold(text: &str) -> Vec<String> {
		text.split_whitespace()
			.map(|word| word.trim_matches(|c: char| c.is_ascii_punctuation()).to_lowercase())
			.filter(|word| !word.is_empty())
			.collect()
	}

	impl NativeDelegate for FoldingDelegate {
		fn name(&self) -> &str {
			"folding"
		}

		fn create(&self, _order: usize) -> Result<RawHandle> {
			let id = self.next.fetch_add(1, Ordering::SeqCst) + 1;
			self.corpora.lock().unwrap().insert(id, Vec::new());
			Ok(RawHandle(id))
		}

		fn train(&self, handle: RawHandle, text: &str) -> Result<()> {
			self.corpora.lock().unwrap().insert(handle.0, fold(text));
			Ok(())
		}

		fn generate(&self, handle: RawHandle, length: usize, start: &str) -> Result<String> {
			self.starts.lock().unwrap().push(start.to_owned());
			let corpora = self.corpora.lock().unwrap();
			let words = &corpora[&handle.0];
			if words.is_empty() {
				return Ok("Modelo no entrenado. Primero entrene con algun texto.".to_owned());
			}
			let start = fold(start);
			let from = words
				.windows(start.len().max(1))
				.position(|window| window == start.as_slice())
				.map_or(0, |at| at + start.len());
			Ok(words[from..].iter().take(length).cloned().collect::<Vec<_>>().join(" "))
		}

		fn free(&self, handle: RawHandle) {
			self.corpora.lock().unwrap().remove(&handle.0);
		}
	}
}

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Reads a whole training corpus into memory.
///
/// Invalid UTF-8 is reported as `InvalidData`.
pub fn read_corpus<P: AsRef<Path>>(filename: P) -> io::Result<String> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents)
}

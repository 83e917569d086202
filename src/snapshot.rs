//! JSONL snapshot files: atomic rewrite on output, line-checked parsing on input.

// std
use std::{
	fs::{self, File},
	io::{BufRead, BufReader, BufWriter, ErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::{_prelude::*, error::SnapshotError, record::Record};

/// Writes one snapshot into a sibling temp file and renames it over the target on commit.
///
/// Dropping the writer without [`SnapshotWriter::commit`] removes the temp file and leaves any
/// previous snapshot untouched.
#[derive(Debug)]
pub struct SnapshotWriter {
	path: PathBuf,
	tmp_path: PathBuf,
	file: Option<BufWriter<File>>,
	written: usize,
}
impl SnapshotWriter {
	/// Creates the parent directory and opens the temp file for `path`.
	pub fn create(path: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
		let path = path.into();

		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| io_error("create directory", parent, e))?;
		}

		let mut tmp_path = path.clone();

		tmp_path.set_extension("jsonl.tmp");

		let file = File::create(&tmp_path).map_err(|e| io_error("create", &tmp_path, e))?;

		Ok(Self { path, tmp_path, file: Some(BufWriter::new(file)), written: 0 })
	}

	/// Appends `record` as one line.
	pub fn write(&mut self, record: &Record) -> Result<(), SnapshotError> {
		let line = serde_json::to_vec(record).map_err(|source| SnapshotError::Json {
			path: self.path.display().to_string(),
			line: 0,
			source,
		})?;
		let Some(file) = self.file.as_mut() else {
			return Err(io_error("write", &self.tmp_path, ErrorKind::BrokenPipe.into()));
		};

		file.write_all(&line).map_err(|e| io_error("write", &self.tmp_path, e))?;
		file.write_all(b"\n").map_err(|e| io_error("write", &self.tmp_path, e))?;

		self.written += 1;

		Ok(())
	}

	/// Flushes, syncs, and replaces the target; returns the number of lines written.
	///
	/// On failure the temp file is removed and any previous snapshot is left untouched.
	pub fn commit(mut self) -> Result<usize, SnapshotError> {
		let persisted = self.persist();

		if persisted.is_err() {
			let _ = fs::remove_file(&self.tmp_path);
		}

		persisted.map(|()| self.written)
	}

	fn persist(&mut self) -> Result<(), SnapshotError> {
		if let Some(file) = self.file.take() {
			let file =
				file.into_inner().map_err(|e| io_error("flush", &self.tmp_path, e.into_error()))?;

			file.sync_all().map_err(|e| io_error("sync", &self.tmp_path, e))?;
		}

		fs::rename(&self.tmp_path, &self.path).map_err(|e| io_error("replace", &self.path, e))
	}
}
impl Drop for SnapshotWriter {
	fn drop(&mut self) {
		if self.file.take().is_some() {
			let _ = fs::remove_file(&self.tmp_path);
		}
	}
}

/// Parses every non-blank line of the snapshot at `path`.
pub fn read_snapshot(path: &Path) -> Result<Vec<Value>, SnapshotError> {
	let file = File::open(path).map_err(|e| io_error("open", path, e))?;
	let mut values = Vec::new();

	for (index, line) in BufReader::new(file).lines().enumerate() {
		let line = line.map_err(|e| io_error("read", path, e))?;

		if line.trim().is_empty() {
			continue;
		}

		let value = serde_json::from_str(&line).map_err(|source| SnapshotError::Json {
			path: path.display().to_string(),
			line: index + 1,
			source,
		})?;

		values.push(value);
	}

	Ok(values)
}

/// Like [`read_snapshot`], but a missing file names the job that produces it.
pub fn read_parent_snapshot(
	path: &Path,
	producer: &'static str,
) -> Result<Vec<Value>, SnapshotError> {
	if !path.exists() {
		return Err(SnapshotError::MissingParent { path: path.display().to_string(), producer });
	}

	read_snapshot(path)
}

fn io_error(action: &'static str, path: &Path, source: std::io::Error) -> SnapshotError {
	SnapshotError::Io { action, path: path.display().to_string(), source }
}

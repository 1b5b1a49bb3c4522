// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Background reload of the subject registry when its source file changes.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::registry::SubjectRegistry;

/// Quiet period after the last filesystem event before a reload runs.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Name written by the kubelet when it swaps a mounted ConfigMap or Secret.
const ATOMIC_SWAP_MARKER: &str = "..data";

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
	#[error("Subjects file {path} has no parent directory")]
	NoParent { path: PathBuf },

	#[error("Failed to watch {path}: {source}")]
	Notify {
		path: PathBuf,
		#[source]
		source: notify::Error,
	},
}

/// Keeps the watch alive; dropping it stops reloading.
pub struct RegistryWatcher {
	_watcher: RecommendedWatcher,
	task: JoinHandle<()>,
}

impl RegistryWatcher {
	/// Watch `path` and republish `registry` whenever it changes.
	///
	/// The parent directory is watched rather than the file itself so that
	/// replacing the file, or the symlink pointing at it, is still noticed.
	pub fn spawn(
		registry: SubjectRegistry,
		path: impl Into<PathBuf>,
		debounce: Duration,
	) -> Result<Self, WatchError> {
		let path = path.into();
		let parent = match path.parent() {
			Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
			Some(_) => PathBuf::from("."),
			None => return Err(WatchError::NoParent { path }),
		};

		let (tx, rx) = mpsc::unbounded_channel();
		let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
			// The receiver only goes away during shutdown.
			let _ = tx.send(result);
		})
		.map_err(|source| WatchError::Notify {
			path: parent.clone(),
			source,
		})?;

		watcher
			.watch(&parent, RecursiveMode::NonRecursive)
			.map_err(|source| WatchError::Notify {
				path: parent.clone(),
				source,
			})?;

		info!(path = %path.display(), watching = %parent.display(), "watching subjects file");
		let task = tokio::spawn(run(registry, path, rx, debounce));

		Ok(Self {
			_watcher: watcher,
			task,
		})
	}
}

impl Drop for RegistryWatcher {
	fn drop(&mut self) {
		self.task.abort();
	}
}

fn is_relevant(event: &Event, file_name: &OsString) -> bool {
	if event.kind.is_access() {
		return false;
	}
	event.paths.iter().any(|changed| {
		changed
			.file_name()
			.is_some_and(|name| name == file_name.as_os_str() || name == ATOMIC_SWAP_MARKER)
	})
}

#[instrument(skip(registry, path, rx), fields(path = %path.display()))]
async fn run(
	registry: SubjectRegistry,
	path: PathBuf,
	mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
	debounce: Duration,
) {
	let Some(file_name) = path.file_name().map(OsString::from) else {
		error!("subjects path has no file name, watcher stopped");
		return;
	};

	while let Some(result) = rx.recv().await {
		match result {
			Ok(event) if is_relevant(&event, &file_name) => {
				debug!(kind = ?event.kind, "subjects file changed");
			}
			Ok(_) => continue,
			Err(e) => {
				warn!(error = %e, "filesystem watch error");
				continue;
			}
		}

		// Coalesce the burst of events an editor or atomic swap produces.
		loop {
			match tokio::time::timeout(debounce, rx.recv()).await {
				Ok(Some(_)) => continue,
				Ok(None) => return,
				Err(_) => break,
			}
		}

		reload(&registry, &path);
	}

	debug!("watch channel closed");
}

fn reload(registry: &SubjectRegistry, path: &Path) {
	match registry.reload_from_file(path) {
		Ok(version) => info!(version, "subjects reloaded from file"),
		Err(e) => error!(
			error = %e,
			version = registry.version(),
			"rejected subjects file, keeping previous table"
		),
	}
}

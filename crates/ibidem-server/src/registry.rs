// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Subject registry: which repository may act as which service account.
//!
//! The registry publishes immutable [`SubjectTable`] snapshots through a
//! `tokio::sync::watch` channel. A reload builds and validates the complete
//! replacement table first and only then swaps it in, so a lookup sees either
//! the previous table or the new one and never a blend of both.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ibidem_server_config::Subject;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
	#[error("Failed to read subjects file {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse subjects file {path}: {message}")]
	Parse { path: PathBuf, message: String },

	#[error("Repository {repository} is listed more than once")]
	DuplicateRepository { repository: String },

	#[error("Subject for '{repository}' has an empty {field}")]
	EmptyField {
		repository: String,
		field: &'static str,
	},
}

/// One immutable generation of the registry.
#[derive(Debug, Clone, Default)]
pub struct SubjectTable {
	version: u64,
	subjects: Vec<Subject>,
	by_repository: HashMap<String, usize>,
}

impl SubjectTable {
	fn build(subjects: Vec<Subject>) -> Result<Self, RegistryError> {
		let mut by_repository = HashMap::with_capacity(subjects.len());
		for (index, subject) in subjects.iter().enumerate() {
			check_fields(subject)?;
			if by_repository
				.insert(subject.repository.clone(), index)
				.is_some()
			{
				return Err(RegistryError::DuplicateRepository {
					repository: subject.repository.clone(),
				});
			}
		}

		Ok(Self {
			version: 0,
			subjects,
			by_repository,
		})
	}

	/// Exact, case-sensitive match on the repository name.
	pub fn lookup(&self, repository: &str) -> Option<&Subject> {
		self.by_repository
			.get(repository)
			.map(|&index| &self.subjects[index])
	}

	pub fn version(&self) -> u64 {
		self.version
	}

	/// Subjects in source order.
	pub fn subjects(&self) -> &[Subject] {
		&self.subjects
	}

	pub fn len(&self) -> usize {
		self.subjects.len()
	}

	pub fn is_empty(&self) -> bool {
		self.subjects.is_empty()
	}
}

fn check_fields(subject: &Subject) -> Result<(), RegistryError> {
	let fields = [
		("repository", &subject.repository),
		("namespace", &subject.namespace),
		("service_account", &subject.service_account),
	];
	for (field, value) in fields {
		if value.trim().is_empty() {
			return Err(RegistryError::EmptyField {
				repository: subject.repository.clone(),
				field,
			});
		}
	}
	Ok(())
}

/// Process-wide handle to the current subject table.
///
/// Cloning is cheap; every clone observes the same snapshots.
#[derive(Clone)]
pub struct SubjectRegistry {
	current: Arc<watch::Sender<Arc<SubjectTable>>>,
}

impl SubjectRegistry {
	/// Build the first generation (version 1) from `subjects`.
	pub fn new(subjects: Vec<Subject>) -> Result<Self, RegistryError> {
		let mut table = SubjectTable::build(subjects)?;
		table.version = 1;
		if table.is_empty() {
			warn!("subject registry is empty, every exchange will be refused");
		}

		let (current, _) = watch::channel(Arc::new(table));
		Ok(Self {
			current: Arc::new(current),
		})
	}

	pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
		Self::new(load_subjects_file(path)?)
	}

	/// The table visible right now. Holding it does not block reloads.
	pub fn snapshot(&self) -> Arc<SubjectTable> {
		self.current.borrow().clone()
	}

	pub fn lookup(&self, repository: &str) -> Option<Subject> {
		self.snapshot().lookup(repository).cloned()
	}

	pub fn version(&self) -> u64 {
		self.current.borrow().version
	}

	/// Receive a notification each time a new table is published.
	pub fn subscribe(&self) -> watch::Receiver<Arc<SubjectTable>> {
		self.current.subscribe()
	}

	/// Replace the whole table. On error the current table stays published.
	///
	/// Returns the version of the newly published table.
	pub fn reload(&self, subjects: Vec<Subject>) -> Result<u64, RegistryError> {
		let mut table = SubjectTable::build(subjects)?;
		let mut published = 0;
		self.current.send_modify(|current| {
			table.version = current.version + 1;
			published = table.version;
			*current = Arc::new(table);
		});

		let subjects = self.snapshot().len();
		if subjects == 0 {
			warn!(
				version = published,
				"reloaded subject registry is empty, every exchange will be refused"
			);
		}
		info!(version = published, subjects, "subject registry reloaded");
		Ok(published)
	}

	pub fn reload_from_file(&self, path: &Path) -> Result<u64, RegistryError> {
		self.reload(load_subjects_file(path)?)
	}
}

impl std::fmt::Debug for SubjectRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let table = self.snapshot();
		f.debug_struct("SubjectRegistry")
			.field("version", &table.version)
			.field("subjects", &table.len())
			.finish()
	}
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SubjectsFile {
	#[serde(default)]
	deploy_subjects: Vec<Subject>,
}

/// Read a subjects file. `.yaml`/`.yml` files parse as YAML, anything else as TOML.
pub fn load_subjects_file(path: &Path) -> Result<Vec<Subject>, RegistryError> {
	let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
		path: path.to_path_buf(),
		source,
	})?;

	let is_yaml = matches!(
		path.extension().and_then(|ext| ext.to_str()),
		Some("yaml" | "yml")
	);
	let parsed: Result<SubjectsFile, String> = if is_yaml {
		serde_yaml::from_str(&content).map_err(|e| e.to_string())
	} else {
		toml::from_str(&content).map_err(|e| e.to_string())
	};

	parsed
		.map(|file| file.deploy_subjects)
		.map_err(|message| RegistryError::Parse {
			path: path.to_path_buf(),
			message,
		})
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use proptest::prelude::*;

	use super::*;

	fn subject(repository: &str, namespace: &str, service_account: &str) -> Subject {
		Subject {
			repository: repository.to_string(),
			namespace: namespace.to_string(),
			service_account: service_account.to_string(),
		}
	}

	#[test]
	fn lookup_is_exact_and_case_sensitive() {
		let registry =
			SubjectRegistry::new(vec![subject("org/repo", "default", "deploy-svc")]).unwrap();

		assert_eq!(
			registry.lookup("org/repo"),
			Some(subject("org/repo", "default", "deploy-svc"))
		);
		assert_eq!(registry.lookup("Org/Repo"), None);
		assert_eq!(registry.lookup("org/repo2"), None);
		assert_eq!(registry.lookup("org"), None);
	}

	#[test]
	fn first_generation_is_version_one() {
		let registry = SubjectRegistry::new(Vec::new()).unwrap();
		assert_eq!(registry.version(), 1);
		assert!(registry.snapshot().is_empty());
	}

	#[test]
	fn duplicate_repository_is_rejected() {
		let err = SubjectRegistry::new(vec![
			subject("org/repo", "a", "one"),
			subject("org/repo", "b", "two"),
		])
		.unwrap_err();
		assert!(
			matches!(err, RegistryError::DuplicateRepository { ref repository } if repository == "org/repo")
		);
	}

	#[test]
	fn empty_fields_are_rejected() {
		let err = SubjectRegistry::new(vec![subject("org/repo", "default", " ")]).unwrap_err();
		assert!(matches!(
			err,
			RegistryError::EmptyField {
				field: "service_account",
				..
			}
		));
	}

	#[test]
	fn reload_replaces_whole_table_and_bumps_version() {
		let registry = SubjectRegistry::new(vec![
			subject("org/a", "default", "a"),
			subject("org/b", "default", "b"),
		])
		.unwrap();

		let version = registry
			.reload(vec![subject("org/c", "prod", "c")])
			.unwrap();

		assert_eq!(version, 2);
		assert_eq!(registry.version(), 2);
		assert_eq!(registry.lookup("org/a"), None);
		assert_eq!(registry.lookup("org/b"), None);
		assert_eq!(registry.lookup("org/c"), Some(subject("org/c", "prod", "c")));
	}

	#[test]
	fn failed_reload_keeps_previous_table() {
		let registry = SubjectRegistry::new(vec![subject("org/a", "default", "a")]).unwrap();

		let result = registry.reload(vec![
			subject("org/b", "default", "b"),
			subject("org/b", "default", "b2"),
		]);

		assert!(result.is_err());
		assert_eq!(registry.version(), 1);
		assert_eq!(registry.lookup("org/a"), Some(subject("org/a", "default", "a")));
		assert_eq!(registry.lookup("org/b"), None);
	}

	#[test]
	fn held_snapshot_is_unaffected_by_reload() {
		let registry = SubjectRegistry::new(vec![subject("org/a", "default", "a")]).unwrap();
		let before = registry.snapshot();

		registry
			.reload(vec![subject("org/b", "default", "b")])
			.unwrap();

		assert_eq!(before.version(), 1);
		assert!(before.lookup("org/a").is_some());
		assert!(before.lookup("org/b").is_none());
		assert!(registry.snapshot().lookup("org/b").is_some());
	}

	#[test]
	fn subscribers_see_new_generations() {
		let registry = SubjectRegistry::new(Vec::new()).unwrap();
		let mut receiver = registry.subscribe();
		assert!(!receiver.has_changed().unwrap());

		registry
			.reload(vec![subject("org/a", "default", "a")])
			.unwrap();

		assert!(receiver.has_changed().unwrap());
		assert_eq!(receiver.borrow_and_update().version(), 2);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_readers_never_see_mixed_generations() {
		fn generation(tag: &str) -> Vec<Subject> {
			(0..16)
				.map(|i| subject(&format!("org/repo-{i}"), tag, tag))
				.collect()
		}

		let registry = SubjectRegistry::new(generation("gen-a")).unwrap();

		let readers: Vec<_> = (0..4)
			.map(|_| {
				let registry = registry.clone();
				tokio::spawn(async move {
					for _ in 0..500 {
						let table = registry.snapshot();
						let first = &table.subjects()[0].namespace;
						assert!(table.subjects().iter().all(|s| &s.namespace == first));
						tokio::task::yield_now().await;
					}
				})
			})
			.collect();

		for round in 0..200 {
			let tag = if round % 2 == 0 { "gen-b" } else { "gen-a" };
			registry.reload(generation(tag)).unwrap();
			tokio::task::yield_now().await;
		}

		for reader in readers {
			reader.await.unwrap();
		}
		assert_eq!(registry.version(), 201);
	}

	#[test]
	fn loads_yaml_subjects_file() {
		let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
		write!(
			file,
			"deploy_subjects:\n  - repository: org/repo\n    namespace: default\n    service_account: deploy-svc\n"
		)
		.unwrap();

		let subjects = load_subjects_file(file.path()).unwrap();
		assert_eq!(subjects, vec![subject("org/repo", "default", "deploy-svc")]);
	}

	#[test]
	fn loads_toml_subjects_file() {
		let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
		write!(
			file,
			"[[deploy_subjects]]\nrepository = \"org/repo\"\nnamespace = \"default\"\nservice_account = \"deploy-svc\"\n"
		)
		.unwrap();

		let registry = SubjectRegistry::from_file(file.path()).unwrap();
		assert_eq!(
			registry.lookup("org/repo"),
			Some(subject("org/repo", "default", "deploy-svc"))
		);
	}

	#[test]
	fn unparseable_file_is_reported() {
		let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
		write!(file, "deploy_subjects: [ {{ repository: ").unwrap();

		assert!(matches!(
			load_subjects_file(file.path()),
			Err(RegistryError::Parse { .. })
		));
	}

	#[test]
	fn mistyped_top_level_key_is_rejected() {
		let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
		write!(
			yaml,
			"deploy_subject:\n  - repository: org/repo\n    namespace: default\n    service_account: deploy-svc\n"
		)
		.unwrap();
		assert!(matches!(
			load_subjects_file(yaml.path()),
			Err(RegistryError::Parse { .. })
		));

		let mut toml = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
		write!(
			toml,
			"[[deploy_subject]]\nrepository = \"org/repo\"\nnamespace = \"default\"\nservice_account = \"deploy-svc\"\n"
		)
		.unwrap();
		assert!(matches!(
			load_subjects_file(toml.path()),
			Err(RegistryError::Parse { .. })
		));
	}

	#[test]
	fn mistyped_file_on_reload_keeps_previous_table() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("subjects.yaml");
		std::fs::write(
			&path,
			"deploy_subjects:\n  - repository: org/a\n    namespace: default\n    service_account: a\n",
		)
		.unwrap();
		let registry = SubjectRegistry::from_file(&path).unwrap();

		std::fs::write(
			&path,
			"deploy_subject:\n  - repository: org/b\n    namespace: default\n    service_account: b\n",
		)
		.unwrap();

		assert!(registry.reload_from_file(&path).is_err());
		assert_eq!(registry.version(), 1);
		assert!(registry.lookup("org/a").is_some());
	}

	#[test]
	fn explicit_empty_list_is_accepted_on_reload() {
		let registry = SubjectRegistry::new(vec![subject("org/a", "default", "a")]).unwrap();

		assert_eq!(registry.reload(Vec::new()).unwrap(), 2);
		assert!(registry.snapshot().is_empty());
	}

	#[test]
	fn missing_file_is_reported() {
		assert!(matches!(
			load_subjects_file(Path::new("/nonexistent/subjects.yaml")),
			Err(RegistryError::Read { .. })
		));
	}

	fn repository_name() -> impl Strategy<Value = String> {
		"[A-Za-z0-9_-]{1,12}/[A-Za-z0-9_.-]{1,16}"
	}

	proptest! {
		#[test]
		fn lookup_returns_exactly_the_registered_pair(
			repos in proptest::collection::hash_set(repository_name(), 1..24),
			other in repository_name(),
		) {
			let subjects: Vec<Subject> = repos
				.iter()
				.enumerate()
				.map(|(i, repo)| subject(repo, &format!("ns-{i}"), &format!("sa-{i}")))
				.collect();
			let registry = SubjectRegistry::new(subjects.clone()).unwrap();

			for expected in &subjects {
				prop_assert_eq!(registry.lookup(&expected.repository), Some(expected.clone()));
			}
			if !repos.contains(&other) {
				prop_assert_eq!(registry.lookup(&other), None);
			}
		}
	}
}

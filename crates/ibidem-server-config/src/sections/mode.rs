// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Operating mode.

use std::str::FromStr;

use serde::Deserialize;

/// Selects how inbound tokens are verified.
///
/// `Debug` swaps the issuer's published keys for a fixed, publicly known
/// symmetric key so tokens can be minted offline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
	#[default]
	Release,
	Debug,
}

impl Mode {
	pub fn is_debug(self) -> bool {
		self == Mode::Debug
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Mode::Release => "release",
			Mode::Debug => "debug",
		}
	}
}

impl FromStr for Mode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"release" => Ok(Mode::Release),
			"debug" => Ok(Mode::Debug),
			other => Err(format!("unknown mode '{other}', expected 'release' or 'debug'")),
		}
	}
}

impl std::fmt::Display for Mode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_is_release() {
		assert_eq!(Mode::default(), Mode::Release);
		assert!(!Mode::default().is_debug());
	}

	#[test]
	fn test_parse_is_case_insensitive() {
		assert_eq!("Debug".parse::<Mode>(), Ok(Mode::Debug));
		assert_eq!("RELEASE".parse::<Mode>(), Ok(Mode::Release));
		assert!("verbose".parse::<Mode>().is_err());
	}

	#[test]
	fn test_deserialize_lowercase() {
		#[derive(Deserialize)]
		struct Wrapper {
			mode: Mode,
		}
		let parsed: Wrapper = toml::from_str(r#"mode = "debug""#).unwrap();
		assert_eq!(parsed.mode, Mode::Debug);
	}
}

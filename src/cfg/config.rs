// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{cfg::logger::LoggerConfig, frame::MAX_DESCRIPTORS};

/// Runtime tuning for a [`crate::responder::Responder`] instance.
///
/// None of these fields travel over the wire — the protocol has no
/// negotiation phase — they only shape how this process's responder
/// behaves locally.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResponderConfig {
    /// Maximum scatter/gather descriptors accepted per read/write call.
    /// Capped at [`MAX_DESCRIPTORS`] regardless of the configured value.
    #[serde(default = "default_max_descriptors")]
    pub max_descriptors: usize,

    /// Size, in bytes, of the scratch buffer used to discard an orphan
    /// response's payload or the remainder of an oversized one.
    #[serde(default = "default_discard_chunk_size")]
    pub discard_chunk_size: usize,

    /// Logging configuration.
    #[serde(default)]
    pub logger: Option<LoggerConfig>,
}

fn default_max_descriptors() -> usize {
    MAX_DESCRIPTORS
}

fn default_discard_chunk_size() -> usize {
    4096
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            max_descriptors: default_max_descriptors(),
            discard_chunk_size: default_discard_chunk_size(),
            logger: None,
        }
    }
}

impl ResponderConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;
        let cfg: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {path:?}"))?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cap_descriptors_at_the_wire_limit() {
        let cfg = ResponderConfig::default();
        assert_eq!(cfg.max_descriptors, MAX_DESCRIPTORS);
        assert!(cfg.discard_chunk_size > 0);
    }

    #[test]
    fn parses_minimal_yaml() {
        let cfg: ResponderConfig = serde_yaml::from_str("max_descriptors: 8\n")
            .expect("minimal yaml should parse with defaults filled in");
        assert_eq!(cfg.max_descriptors, 8);
        assert_eq!(cfg.discard_chunk_size, default_discard_chunk_size());
    }
}

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::fmt;

use crate::error::ConfigError;

/// Which of the four key tables a [`KeyNameRegistry`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryKind {
    Applications,
    Operations,
    IdTypes,
    PayloadTypes,
}

impl RegistryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryKind::Applications => "applications",
            RegistryKind::Operations => "operations",
            RegistryKind::IdTypes => "idTypes",
            RegistryKind::PayloadTypes => "payloadTypes",
        }
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static mapping of configured keys to human-readable names.
///
/// Keys are unique; adding an existing key is a configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNameRegistry {
    kind: RegistryKind,
    entries: HashMap<String, String>,
}

impl KeyNameRegistry {
    pub fn new(kind: RegistryKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    /// Parses a `key:Name,key2:Name 2` list.
    ///
    /// Entries are separated by commas and split on the first colon, so names
    /// may contain spaces. Blank entries are skipped; any other entry without
    /// both a key and a name is rejected.
    pub fn parse(kind: RegistryKind, raw: &str) -> Result<Self, ConfigError> {
        let mut registry = Self::new(kind);
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, name) = entry
                .split_once(':')
                .map(|(key, name)| (key.trim(), name.trim()))
                .filter(|(key, name)| !key.is_empty() && !name.is_empty())
                .ok_or_else(|| ConfigError::Unparsable {
                    name: kind.as_str(),
                    value: entry.to_string(),
                })?;
            registry.add_entry(key, name)?;
        }
        Ok(registry)
    }

    pub fn kind(&self) -> RegistryKind {
        self.kind
    }

    pub fn add_entry(
        &mut self,
        key: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<(), ConfigError> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(ConfigError::DuplicateKey {
                key,
                kind: self.kind,
            });
        }
        self.entries.insert(key, name.into());
        Ok(())
    }

    pub fn add_entries<K, N>(
        &mut self,
        entries: impl IntoIterator<Item = (K, N)>,
    ) -> Result<(), ConfigError>
    where
        K: Into<String>,
        N: Into<String>,
    {
        for (key, name) in entries {
            self.add_entry(key, name)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.entries.values().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Variants (product flavors) and build types.
//!
//! A variant is a named, mutually exclusive set of capability flags and an
//! optional manifest override. Exactly one variant is active per run.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::error::StageError;

/// Value of a capability flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Str(String),
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Bool(b) => write!(f, "{}", b),
            FlagValue::Str(s) => write!(f, "{}", s),
        }
    }
}

/// A declared variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variant {
    pub name: String,

    /// Capability flags, e.g. `ALLOW_EDITING = false`
    pub flags: BTreeMap<String, FlagValue>,

    /// Platform manifest used by this variant, relative to the project root
    pub manifest: Option<PathBuf>,
}

impl Variant {
    pub fn new(name: impl Into<String>) -> Self {
        Variant {
            name: name.into(),
            flags: BTreeMap::new(),
            manifest: None,
        }
    }

    pub fn with_flag(mut self, name: impl Into<String>, value: FlagValue) -> Self {
        self.flags.insert(name.into(), value);
        self
    }

    pub fn flag(&self, name: &str) -> Option<&FlagValue> {
        self.flags.get(name)
    }

    /// Boolean flag lookup; absent or non-boolean flags read as `false`.
    pub fn is_enabled(&self, name: &str) -> bool {
        matches!(self.flags.get(name), Some(FlagValue::Bool(true)))
    }

    /// Interpolation variables contributed by this variant.
    pub fn vars(&self) -> Vec<(String, String)> {
        let mut out = vec![("variant".to_string(), self.name.clone())];
        if let Some(ref manifest) = self.manifest {
            out.push((
                "variant.manifest".to_string(),
                manifest.display().to_string(),
            ));
        }
        for (name, value) in &self.flags {
            out.push((format!("flag.{}", name), value.to_string()));
        }
        out
    }
}

/// All variants declared by a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantTable {
    variants: BTreeMap<String, Variant>,
}

impl VariantTable {
    pub fn new() -> Self {
        VariantTable::default()
    }

    pub fn insert(&mut self, variant: Variant) {
        self.variants.insert(variant.name.clone(), variant);
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.variants.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.variants.values()
    }

    /// Look a variant up by name.
    pub fn select(&self, name: &str) -> Result<&Variant, StageError> {
        self.variants
            .get(name)
            .ok_or_else(|| StageError::UnknownVariant {
                name: name.to_string(),
                available: self.names(),
            })
    }
}

/// Pick the active variant for a run.
///
/// `requested` (command line) wins over `default` (config). When neither is
/// given, a single declared variant is chosen implicitly. A manifest with no
/// variants yields `None` unless a name was asked for.
pub fn select_variant<'a>(
    table: &'a VariantTable,
    requested: Option<&str>,
    default: Option<&str>,
) -> Result<Option<&'a Variant>, StageError> {
    if let Some(name) = requested.or(default) {
        return table.select(name).map(Some);
    }

    match table.len() {
        0 => Ok(None),
        1 => Ok(table.iter().next()),
        _ => Err(StageError::UnknownVariant {
            name: String::new(),
            available: table.names(),
        }),
    }
}

/// Build types (e.g. debug/release) and their placeholder values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildTypes {
    types: BTreeMap<String, BTreeMap<String, String>>,
}

/// Build type used when none is requested.
pub const DEFAULT_BUILD_TYPE: &str = "debug";

impl BuildTypes {
    pub fn new(types: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        BuildTypes { types }
    }

    pub fn names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    /// Placeholders for a build type.
    ///
    /// A manifest that declares no build types accepts any name with no
    /// placeholders.
    pub fn placeholders(&self, name: &str) -> Result<BTreeMap<String, String>, StageError> {
        if self.types.is_empty() {
            return Ok(BTreeMap::new());
        }
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| StageError::UnknownBuildType {
                name: name.to_string(),
                available: self.names(),
            })
    }
}

//! Stage.toml manifest parsing and schema.
//!
//! The manifest declares the project, its variables, variants, build types
//! and staging steps. Step declarations keep their `{{var}}` templates
//! unexpanded; they are instantiated against a selected variant and build
//! type by [`crate::builder::StageContext`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::variant::{BuildTypes, FlagValue, Variant, VariantTable};

/// Canonical manifest file name.
pub const MANIFEST_NAME: &str = "Stage.toml";

/// The parsed Stage.toml manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Project metadata
    pub project: ProjectMetadata,

    /// Manifest-level variables (lowest precedence after built-ins)
    pub vars: BTreeMap<String, String>,

    /// Declared variants
    pub variants: VariantTable,

    /// Declared build types
    pub build_types: BuildTypes,

    /// Optional generated build-config file
    pub build_config: Option<BuildConfigDecl>,

    /// Step declarations in file order
    pub steps: Vec<StepDecl>,

    /// The directory containing this manifest
    pub manifest_dir: PathBuf,
}

/// Project metadata from the [project] section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectMetadata {
    /// Project name
    pub name: String,

    /// Application identifier, exposed as `{{application_id}}`
    #[serde(default)]
    pub application_id: Option<String>,

    /// Steps run when none are named on the command line (default: all)
    #[serde(default)]
    pub default_steps: Vec<String>,
}

/// Generated build-config file from the [build-config] section.
///
/// Written with the selected variant's flags and the extra fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfigDecl {
    pub path: String,

    /// Extra `key = value` fields, values may use `{{var}}`
    #[serde(default)]
    pub fields: Vec<(String, String)>,
}

/// A string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s.clone()],
            OneOrMany::Many(v) => v.clone(),
        }
    }
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

/// A `[[step]]` declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct StepDecl {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Base directory for copy specs and relative to the project root
    #[serde(default)]
    pub into: Option<String>,

    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub inputs: Vec<String>,

    #[serde(default)]
    pub outputs: Vec<String>,

    #[serde(default)]
    pub mkdir: Vec<String>,

    #[serde(default)]
    pub touch: Vec<String>,

    #[serde(default)]
    pub copy: Vec<CopyDecl>,

    #[serde(default)]
    pub config: Vec<ConfigDecl>,

    #[serde(default)]
    pub exec: Option<ExecDecl>,
}

/// A `[[step.copy]]` declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyDecl {
    /// Destination below the step's `into`
    #[serde(default)]
    pub into: Option<String>,

    /// Source root(s), relative to the project root unless absolute
    pub from: OneOrMany,

    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// `[from, to]` literal file name replacements
    #[serde(default)]
    pub rename: Vec<(String, String)>,

    /// `[token, value]` per-line replacements
    #[serde(default)]
    pub filter: Vec<(String, String)>,

    #[serde(default)]
    pub optional: bool,
}

/// A `[[step.config]]` declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigDecl {
    pub path: String,

    #[serde(default, rename = "section")]
    pub sections: Vec<SectionDecl>,
}

/// A `[[step.config.section]]` declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionDecl {
    pub name: String,

    #[serde(default)]
    pub entries: Vec<(String, String)>,
}

/// A `[step.exec]` declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecDecl {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory, relative to the project root
    #[serde(default)]
    pub cwd: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Raw manifest as deserialized from TOML.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawManifest {
    project: ProjectMetadata,

    #[serde(default)]
    vars: BTreeMap<String, String>,

    #[serde(default)]
    variants: BTreeMap<String, RawVariant>,

    #[serde(default)]
    build_types: BTreeMap<String, BTreeMap<String, String>>,

    #[serde(default)]
    build_config: Option<BuildConfigDecl>,

    #[serde(default, rename = "step")]
    steps: Vec<StepDecl>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVariant {
    #[serde(default)]
    manifest: Option<PathBuf>,

    #[serde(default)]
    flags: BTreeMap<String, FlagValue>,
}

impl Manifest {
    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;

        Self::parse(&content, path)
    }

    /// Parse manifest content.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let raw: RawManifest = toml::from_str(content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let manifest_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();

        if raw.project.name.trim().is_empty() {
            bail!("manifest at {} has an empty project name", path.display());
        }

        for step in &raw.steps {
            if step.name.trim().is_empty() {
                bail!("manifest at {} declares a step without a name", path.display());
            }
            for copy in &step.copy {
                if copy.from.to_vec().is_empty() {
                    bail!("step `{}`: copy has no `from` source", step.name);
                }
            }
        }

        let mut variants = VariantTable::new();
        for (name, raw_variant) in raw.variants {
            variants.insert(Variant {
                name,
                flags: raw_variant.flags,
                manifest: raw_variant.manifest,
            });
        }

        Ok(Manifest {
            project: raw.project,
            vars: raw.vars,
            variants,
            build_types: BuildTypes::new(raw.build_types),
            build_config: raw.build_config,
            steps: raw.steps,
            manifest_dir,
        })
    }

    /// Look up a step declaration by name.
    pub fn step(&self, name: &str) -> Option<&StepDecl> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Names of all declared steps, in file order.
    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }

    /// Steps to run when none are requested explicitly.
    pub fn default_steps(&self) -> Vec<String> {
        if self.project.default_steps.is_empty() {
            self.step_names()
        } else {
            self.project.default_steps.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
[project]
name = "viewer"
application-id = "org.example.viewer"
default-steps = ["createRCfiles"]

[vars]
instdir = "../instdir"

[variants.strippedUI]
flags = { ALLOW_EDITING = false }

[variants.quest]
manifest = "AndroidManifest_quest.xml"
flags = { ALLOW_EDITING = false, DEVICE_FAMILY = "headset" }

[build-types.debug]
installLocation = "auto"

[build-types.release]
installLocation = "preferExternal"

[build-config]
path = "generated/buildconfig.ini"
fields = [["VENDOR", "{{vendor}}"]]

[[step]]
name = "copyUnpackAssets"
into = "assets/unpack"

[[step.copy]]
into = "program"
from = "{{instdir}}/program"
include = ["types.rdb"]
rename = [["types.rdb", "udkapi.rdb"]]

[[step.copy]]
into = "etc/fonts"
from = ["."]
include = ["fonts.conf"]
filter = [["@@APPLICATION_ID@@", "{{application_id}}"]]

[[step]]
name = "createRCfiles"
depends-on = ["copyUnpackAssets"]

[[step.config]]
path = "assets/program/versionrc"

[[step.config.section]]
name = "Version"
entries = [["AllLanguages", "en-US"], ["buildid", "{{git_commit}}"]]
"#;

    #[test]
    fn test_parse_manifest() {
        let m = Manifest::parse(MANIFEST, Path::new("/p/Stage.toml")).unwrap();

        assert_eq!(m.project.name, "viewer");
        assert_eq!(m.project.application_id.as_deref(), Some("org.example.viewer"));
        assert_eq!(m.manifest_dir, PathBuf::from("/p"));
        assert_eq!(m.vars["instdir"], "../instdir");
        assert_eq!(m.variants.names(), vec!["quest", "strippedUI"]);
        assert_eq!(m.build_types.names(), vec!["debug", "release"]);
        assert_eq!(m.default_steps(), vec!["createRCfiles"]);
        assert_eq!(m.step_names(), vec!["copyUnpackAssets", "createRCfiles"]);
    }

    #[test]
    fn test_parse_copy_and_config_decls() {
        let m = Manifest::parse(MANIFEST, Path::new("/p/Stage.toml")).unwrap();

        let unpack = m.step("copyUnpackAssets").unwrap();
        assert_eq!(unpack.into.as_deref(), Some("assets/unpack"));
        assert_eq!(unpack.copy.len(), 2);
        assert_eq!(unpack.copy[0].from.to_vec(), vec!["{{instdir}}/program"]);
        assert_eq!(
            unpack.copy[0].rename,
            vec![("types.rdb".to_string(), "udkapi.rdb".to_string())]
        );
        assert_eq!(unpack.copy[1].filter[0].0, "@@APPLICATION_ID@@");

        let rc = m.step("createRCfiles").unwrap();
        assert_eq!(rc.depends_on, vec!["copyUnpackAssets"]);
        assert_eq!(rc.config[0].sections[0].name, "Version");
        assert_eq!(rc.config[0].sections[0].entries[1].1, "{{git_commit}}");
    }

    #[test]
    fn test_parse_variant_flags() {
        let m = Manifest::parse(MANIFEST, Path::new("/p/Stage.toml")).unwrap();
        let quest = m.variants.select("quest").unwrap();
        assert_eq!(quest.flag("ALLOW_EDITING"), Some(&FlagValue::Bool(false)));
        assert_eq!(
            quest.flag("DEVICE_FAMILY"),
            Some(&FlagValue::Str("headset".into()))
        );
        assert_eq!(
            quest.manifest.as_deref(),
            Some(Path::new("AndroidManifest_quest.xml"))
        );
    }

    #[test]
    fn test_default_steps_fall_back_to_all() {
        let m = Manifest::parse(
            "[project]\nname = \"x\"\n[[step]]\nname = \"a\"\n[[step]]\nname = \"b\"\n",
            Path::new("Stage.toml"),
        )
        .unwrap();
        assert_eq!(m.default_steps(), vec!["a", "b"]);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = Manifest::parse(
            "[project]\nname = \"x\"\n[[step]]\nname = \"a\"\ndepends = [\"b\"]\n",
            Path::new("Stage.toml"),
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("depends"));
    }

    #[test]
    fn test_missing_project_is_rejected() {
        assert!(Manifest::parse("[[step]]\nname = \"a\"\n", Path::new("Stage.toml")).is_err());
    }

    #[test]
    fn test_empty_from_is_rejected() {
        let err = Manifest::parse(
            "[project]\nname = \"x\"\n[[step]]\nname = \"a\"\n[[step.copy]]\nfrom = []\n",
            Path::new("Stage.toml"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no `from` source"));
    }
}

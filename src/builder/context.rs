//! Stage context - selected variant, build type and variables.
//!
//! The context is fixed before any step is instantiated: variant selection
//! happens first, so an unknown variant fails before the graph is built or
//! any file is touched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::builder::graph::TaskGraph;
use crate::builder::template::{ConfigBlock, ConfigSection};
use crate::core::error::StageError;
use crate::core::manifest::{BuildConfigDecl, Manifest, StepDecl};
use crate::core::step::{ConfigFile, CopySpec, ExecSpec, StagingStep, StepAction};
use crate::core::variant::{select_variant, FlagValue, Variant, DEFAULT_BUILD_TYPE};
use crate::core::vars::Vars;
use crate::core::Workspace;
use crate::util::config::Config;

/// Per-invocation choices from the command line.
#[derive(Debug, Clone, Default)]
pub struct StageOptions {
    /// Requested variant (overrides config)
    pub variant: Option<String>,

    /// Requested build type (overrides config)
    pub build_type: Option<String>,

    /// `--var key=value` overrides, highest precedence
    pub vars: Vec<(String, String)>,

    /// Worker threads for file copies
    pub jobs: Option<usize>,

    /// Re-run every step regardless of freshness
    pub force: bool,
}

/// Everything needed to instantiate and run steps.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub project_root: PathBuf,

    pub project_name: String,

    /// Active variant, if the manifest declares any
    pub variant: Option<Variant>,

    pub build_type: String,

    /// Fully layered variables
    pub vars: Vars,

    pub jobs: Option<usize>,

    /// Whether fresh steps may be skipped
    pub incremental: bool,
}

impl StageContext {
    /// Create a context for a loaded workspace.
    pub fn new(ws: &Workspace, config: &Config, options: &StageOptions) -> Result<Self> {
        Self::from_manifest(ws.manifest(), config, options)
    }

    /// Create a context from a manifest and merged configuration.
    pub fn from_manifest(
        manifest: &Manifest,
        config: &Config,
        options: &StageOptions,
    ) -> Result<Self> {
        let variant = select_variant(
            &manifest.variants,
            options.variant.as_deref(),
            config.stage.variant.as_deref(),
        )?
        .cloned();

        let build_type = options
            .build_type
            .clone()
            .or_else(|| config.stage.build_type.clone())
            .unwrap_or_else(|| DEFAULT_BUILD_TYPE.to_string());
        let placeholders = manifest.build_types.placeholders(&build_type)?;

        let project_root = manifest.manifest_dir.clone();

        // Lowest precedence first; later inserts win.
        let mut vars = Vars::new();
        vars.insert("project_root", project_root.display().to_string());
        vars.insert("project_name", manifest.project.name.clone());
        vars.insert("build_type", build_type.clone());
        if let Some(ref id) = manifest.project.application_id {
            vars.insert("application_id", id.clone());
        }
        vars.extend(placeholders);
        if let Some(ref variant) = variant {
            vars.extend(variant.vars());
        }
        vars.extend(manifest.vars.clone());
        vars.extend(config.vars.clone());
        vars.extend(options.vars.iter().cloned());

        tracing::debug!(
            "stage context: variant={:?} build_type={}",
            variant.as_ref().map(|v| v.name.as_str()),
            build_type
        );

        Ok(StageContext {
            project_root,
            project_name: manifest.project.name.clone(),
            variant,
            build_type,
            vars,
            jobs: options.jobs.or(config.stage.jobs),
            incremental: !options.force && config.incremental(),
        })
    }

    pub fn variant_name(&self) -> Option<&str> {
        self.variant.as_ref().map(|v| v.name.as_str())
    }

    fn path(&self, base: &Path, input: &str, context: &str) -> Result<PathBuf, StageError> {
        self.vars.expand_path(base, input, context)
    }

    fn paths(&self, inputs: &[String], context: &str) -> Result<Vec<PathBuf>, StageError> {
        inputs
            .iter()
            .map(|s| self.path(&self.project_root, s, context))
            .collect()
    }

    fn pairs(
        &self,
        pairs: &[(String, String)],
        context: &str,
    ) -> Result<Vec<(String, String)>, StageError> {
        pairs
            .iter()
            .map(|(k, v)| -> Result<(String, String), StageError> {
                Ok((self.vars.expand(k, context)?, self.vars.expand(v, context)?))
            })
            .collect()
    }

    /// Turn a step declaration into a concrete step.
    ///
    /// Every `{{var}}` is expanded and every path is anchored at the project
    /// root (copy destinations at the step's `into`).
    pub fn instantiate(&self, decl: &StepDecl) -> Result<StagingStep, StageError> {
        let context = format!("step `{}`", decl.name);
        let ctx = context.as_str();
        let root = &self.project_root;

        let step_base = match decl.into {
            Some(ref into) => self.path(root, into, ctx)?,
            None => root.clone(),
        };

        let mut step = StagingStep::new(decl.name.clone()).depends_on(decl.depends_on.iter().cloned());
        step.description = match decl.description {
            Some(ref d) => Some(self.vars.expand(d, ctx)?),
            None => None,
        };
        step.inputs = self.paths(&decl.inputs, ctx)?;
        step.outputs = self.paths(&decl.outputs, ctx)?;

        for dir in &decl.mkdir {
            step.actions.push(StepAction::Mkdir {
                path: self.path(root, dir, ctx)?,
            });
        }

        for file in &decl.touch {
            step.actions.push(StepAction::Touch {
                path: self.path(root, file, ctx)?,
            });
        }

        for copy in &decl.copy {
            let dest = match copy.into {
                Some(ref into) => self.path(&step_base, into, ctx)?,
                None => step_base.clone(),
            };
            let mut spec = CopySpec::new(dest).optional(copy.optional);
            spec.sources = self.paths(&copy.from.to_vec(), ctx)?;
            spec.includes = self.vars.expand_all(&copy.include, ctx)?;
            spec.excludes = self.vars.expand_all(&copy.exclude, ctx)?;
            for (from, to) in self.pairs(&copy.rename, ctx)? {
                spec = spec.rename(from, to);
            }
            for (token, value) in self.pairs(&copy.filter, ctx)? {
                spec = spec.filter(token, value);
            }
            step.actions.push(StepAction::Copy(spec));
        }

        for config in &decl.config {
            let mut block = ConfigBlock::new();
            for section in &config.sections {
                let mut rendered = ConfigSection::new(self.vars.expand(&section.name, ctx)?);
                rendered.entries = self.pairs(&section.entries, ctx)?;
                block = block.with_section(rendered);
            }
            step.actions.push(StepAction::WriteConfig(ConfigFile {
                path: self.path(root, &config.path, ctx)?,
                block,
            }));
        }

        if let Some(ref exec) = decl.exec {
            let cwd = match exec.cwd {
                Some(ref cwd) => self.path(root, cwd, ctx)?,
                None => root.clone(),
            };
            let mut env = BTreeMap::new();
            for (k, v) in &exec.env {
                env.insert(k.clone(), self.vars.expand(v, ctx)?);
            }
            step.actions.push(StepAction::Exec(ExecSpec {
                program: self.vars.expand(&exec.program, ctx)?,
                args: self.vars.expand_all(&exec.args, ctx)?,
                cwd,
                env,
            }));
        }

        Ok(step)
    }

    /// Instantiate every declared step and register it in a new graph.
    pub fn build_graph(&self, manifest: &Manifest) -> Result<TaskGraph, StageError> {
        let mut graph = TaskGraph::new();
        for decl in &manifest.steps {
            graph.register_step(self.instantiate(decl)?)?;
        }
        Ok(graph)
    }

    /// The `[BuildConfig]` file for the active variant.
    ///
    /// Entries are `BUILD_TYPE`, `FLAVOR` (when a variant is active), the
    /// variant's flags, then the declared extra fields.
    pub fn build_config(&self, decl: &BuildConfigDecl) -> Result<ConfigFile, StageError> {
        let ctx = "[build-config]";
        let mut section = ConfigSection::new("BuildConfig").entry("BUILD_TYPE", self.build_type.clone());

        if let Some(ref variant) = self.variant {
            section = section.entry("FLAVOR", variant.name.clone());
            for (name, value) in &variant.flags {
                let rendered = match value {
                    FlagValue::Bool(b) => b.to_string(),
                    FlagValue::Str(s) => s.clone(),
                };
                section = section.entry(name.clone(), rendered);
            }
        }

        section.entries.extend(self.pairs(&decl.fields, ctx)?);

        Ok(ConfigFile {
            path: self.path(&self.project_root, &decl.path, ctx)?,
            block: ConfigBlock::new().with_section(section),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
[project]
name = "viewer"
application-id = "org.example.viewer"

[vars]
instdir = "/build/instdir"
vendor = "The Document Foundation"

[variants.strippedUI]
flags = { ALLOW_EDITING = false }

[variants.strippedUIEditing]
flags = { ALLOW_EDITING = true }

[build-types.debug]
installLocation = "auto"

[build-types.release]
installLocation = "preferExternal"

[build-config]
path = "generated/BuildConfig.ini"
fields = [["VENDOR", "{{vendor}}"]]

[[step]]
name = "copyUnpackAssets"
into = "assets/unpack"
touch = ["assets/unpack/.keep"]

[[step.copy]]
into = "program"
from = "{{instdir}}/program"
include = ["types.rdb"]
rename = [["types.rdb", "udkapi.rdb"]]

[[step.copy]]
into = "etc/fonts"
from = "{{instdir}}/share/fonts/truetype/fc_local.conf"
filter = [["@@APPLICATION_ID@@", "{{application_id}}"]]

[[step]]
name = "createRCfiles"
depends-on = ["copyUnpackAssets"]

[[step.config]]
path = "assets/program/unorc"

[[step.config.section]]
name = "Bootstrap"
entries = [["URE_INTERNAL_LIB_DIR", "file://$APP_DATA_DIR/lib/"], ["Edit", "{{flag.ALLOW_EDITING}}"]]

[[step]]
name = "createStrippedConfigRegistry"

[step.exec]
program = "python3"
args = ["{{instdir}}/bin/mobile-config.py", "{{project_root}}/main.xcd"]
"#;

    fn manifest() -> Manifest {
        Manifest::parse(MANIFEST, Path::new("/src/android/Stage.toml")).unwrap()
    }

    fn options(variant: &str) -> StageOptions {
        StageOptions {
            variant: Some(variant.to_string()),
            ..StageOptions::default()
        }
    }

    #[test]
    fn test_unknown_variant_fails_first() {
        let err = StageContext::from_manifest(&manifest(), &Config::default(), &options("tablet"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StageError>(),
            Some(StageError::UnknownVariant { .. })
        ));
    }

    #[test]
    fn test_ambiguous_variant_without_default() {
        let err = StageContext::from_manifest(&manifest(), &Config::default(), &StageOptions::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StageError>(),
            Some(StageError::UnknownVariant { name, .. }) if name.is_empty()
        ));
    }

    #[test]
    fn test_config_supplies_variant_and_build_type() {
        let mut config = Config::default();
        config.stage.variant = Some("strippedUIEditing".into());
        config.stage.build_type = Some("release".into());

        let ctx = StageContext::from_manifest(&manifest(), &config, &StageOptions::default()).unwrap();
        assert_eq!(ctx.variant_name(), Some("strippedUIEditing"));
        assert_eq!(ctx.vars.get("installLocation"), Some("preferExternal"));
        assert_eq!(ctx.vars.get("flag.ALLOW_EDITING"), Some("true"));
    }

    #[test]
    fn test_unknown_build_type() {
        let opts = StageOptions {
            build_type: Some("profile".into()),
            ..options("strippedUI")
        };
        let err = StageContext::from_manifest(&manifest(), &Config::default(), &opts).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StageError>(),
            Some(StageError::UnknownBuildType { .. })
        ));
    }

    #[test]
    fn test_variable_precedence() {
        let mut config = Config::default();
        config.vars.insert("instdir".into(), "/config/instdir".into());

        let ctx = StageContext::from_manifest(&manifest(), &config, &options("strippedUI")).unwrap();
        assert_eq!(ctx.vars.get("instdir"), Some("/config/instdir"));

        let opts = StageOptions {
            vars: vec![("instdir".into(), "/cli/instdir".into())],
            ..options("strippedUI")
        };
        let ctx = StageContext::from_manifest(&manifest(), &config, &opts).unwrap();
        assert_eq!(ctx.vars.get("instdir"), Some("/cli/instdir"));
        assert_eq!(ctx.vars.get("project_root"), Some("/src/android"));
    }

    #[test]
    fn test_instantiate_copy_step() {
        let m = manifest();
        let ctx = StageContext::from_manifest(&m, &Config::default(), &options("strippedUI")).unwrap();
        let step = ctx.instantiate(m.step("copyUnpackAssets").unwrap()).unwrap();

        let specs: Vec<_> = step.copy_specs().collect();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].dest, PathBuf::from("/src/android/assets/unpack/program"));
        assert_eq!(specs[0].sources, vec![PathBuf::from("/build/instdir/program")]);
        assert_eq!(specs[0].rename_file("types.rdb"), "udkapi.rdb");
        assert_eq!(specs[1].filters[0].value, "org.example.viewer");
        assert_eq!(
            step.actions[0],
            StepAction::Touch {
                path: PathBuf::from("/src/android/assets/unpack/.keep")
            }
        );
    }

    #[test]
    fn test_instantiate_config_keeps_shell_syntax() {
        let m = manifest();
        let ctx = StageContext::from_manifest(&m, &Config::default(), &options("strippedUI")).unwrap();
        let step = ctx.instantiate(m.step("createRCfiles").unwrap()).unwrap();

        let file = step.config_files().next().unwrap();
        assert_eq!(file.path, PathBuf::from("/src/android/assets/program/unorc"));
        assert_eq!(
            file.block.sections[0].entries,
            vec![
                ("URE_INTERNAL_LIB_DIR".to_string(), "file://$APP_DATA_DIR/lib/".to_string()),
                ("Edit".to_string(), "false".to_string()),
            ]
        );
    }

    #[test]
    fn test_instantiate_exec() {
        let m = manifest();
        let ctx = StageContext::from_manifest(&m, &Config::default(), &options("strippedUI")).unwrap();
        let step = ctx
            .instantiate(m.step("createStrippedConfigRegistry").unwrap())
            .unwrap();
        match &step.actions[0] {
            StepAction::Exec(exec) => {
                assert_eq!(exec.program, "python3");
                assert_eq!(
                    exec.args,
                    vec!["/build/instdir/bin/mobile-config.py", "/src/android/main.xcd"]
                );
                assert_eq!(exec.cwd, PathBuf::from("/src/android"));
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_undefined_variable_names_step() {
        let m = Manifest::parse(
            "[project]\nname = \"x\"\n[[step]]\nname = \"copyFonts\"\n[[step.copy]]\nfrom = \"{{fontdir}}\"\n",
            Path::new("/p/Stage.toml"),
        )
        .unwrap();
        let ctx = StageContext::from_manifest(&m, &Config::default(), &StageOptions::default()).unwrap();
        let err = ctx.build_graph(&m).unwrap_err();
        assert_eq!(err.to_string(), "undefined variable `fontdir` in step `copyFonts`");
    }

    #[test]
    fn test_build_config_block() {
        let m = manifest();
        let ctx = StageContext::from_manifest(&m, &Config::default(), &options("strippedUI")).unwrap();
        let file = ctx.build_config(m.build_config.as_ref().unwrap()).unwrap();

        assert_eq!(file.path, PathBuf::from("/src/android/generated/BuildConfig.ini"));
        assert_eq!(
            crate::builder::template::render(&file.block),
            "[BuildConfig]\nBUILD_TYPE=debug\nFLAVOR=strippedUI\nALLOW_EDITING=false\nVENDOR=The Document Foundation\n"
        );
    }

    #[test]
    fn test_build_graph_orders_steps() {
        let m = manifest();
        let ctx = StageContext::from_manifest(&m, &Config::default(), &options("strippedUI")).unwrap();
        let graph = ctx.build_graph(&m).unwrap();
        let order: Vec<_> = graph
            .resolve(&["createRCfiles".to_string()])
            .unwrap()
            .into_iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(order, vec!["copyUnpackAssets", "createRCfiles"]);
    }
}

//! Layered loading of compilation [`Options`]
//!
//! Sources are applied lowest priority first: the embedded `defaults/tickplate.default.toml`,
//! TOML files in the order they were added, `TICKPLATE_*` environment variables, then the values
//! set on the loader itself. The merged options are checked the way [`compile`] checks them, so a
//! bad `locals` name is reported when the configuration is loaded rather than on first use.
//!
//! [`compile`]: crate::tickplate::engine::compile

use config::{Config, ConfigError, Environment, File, FileFormat, Map, ValueKind};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::tickplate::engine::{check_locals, Options};
use crate::tickplate::error::CompilationError;

const DEFAULT_TOML: &str = include_str!("../../defaults/tickplate.default.toml");

/// Prefix of the environment variables read by [`OptionsLoader::with_environment`].
pub const ENV_PREFIX: &str = "TICKPLATE";

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Invalid(#[from] CompilationError),
}

#[derive(Debug, Clone)]
struct TomlSource {
    path: PathBuf,
    required: bool,
}

/// Collects option sources and merges them in [`OptionsLoader::build`].
#[derive(Debug, Clone, Default)]
pub struct OptionsLoader {
    files: Vec<TomlSource>,
    environment: Option<Environment>,
    overrides: Vec<(&'static str, ValueKind)>,
}

impl OptionsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer a TOML file; building fails if it does not exist.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.files.push(TomlSource {
            path: path.as_ref().to_path_buf(),
            required: true,
        });
        self
    }

    /// Layer a TOML file that is skipped when absent.
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        self.files.push(TomlSource {
            path: path.as_ref().to_path_buf(),
            required: false,
        });
        self
    }

    /// Read `TICKPLATE_WITH`, `TICKPLATE_LOCALS` and `TICKPLATE_DEBUG` from the process
    /// environment.
    pub fn with_environment(self) -> Self {
        self.with_environment_source(None)
    }

    /// Like [`with_environment`](Self::with_environment), with `vars` standing in for the
    /// process environment when given.
    pub fn with_environment_source(mut self, vars: Option<Map<String, String>>) -> Self {
        self.environment = Some(Environment::with_prefix(ENV_PREFIX).source(vars));
        self
    }

    pub fn with_scope(self, enabled: bool) -> Self {
        self.set("with", enabled)
    }

    pub fn locals(self, name: impl Into<String>) -> Self {
        self.set("locals", name.into())
    }

    pub fn debug(self, enabled: bool) -> Self {
        self.set("debug", enabled)
    }

    fn set(mut self, key: &'static str, value: impl Into<ValueKind>) -> Self {
        self.overrides.push((key, value.into()));
        self
    }

    pub fn build(self) -> Result<Options, OptionsError> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        for file in self.files {
            builder = builder.add_source(
                File::from(file.path)
                    .format(FileFormat::Toml)
                    .required(file.required),
            );
        }
        if let Some(environment) = self.environment {
            builder = builder.add_source(environment);
        }
        for (key, value) in self.overrides {
            builder = builder.set_override(key, value)?;
        }
        let options: Options = builder.build()?.try_deserialize()?;
        check_locals(&options.locals)?;
        Ok(options)
    }
}

/// The embedded defaults, without any layering.
pub fn load_defaults() -> Result<Options, OptionsError> {
    OptionsLoader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Option<Map<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        )
    }

    #[test]
    fn loads_default_options() {
        let options = load_defaults().expect("defaults to deserialize");
        assert_eq!(options, Options::default());
    }

    #[test]
    fn setters_override_defaults() {
        let options = OptionsLoader::new()
            .with_scope(false)
            .locals("ctx")
            .build()
            .unwrap();
        assert!(!options.with_scope);
        assert_eq!(options.locals, "ctx");
        assert!(!options.debug);
    }

    #[test]
    fn layers_files_over_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "debug = true").unwrap();

        let options = OptionsLoader::new().with_file(file.path()).build().unwrap();
        assert!(options.debug);
        assert!(options.with_scope);
    }

    #[test]
    fn environment_sits_between_files_and_setters() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "locals = \"data\"\ndebug = true").unwrap();

        let options = OptionsLoader::new()
            .with_file(file.path())
            .with_environment_source(vars(&[
                ("TICKPLATE_LOCALS", "env"),
                ("TICKPLATE_WITH", "false"),
                ("OTHER_DEBUG", "false"),
            ]))
            .debug(false)
            .build()
            .unwrap();
        assert_eq!(options.locals, "env");
        assert!(!options.with_scope);
        assert!(!options.debug);

        let options = OptionsLoader::new()
            .with_environment_source(vars(&[("TICKPLATE_LOCALS", "env")]))
            .locals("flag")
            .build()
            .unwrap();
        assert_eq!(options.locals, "flag");
    }

    #[test]
    fn invalid_locals_are_rejected_on_load() {
        let error = OptionsLoader::new().locals("not valid").build().unwrap_err();
        assert!(matches!(
            error,
            OptionsError::Invalid(CompilationError::InvalidLocals(ref name)) if name == "not valid"
        ));
        assert!(OptionsLoader::new().locals("__append").build().is_err());
    }

    #[test]
    fn missing_optional_file_is_ignored() {
        let options = OptionsLoader::new()
            .with_optional_file("does/not/exist.toml")
            .build()
            .unwrap();
        assert_eq!(options, Options::default());
    }

    #[test]
    fn missing_required_file_fails() {
        let error = OptionsLoader::new()
            .with_file("does/not/exist.toml")
            .build()
            .unwrap_err();
        assert!(matches!(error, OptionsError::Config(_)));
    }
}

//! Task Kinds
//!
//! A [`Stage`] is one kind of pipeline step: it declares how it reads its
//! upstream (bindings), whether it fans out (array schema), where its
//! outputs land, and which external tools one shard of it invokes.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::error::{GraphError, StageError};
use crate::shard::{scatter, ShardIndex};

use super::binding::{ArraySpec, Binding};
use super::value::{Value, ValueMap};

/// What a stage sees when it declares its outputs.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub output_dir: &'a Path,
    pub inputs: &'a ValueMap,
}

/// Behaviour of one task kind.
pub trait Stage: Debug + Send + Sync {
    /// Kind name; also the directory name appended to the upstream output dir.
    fn name(&self) -> &'static str;

    /// Ordered input schema.
    fn bindings(&self) -> &'static [Binding];

    /// Shard schema for array kinds.
    fn array(&self) -> Option<ArraySpec> {
        None
    }

    /// Declared outputs, derived from the output directory and inputs only.
    fn outputs(&self, ctx: &StageContext<'_>) -> Result<ValueMap, GraphError>;

    /// Tool invocations for one shard (or for every unit when unsharded).
    fn commands(&self, request: &ShardRequest<'_>) -> Result<Vec<ToolCommand>, StageError>;
}

/// Arguments handed to a stage executable, already parsed from the wire.
#[derive(Debug, Clone)]
pub struct ShardRequest<'a> {
    pub args: &'a ValueMap,
    pub output_dir: PathBuf,
    pub shard: Option<ShardIndex>,
    /// Extra tool flags from the stage's tool options file
    pub options: &'a ValueMap,
    /// Directory of helper scripts
    pub script_dir: &'a Path,
}

impl<'a> ShardRequest<'a> {
    /// Returns a required single-valued argument.
    pub fn require(&self, key: &str) -> Result<&'a str, StageError> {
        self.args
            .get(key)
            .and_then(|v| v.items().into_iter().next())
            .ok_or_else(|| StageError::MissingArgument(key.to_string()))
    }

    /// Returns an optional single-valued argument.
    pub fn optional(&self, key: &str) -> Option<&'a str> {
        self.args.get(key).and_then(|v| v.items().into_iter().next())
    }

    /// Returns every entry of a list argument.
    pub fn items(&self, key: &str) -> Vec<&'a str> {
        self.args.get_items(key)
    }

    /// Returns the entries of a list argument that belong to this shard.
    pub fn scattered(&self, key: &str) -> Result<Vec<&'a str>, StageError> {
        let items = self.items(key);
        if items.is_empty() {
            return Err(StageError::MissingArgument(key.to_string()));
        }
        Ok(scatter(&items, self.shard)?)
    }

    /// Returns the paired-end layout flag.
    pub fn is_paired(&self) -> bool {
        self.optional("layout") == Some(super::binding::PAIRED_END)
    }

    /// Directory of one sample/unit below the stage output directory.
    pub fn unit_dir(&self, unit: &str) -> PathBuf {
        self.output_dir.join(unit)
    }

    pub fn script(&self, name: &str) -> PathBuf {
        self.script_dir.join(name)
    }
}

/// One external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Directory created before the run; receives stdout.log and stderr.log
    pub log_dir: PathBuf,
    /// Redirect stdout into this file instead of stdout.log
    pub stdout_to: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            log_dir: log_dir.into(),
            stdout_to: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends `key value`, with the key used verbatim.
    pub fn option(mut self, key: &str, value: impl Into<String>) -> Self {
        self.args.push(key.to_string());
        self.args.push(value.into());
        self
    }

    /// Appends every entry of a tool options map, keys verbatim.
    pub fn options(mut self, options: &ValueMap) -> Self {
        for (key, value) in options.iter() {
            match value {
                Value::Flag(true) => self.args.push(key.to_string()),
                Value::Flag(false) => {}
                Value::Text(s) => {
                    self.args.push(key.to_string());
                    self.args.push(s.clone());
                }
                Value::List(items) => {
                    self.args.push(key.to_string());
                    self.args.extend(items.iter().cloned());
                }
            }
        }
        self
    }

    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_to = Some(path.into());
        self
    }

    /// Shell-like rendering for logs and dry-run previews.
    pub fn display(&self) -> String {
        let mut rendered = std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(path) = &self.stdout_to {
            rendered.push_str(&format!(" > {}", path.display()));
        }
        rendered
    }
}

/// Builds a per-unit output map: for every `(key, file)` pair, one path per
/// unit at `<output_dir>/<unit>/<file>`.
pub fn per_unit_outputs(output_dir: &Path, units: &[&str], files: &[(&str, &str)]) -> ValueMap {
    files
        .iter()
        .map(|(key, file)| {
            let paths: Vec<String> = units
                .iter()
                .map(|unit| output_dir.join(unit).join(file).to_string_lossy().into_owned())
                .collect();
            (*key, Value::List(paths))
        })
        .collect()
}

/// Name of the sample directory a per-sample file lives in.
pub fn unit_of(path: &str) -> String {
    Path::new(path)
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

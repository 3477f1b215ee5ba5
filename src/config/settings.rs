//! Settings, Assets and Tool Options
//!
//! All three are YAML files. Settings describe the scheduler and where the
//! stage executable and helper scripts live; assets map each reference
//! genome and annotation to its index and annotation files; tool options
//! hold extra flags for one stage's external tool.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::graph::{Value, ValueMap};
use crate::paths::{expand_vars, symbolic_home};
use crate::submit::SchedulerSettings;
use crate::APP_NAME;

/// Environment variable pointing at the settings file.
pub const SETTINGS_ENV: &str = "RNASEQDE_SETTINGS";

/// Settings file used when the variable is unset.
pub const DEFAULT_SETTINGS: &str = "config/rnaseqde.yml";

/// The running binary; stage tasks re-invoke it.
static CURRENT_EXE: Lazy<PathBuf> = Lazy::new(|| match env::current_exe() {
    Ok(path) => symbolic_home(&path),
    Err(e) => {
        debug!("Cannot resolve current executable ({}); using PATH lookup", e);
        PathBuf::from(APP_NAME)
    }
});

/// Engine settings.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub scheduler: SchedulerSettings,
    /// Stage executable; defaults to the running binary
    pub executable: Option<PathBuf>,
    /// Directory of per-stage tool option files (`<stage>.yml`)
    pub tool_conf_dir: Option<PathBuf>,
    /// Directory of helper scripts; defaults to `scripts/` next to the
    /// executable
    pub script_dir: Option<PathBuf>,
}

impl Settings {
    /// Loads settings from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No settings at {}; using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Loads settings from `$RNASEQDE_SETTINGS`, or the default location.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = env::var_os(SETTINGS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS));
        Self::load(&path)
    }

    /// Path of the stage executable.
    pub fn executable(&self) -> PathBuf {
        self.executable.clone().unwrap_or_else(|| CURRENT_EXE.clone())
    }

    /// Directory of helper scripts.
    pub fn script_dir(&self) -> PathBuf {
        match &self.script_dir {
            Some(dir) => dir.clone(),
            None => CURRENT_EXE
                .parent()
                .map(|p| p.join("scripts"))
                .unwrap_or_else(|| PathBuf::from("scripts")),
        }
    }

    /// Extra tool flags for `stage`. Without a tool options directory, or
    /// without a file for the stage, there are none.
    pub fn tool_options(&self, stage: &str) -> Result<ValueMap, ConfigError> {
        let Some(dir) = &self.tool_conf_dir else {
            return Ok(ValueMap::new());
        };

        let path = dir.join(format!("{}.yml", stage));
        if !path.exists() {
            debug!("No tool options for {} at {}", stage, path.display());
            return Ok(ValueMap::new());
        }

        let mapping = read_mapping(&path)?;
        mapping_to_values(&mapping, &path)
    }
}

/// Reference -> annotation -> asset values, in file order.
#[derive(Debug, Clone, Default)]
pub struct Assets {
    references: Vec<(String, Vec<(String, ValueMap)>)>,
}

impl Assets {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mapping = read_mapping(path)?;
        Self::from_mapping(&mapping, path)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let path = Path::new("<assets>");
        let mapping = serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_mapping(&mapping, path)
    }

    fn from_mapping(mapping: &serde_yaml::Mapping, path: &Path) -> Result<Self, ConfigError> {
        let mut references = Vec::new();

        for (reference, annotations) in mapping {
            let reference = key_string(reference, path)?;
            let annotations = annotations.as_mapping().ok_or_else(|| ConfigError::InvalidOption {
                option: format!("{} in {}", reference, path.display()),
                value: "expected a mapping of annotations".to_string(),
            })?;

            let mut entries = Vec::new();
            for (annotation, values) in annotations {
                let annotation = key_string(annotation, path)?;
                let values = values.as_mapping().ok_or_else(|| ConfigError::InvalidOption {
                    option: format!("{}/{} in {}", reference, annotation, path.display()),
                    value: "expected a mapping of asset paths".to_string(),
                })?;
                entries.push((annotation, expand_values(&mapping_to_values(values, path)?)));
            }
            references.push((reference, entries));
        }

        Ok(Self { references })
    }

    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.references.iter().map(|(name, _)| name.as_str())
    }

    /// Annotations of `reference`: all of them, or only `annotation`.
    pub fn annotations(
        &self,
        reference: &str,
        annotation: Option<&str>,
    ) -> Result<Vec<(String, ValueMap)>, ConfigError> {
        let (_, entries) = self
            .references
            .iter()
            .find(|(name, _)| name == reference)
            .ok_or_else(|| ConfigError::UnknownReference(reference.to_string()))?;

        let Some(wanted) = annotation else {
            return Ok(entries.clone());
        };

        entries
            .iter()
            .find(|(name, _)| name == wanted)
            .map(|entry| vec![entry.clone()])
            .ok_or_else(|| ConfigError::UnknownAnnotation {
                reference: reference.to_string(),
                annotation: wanted.to_string(),
            })
    }
}

fn read_mapping(path: &Path) -> Result<serde_yaml::Mapping, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(serde_yaml::Mapping::new());
    }
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

fn key_string(key: &serde_yaml::Value, path: &Path) -> Result<String, ConfigError> {
    scalar_string(key).ok_or_else(|| ConfigError::InvalidOption {
        option: format!("key in {}", path.display()),
        value: format!("{:?}", key),
    })
}

fn scalar_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Expands environment variables in asset paths; tools receive them
/// without a shell in between.
fn expand_values(values: &ValueMap) -> ValueMap {
    values
        .iter()
        .map(|(key, value)| {
            let expanded = match value {
                Value::Text(s) => Value::Text(expand_vars(s)),
                Value::List(items) => Value::List(items.iter().map(|s| expand_vars(s)).collect()),
                Value::Flag(b) => Value::Flag(*b),
            };
            (key, expanded)
        })
        .collect()
}

/// Converts a flat YAML mapping into values. Null entries are dropped,
/// numbers become text, sequences become lists of scalars.
fn mapping_to_values(mapping: &serde_yaml::Mapping, path: &Path) -> Result<ValueMap, ConfigError> {
    let mut values = ValueMap::new();

    for (key, value) in mapping {
        let key = key_string(key, path)?;
        let invalid = || ConfigError::InvalidOption {
            option: format!("{} in {}", key, path.display()),
            value: format!("{:?}", value),
        };

        let converted = match value {
            serde_yaml::Value::Null => continue,
            serde_yaml::Value::Bool(b) => Value::Flag(*b),
            serde_yaml::Value::Sequence(items) => Value::List(
                items
                    .iter()
                    .map(scalar_string)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(invalid)?,
            ),
            other => Value::Text(scalar_string(other).ok_or_else(invalid)?),
        };
        values.insert(key, converted);
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const ASSETS: &str = "\
grch38:
  gencode:
    star-index: /ref/grch38/gencode/star
    rsem-index: /ref/grch38/gencode/rsem/index
    gtf: /ref/grch38/gencode/annotation.gtf
  refseq:
    star-index: /ref/grch38/refseq/star
    gtf: /ref/grch38/refseq/annotation.gtf
";

    #[test]
    fn test_missing_settings_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.yml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.scheduler.program, "qsub");
    }

    #[test]
    fn test_settings_partial_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rnaseqde.yml");
        fs::write(
            &path,
            "scheduler:\n  extra_args: [-cwd]\nexecutable: /opt/rnaseqde/bin/rnaseqde\n",
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.scheduler.extra_args, vec!["-cwd"]);
        assert_eq!(settings.scheduler.context_var, "SGE_TASK_ID");
        assert_eq!(settings.executable(), PathBuf::from("/opt/rnaseqde/bin/rnaseqde"));
    }

    #[test]
    fn test_invalid_settings_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yml");
        fs::write(&path, "scheduler: [unclosed\n").unwrap();

        assert!(matches!(Settings::load(&path), Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn test_tool_options_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let settings = Settings {
            tool_conf_dir: Some(dir.path().to_path_buf()),
            ..Settings::default()
        };
        assert!(settings.tool_options("align_star").unwrap().is_empty());
        assert!(Settings::default().tool_options("align_star").unwrap().is_empty());
    }

    #[test]
    fn test_tool_options_values_keep_order() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("align_star.yml"),
            "--runThreadN: 8\n--outSAMtype: [BAM, SortedByCoordinate]\n--quantMode: TranscriptomeSAM\n--skip: null\n",
        )
        .unwrap();
        let settings = Settings {
            tool_conf_dir: Some(dir.path().to_path_buf()),
            ..Settings::default()
        };

        let options = settings.tool_options("align_star").unwrap();
        assert_eq!(
            options.keys().collect::<Vec<_>>(),
            vec!["--runThreadN", "--outSAMtype", "--quantMode"]
        );
        assert_eq!(options.get_str("--runThreadN"), Some("8"));
        assert_eq!(options.get_items("--outSAMtype"), vec!["BAM", "SortedByCoordinate"]);
    }

    #[test]
    fn test_script_path_override() {
        let settings = Settings {
            script_dir: Some(PathBuf::from("/opt/rnaseqde/scripts")),
            ..Settings::default()
        };
        assert_eq!(settings.script_dir(), PathBuf::from("/opt/rnaseqde/scripts"));
    }

    #[test]
    fn test_assets_all_annotations_in_file_order() {
        let assets = Assets::parse(ASSETS).unwrap();
        let annotations = assets.annotations("grch38", None).unwrap();

        let names: Vec<_> = annotations.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["gencode", "refseq"]);
        assert_eq!(
            annotations[0].1.get_str("star-index"),
            Some("/ref/grch38/gencode/star")
        );
    }

    #[test]
    fn test_assets_expand_environment() {
        env::set_var("RNASEQDE_TEST_REF_ROOT", "/mnt/ref");
        let assets = Assets::parse("grch38:\n  gencode:\n    gtf: $RNASEQDE_TEST_REF_ROOT/genes.gtf\n").unwrap();
        let annotations = assets.annotations("grch38", None).unwrap();
        assert_eq!(annotations[0].1.get_str("gtf"), Some("/mnt/ref/genes.gtf"));
    }

    #[test]
    fn test_assets_single_annotation() {
        let assets = Assets::parse(ASSETS).unwrap();
        let annotations = assets.annotations("grch38", Some("refseq")).unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].0, "refseq");
    }

    #[test]
    fn test_assets_unknown_names() {
        let assets = Assets::parse(ASSETS).unwrap();
        assert!(matches!(
            assets.annotations("mm10", None),
            Err(ConfigError::UnknownReference(_))
        ));
        assert!(matches!(
            assets.annotations("grch38", Some("ensembl")),
            Err(ConfigError::UnknownAnnotation { .. })
        ));
    }
}

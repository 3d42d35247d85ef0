use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::seed::error::{SeedError, SeedResult};

pub const DEFAULT_MANIFEST_NAME: &str = "seed_manifest.json";
pub const DEFAULT_JSON_GLOB: &str = "*.json";

/// Manifest entry shared by every command
pub const ALL_COMMANDS: &str = "all";

/// `seed_manifest.json`: which files each seed command loads
///
/// ```json
/// {
///   "commands": {
///     "all": { "glob": "*.json", "exclude": ["draft.json"] },
///     "init_project_templates": { "files": ["roles.json", "project_templates.json"] }
///   }
/// }
/// ```
///
/// Only `commands` itself must be an object. Command entries that are not objects are
/// skipped, and entry fields of the wrong shape read as unset.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(deserialize_with = "object_entries")]
    pub commands: BTreeMap<String, CommandEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandEntry {
    #[serde(default, deserialize_with = "or_default")]
    pub files: Vec<String>,
    #[serde(default, deserialize_with = "or_default")]
    pub glob: Option<String>,
    #[serde(default, deserialize_with = "or_default")]
    pub exclude: Vec<String>,
}

fn object_entries<'de, D>(deserializer: D) -> Result<BTreeMap<String, CommandEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(name, entry)| {
            if !entry.is_object() {
                log::warn!("Skipping manifest command '{}': not an object", name);
                return None;
            }
            serde_json::from_value(entry).ok().map(|entry| (name, entry))
        })
        .collect())
}

fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Inputs for choosing which seed files to load
#[derive(Debug, Clone, Default)]
pub struct SeedFileRequest {
    pub command_name: String,
    pub resources_dir: PathBuf,
    pub manifest_path: PathBuf,
    /// Explicit file names relative to `resources_dir`
    pub files: Option<Vec<String>>,
    /// Load everything matching the glob instead of the command's file list
    pub use_all: bool,
    pub glob: Option<String>,
    pub exclude: Option<Vec<String>>,
}

pub fn load_manifest(path: &Path) -> SeedResult<Manifest> {
    if !path.exists() {
        return Err(SeedError::Manifest(format!(
            "manifest not found: {}",
            path.display()
        )));
    }

    let text = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&text).map_err(|e| {
        SeedError::Manifest(format!(
            "invalid manifest {}: expected an object with a 'commands' object ({})",
            path.display(),
            e
        ))
    })
}

/// Resolve the ordered list of seed files.
///
/// In priority order: explicit files, the `use_all` glob, the command's manifest
/// entry, the manifest's `all` glob, and finally every `*.json` in the directory.
pub fn resolve_seed_files(request: &SeedFileRequest) -> SeedResult<Vec<PathBuf>> {
    let resources_dir = &request.resources_dir;
    if !resources_dir.is_dir() {
        return Err(SeedError::Manifest(format!(
            "resources directory not found: {}",
            resources_dir.display()
        )));
    }

    if let Some(files) = request.files.as_ref().filter(|files| !files.is_empty()) {
        return existing_files(resources_dir, files, "requested");
    }

    let manifest = load_manifest(&request.manifest_path)?;
    let all = manifest
        .commands
        .get(ALL_COMMANDS)
        .cloned()
        .unwrap_or_default();
    let all_glob = all.glob.as_deref().unwrap_or(DEFAULT_JSON_GLOB);
    let skip = manifest_name(&request.manifest_path);

    if request.use_all {
        let glob = request.glob.as_deref().unwrap_or(all_glob);
        let exclude = request.exclude.as_ref().unwrap_or(&all.exclude);
        let files = glob_files(resources_dir, glob, exclude, skip.as_deref())?;
        if files.is_empty() {
            return Err(SeedError::Manifest(format!(
                "no files match '{}' in {}",
                glob,
                resources_dir.display()
            )));
        }
        return Ok(files);
    }

    if let Some(command) = manifest.commands.get(&request.command_name) {
        if !command.files.is_empty() {
            return existing_files(
                resources_dir,
                &command.files,
                &format!("manifest command '{}'", request.command_name),
            );
        }
    }

    let glob = request.glob.as_deref().unwrap_or(all_glob);
    let files = glob_files(resources_dir, glob, &all.exclude, skip.as_deref())?;
    if !files.is_empty() {
        return Ok(files);
    }

    let glob = request.glob.as_deref().unwrap_or(DEFAULT_JSON_GLOB);
    let files = glob_files(resources_dir, glob, &[], skip.as_deref())?;
    if files.is_empty() {
        return Err(SeedError::Manifest(format!(
            "no JSON files match '{}' in {}",
            glob,
            resources_dir.display()
        )));
    }
    Ok(files)
}

fn existing_files(resources_dir: &Path, files: &[String], origin: &str) -> SeedResult<Vec<PathBuf>> {
    let paths: Vec<PathBuf> = files.iter().map(|f| resources_dir.join(f)).collect();
    let missing = paths.iter().filter(|p| !p.exists()).collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(SeedError::Manifest(format!(
            "{} files not found: {}",
            origin,
            missing.iter().map(|p| p.display()).join(", ")
        )));
    }
    Ok(paths)
}

fn manifest_name(manifest_path: &Path) -> Option<String> {
    manifest_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

/// Files in `dir` matching `mask`, sorted, minus excluded names. The manifest itself
/// is never a seed file.
fn glob_files(
    dir: &Path,
    mask: &str,
    exclude: &[String],
    manifest: Option<&str>,
) -> SeedResult<Vec<PathBuf>> {
    let pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        mask
    );
    let entries = glob::glob(&pattern)
        .map_err(|e| SeedError::Manifest(format!("invalid glob '{}': {}", mask, e)))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| SeedError::Manifest(format!("cannot read {}", e)))?;
        if !path.is_file() {
            continue;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if exclude.iter().any(|e| *e == name) || manifest == Some(name.as_str()) {
            continue;
        }
        files.push(path);
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn resources(manifest: serde_json::Value, files: &[&str]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_MANIFEST_NAME), manifest.to_string()).unwrap();
        for file in files {
            std::fs::write(dir.path().join(file), "{}").unwrap();
        }
        dir
    }

    fn request(dir: &TempDir) -> SeedFileRequest {
        SeedFileRequest {
            command_name: "init_project_templates".to_string(),
            resources_dir: dir.path().to_path_buf(),
            manifest_path: dir.path().join(DEFAULT_MANIFEST_NAME),
            ..Default::default()
        }
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_explicit_files_win() {
        let dir = resources(json!({"commands": {}}), &["b.json", "a.json"]);
        let mut req = request(&dir);
        req.files = Some(vec!["b.json".to_string(), "a.json".to_string()]);

        let files = resolve_seed_files(&req).unwrap();
        assert_eq!(names(&files), vec!["b.json", "a.json"]);

        req.files = Some(vec!["missing.json".to_string()]);
        let err = resolve_seed_files(&req).unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn test_command_files_keep_manifest_order() {
        let dir = resources(
            json!({"commands": {
                "init_project_templates": {"files": ["roles.json", "templates.json"]}
            }}),
            &["templates.json", "roles.json", "other.json"],
        );

        let files = resolve_seed_files(&request(&dir)).unwrap();
        assert_eq!(names(&files), vec!["roles.json", "templates.json"]);
    }

    #[test]
    fn test_use_all_applies_manifest_exclude() {
        let dir = resources(
            json!({"commands": {"all": {"exclude": ["draft.json"]}}}),
            &["b.json", "a.json", "draft.json", "notes.txt"],
        );
        let mut req = request(&dir);
        req.use_all = true;

        let files = resolve_seed_files(&req).unwrap();
        assert_eq!(names(&files), vec!["a.json", "b.json"]);

        // an explicit exclude list replaces the manifest's
        req.exclude = Some(vec!["a.json".to_string()]);
        let files = resolve_seed_files(&req).unwrap();
        assert_eq!(names(&files), vec!["b.json", "draft.json"]);
    }

    #[test]
    fn test_falls_back_to_all_glob() {
        let dir = resources(
            json!({"commands": {"all": {"glob": "0*.json"}}}),
            &["01_roles.json", "02_templates.json", "zz.json"],
        );

        let files = resolve_seed_files(&request(&dir)).unwrap();
        assert_eq!(names(&files), vec!["01_roles.json", "02_templates.json"]);
    }

    #[test]
    fn test_last_resort_is_every_json_file() {
        let dir = resources(
            json!({"commands": {"all": {"glob": "nothing-*.json"}}}),
            &["roles.json"],
        );

        let files = resolve_seed_files(&request(&dir)).unwrap();
        assert_eq!(names(&files), vec!["roles.json"]);
    }

    #[test]
    fn test_manifest_errors() {
        let dir = resources(json!({"not_commands": {}}), &["roles.json"]);
        assert!(matches!(
            resolve_seed_files(&request(&dir)),
            Err(SeedError::Manifest(_))
        ));

        let mut req = request(&dir);
        req.manifest_path = dir.path().join("absent.json");
        let err = resolve_seed_files(&req).unwrap_err();
        assert!(err.to_string().contains("manifest not found"));

        req.resources_dir = dir.path().join("nope");
        assert!(matches!(
            resolve_seed_files(&req),
            Err(SeedError::Manifest(_))
        ));
    }

    #[test]
    fn test_malformed_command_entries_are_skipped() {
        let dir = resources(
            json!({"commands": {
                "all": {"glob": 7, "exclude": "draft.json"},
                "init_project_templates": ["roles.json"],
                "other_command": {"files": "roles.json"}
            }}),
            &["roles.json", "draft.json"],
        );

        let manifest = load_manifest(&dir.path().join(DEFAULT_MANIFEST_NAME)).unwrap();
        assert!(!manifest.commands.contains_key("init_project_templates"));
        let all = &manifest.commands[ALL_COMMANDS];
        assert_eq!(all.glob, None);
        assert!(all.exclude.is_empty());
        assert!(manifest.commands["other_command"].files.is_empty());

        // no usable command entry, so every JSON file is loaded
        let files = resolve_seed_files(&request(&dir)).unwrap();
        assert_eq!(names(&files), vec!["draft.json", "roles.json"]);
    }

    #[test]
    fn test_commands_must_be_an_object() {
        let dir = resources(json!({"commands": ["roles.json"]}), &["roles.json"]);
        let err = resolve_seed_files(&request(&dir)).unwrap_err();
        assert!(err.to_string().contains("'commands' object"));
    }

    #[test]
    fn test_use_all_without_matches_fails() {
        let dir = resources(json!({"commands": {}}), &[]);
        let mut req = request(&dir);
        req.use_all = true;

        let err = resolve_seed_files(&req).unwrap_err();
        assert!(err.to_string().contains("no files match"));
    }
}

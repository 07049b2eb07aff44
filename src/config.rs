//! Configuration loading, validation and file filtering.
//!
//! Configuration is read from a TOML file. Every section is optional; missing
//! keys fall back to the built-in defaults.
//!
//! ```toml
//! default_category = "other"
//! no_extension_category = "no_extension"
//!
//! [categories]
//! ebooks = ["epub", "mobi"]
//!
//! [manifest]
//! path = "/home/me/.local/share/reshelf/manifest.jsonl"
//! policy = "accumulate"
//!
//! [collisions]
//! max_attempts = 10000
//!
//! [filters]
//! enable_hidden_files = true
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.part"]
//! extensions = ["tmp"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```
//!
//! Entries under `[categories]` overlay the built-in table one category at a
//! time: a configured category replaces the built-in extension list of the same
//! name, and its extensions are taken away from any other built-in category.

use crate::file_category::{DEFAULT_CATEGORY, NO_EXTENSION_CATEGORY};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Default upper bound on numeric suffixes tried by the collision resolver.
pub const DEFAULT_MAX_COLLISION_ATTEMPTS: u32 = 10_000;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".reshelfrc.toml";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    /// Invalid TOML syntax or structure.
    #[error("invalid configuration in {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    /// IO error while reading configuration.
    #[error("IO error reading configuration {path}: {reason}")]
    IoError { path: PathBuf, reason: String },

    /// A category name cannot be used as a directory name.
    #[error("invalid category name '{name}': {reason}")]
    InvalidCategory { name: String, reason: String },

    /// The same extension was assigned to two configured categories.
    #[error("extension '{extension}' is mapped to both '{first}' and '{second}'")]
    DuplicateExtension {
        extension: String,
        first: String,
        second: String,
    },

    /// `collisions.max_attempts` must allow at least one suffix.
    #[error("collisions.max_attempts must be at least 1")]
    InvalidCollisionLimit,

    /// Invalid glob pattern provided.
    #[error("invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),

    /// Invalid regex pattern provided with the actual error reason.
    #[error("invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
}

/// What a live run does with entries left by earlier runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestPolicy {
    /// Keep earlier entries; undo walks back through every recorded batch.
    #[default]
    Accumulate,
    /// Discard earlier entries when a new live run starts.
    Overwrite,
}

/// `[manifest]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Where the manifest lives. Defaults to [`default_manifest_path`].
    pub path: Option<PathBuf>,
    /// Behaviour across consecutive runs.
    pub policy: ManifestPolicy,
}

/// `[collisions]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Highest numeric suffix tried before giving up on a destination.
    pub max_attempts: u32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_COLLISION_ATTEMPTS,
        }
    }
}

/// Full tool configuration as read from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Category used for extensions the table does not know.
    pub default_category: String,
    /// Category used for names without an extension.
    pub no_extension_category: String,
    /// Category name to extensions, overlaid on the built-in table.
    pub categories: BTreeMap<String, Vec<String>>,
    pub manifest: ManifestConfig,
    pub collisions: CollisionConfig,
    pub filters: FilterRules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_category: DEFAULT_CATEGORY.to_string(),
            no_extension_category: NO_EXTENSION_CATEGORY.to_string(),
            categories: BTreeMap::new(),
            manifest: ManifestConfig::default(),
            collisions: CollisionConfig::default(),
            filters: FilterRules::default(),
        }
    }
}

/// Root-level filter rules configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to include hidden files (starting with "."). Defaults to true.
    #[serde(default = "default_enable_hidden_files")]
    pub enable_hidden_files: bool,

    /// Rules for excluding files.
    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    #[serde(default)]
    pub include: IncludeRules,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: default_enable_hidden_files(),
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

fn default_enable_hidden_files() -> bool {
    true
}

/// Rules for excluding files from organization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., ".DS_Store", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to exclude (e.g., "*.tmp", "node_modules/**").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude (e.g., "bak", "tmp", "log").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns to exclude (for advanced users).
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    /// Glob patterns that override exclude rules.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Config {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.reshelfrc.toml` in the current directory
    /// 3. Look for `~/.config/reshelf/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// The result is validated before it is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly provided file cannot be read, if any
    /// file found cannot be parsed, or if validation fails.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::discover() {
                Some(path) => Self::load_from_file(&path)?,
                None => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn discover() -> Option<PathBuf> {
        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        let home_config = home_dir()?
            .join(".config")
            .join("reshelf")
            .join("config.toml");
        home_config.exists().then_some(home_config)
    }

    /// Load configuration from a specific file without validating it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if file does not exist.
    /// Returns `ConfigError::ConfigInvalid` if TOML parsing fails.
    /// Returns `ConfigError::IoError` if file cannot be read.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Checks category names, extension uniqueness, collision limits and that
    /// every filter pattern compiles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_category_name(&self.default_category)?;
        validate_category_name(&self.no_extension_category)?;

        let mut seen: HashMap<String, &str> = HashMap::new();
        for (category, extensions) in &self.categories {
            validate_category_name(category)?;
            for ext in extensions {
                let ext = normalize_extension(ext);
                if ext.is_empty() {
                    return Err(ConfigError::InvalidCategory {
                        name: category.clone(),
                        reason: "empty extension".to_string(),
                    });
                }
                if let Some(first) = seen.insert(ext.clone(), category) {
                    return Err(ConfigError::DuplicateExtension {
                        extension: ext,
                        first: first.to_string(),
                        second: category.clone(),
                    });
                }
            }
        }

        if self.collisions.max_attempts == 0 {
            return Err(ConfigError::InvalidCollisionLimit);
        }

        self.compile_filters().map(|_| ())
    }

    /// Compile filter rules into optimized structures for matching.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }

    /// The manifest location: the configured path, else [`default_manifest_path`].
    pub fn manifest_path(&self) -> PathBuf {
        self.manifest
            .path
            .clone()
            .unwrap_or_else(default_manifest_path)
    }
}

/// `$HOME/.local/share/reshelf/manifest.jsonl`, or `.reshelf_manifest.jsonl`
/// in the current directory when `HOME` is unset.
pub fn default_manifest_path() -> PathBuf {
    match home_dir() {
        Some(home) => home
            .join(".local")
            .join("share")
            .join("reshelf")
            .join("manifest.jsonl"),
        None => PathBuf::from(".reshelf_manifest.jsonl"),
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

/// Lowercases an extension and strips a leading dot.
pub(crate) fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

fn validate_category_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidCategory {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("empty name"));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid("must be a single directory name")),
    }
}

/// Compiled, optimized filter structures for efficient file matching.
///
/// This struct pre-processes all filter rules (glob patterns, regex patterns, etc.)
/// so that matching does not reparse patterns on each file.
#[derive(Debug)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    /// Create compiled filters from filter rules.
    ///
    /// # Errors
    ///
    /// Returns an error if any glob or regex patterns are invalid.
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let compile_globs = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| {
                    Pattern::new(pattern)
                        .map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let exclude_patterns = compile_globs(&rules.exclude.patterns)?;
        let include_patterns = compile_globs(&rules.include.patterns)?;

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
            exclude_patterns,
            exclude_regexes,
            include_patterns,
        })
    }

    /// Check if a file should be included in organization (not excluded).
    ///
    /// Checks are performed in this order, with early termination:
    /// 1. Include patterns (whitelist) - if matched, always include
    /// 2. Hidden file filter - if hidden and disabled, exclude
    /// 3. Exact filename match - if matched, exclude
    /// 4. File extension match - if matched, exclude
    /// 5. Glob pattern match - if matched, exclude
    /// 6. Regex pattern match - if matched, exclude
    /// 7. Default: include
    ///
    /// Glob patterns and regexes are matched against the file name only, so
    /// the directories above the file never affect the outcome.
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.matches_include_patterns(&file_name) {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = file_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self.matches_exclude_patterns(&file_name) {
            return false;
        }

        !self.matches_exclude_regex(&file_name)
    }

    fn matches_include_patterns(&self, file_name: &str) -> bool {
        self.include_patterns
            .iter()
            .any(|pattern| pattern.matches(file_name))
    }

    fn matches_exclude_patterns(&self, file_name: &str) -> bool {
        self.exclude_patterns
            .iter()
            .any(|pattern| pattern.matches(file_name))
    }

    fn matches_exclude_regex(&self, file_name: &str) -> bool {
        self.exclude_regexes
            .iter()
            .any(|regex| regex.is_match(file_name))
    }
}

impl Default for CompiledFilters {
    fn default() -> Self {
        Self {
            enable_hidden_files: default_enable_hidden_files(),
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }
}

//! File categorization by extension.
//!
//! A [`CategoryTable`] maps lowercase file extensions to category labels. The
//! label doubles as the name of the subdirectory files are moved into.
//! Lookups never fail: names without an extension go to the no-extension
//! category, and unknown extensions fall through to the default category.
//!
//! # Examples
//!
//! ```
//! use reshelf::file_category::CategoryTable;
//!
//! let table = CategoryTable::default();
//! assert_eq!(table.classify("report.PDF").as_str(), "docs");
//! assert_eq!(table.classify("photo.jpg").as_str(), "images");
//! assert_eq!(table.classify("README").as_str(), "no_extension");
//! assert_eq!(table.classify("notes.xyz").as_str(), "other");
//! ```

use crate::config::{Config, normalize_extension};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Built-in categories and the extensions that belong to them.
const BUILTIN_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "images",
        &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "heic"],
    ),
    ("docs", &["pdf", "doc", "docx", "txt", "md", "rtf"]),
    ("slides", &["ppt", "pptx", "key"]),
    ("spreadsheets", &["xls", "xlsx", "csv", "ods"]),
    ("archives", &["zip", "rar", "7z", "tar", "gz"]),
    ("audio", &["mp3", "wav", "aac", "flac", "m4a", "ogg"]),
    ("video", &["mp4", "mov", "mkv", "avi", "wmv", "webm"]),
    (
        "code",
        &[
            "py", "ipynb", "js", "ts", "html", "css", "java", "c", "cpp", "rs", "go", "sh", "ps1",
        ],
    ),
];

/// Category used when no configuration overrides it.
pub const DEFAULT_CATEGORY: &str = "other";

/// Category for names that have no extension at all.
pub const NO_EXTENSION_CATEGORY: &str = "no_extension";

/// A classification label. Also the name of the category's subdirectory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category(String);

impl Category {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the directory name for this category.
    pub fn dir_name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable extension-to-category lookup with explicit fallbacks.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    extension_map: HashMap<String, Category>,
    default: Category,
    no_extension: Category,
}

impl CategoryTable {
    /// Creates an empty table where every file with an extension maps to
    /// `default`, and every file without one to [`NO_EXTENSION_CATEGORY`].
    pub fn empty(default: impl Into<String>) -> Self {
        Self {
            extension_map: HashMap::new(),
            default: Category::new(default),
            no_extension: Category::new(NO_EXTENSION_CATEGORY),
        }
    }

    /// The built-in table.
    pub fn builtin() -> Self {
        let mut table = Self::empty(DEFAULT_CATEGORY);
        for (category, extensions) in BUILTIN_CATEGORIES {
            for ext in *extensions {
                table.add_extension_mapping(ext, category);
            }
        }
        table
    }

    /// Builds the table for a validated configuration.
    ///
    /// Each configured category replaces the built-in category of the same
    /// name, and its extensions are removed from whichever built-in category
    /// held them before.
    pub fn from_config(config: &Config) -> Self {
        let mut table = Self::builtin();
        table.default = Category::new(config.default_category.clone());
        table.no_extension = Category::new(config.no_extension_category.clone());

        for (category, extensions) in &config.categories {
            table.extension_map.retain(|_, c| c.as_str() != category);
            for ext in extensions {
                table.add_extension_mapping(ext, category);
            }
        }
        table
    }

    /// Adds a file extension to category mapping, replacing any earlier one.
    pub fn add_extension_mapping(&mut self, ext: &str, category: &str) {
        self.extension_map
            .insert(normalize_extension(ext), Category::new(category));
    }

    /// Maps a bare extension to a category, if the table knows it.
    ///
    /// # Examples
    ///
    /// ```
    /// use reshelf::file_category::CategoryTable;
    ///
    /// let table = CategoryTable::default();
    /// assert_eq!(table.extension_to_category("MP3").map(|c| c.as_str()), Some("audio"));
    /// assert!(table.extension_to_category("xyz").is_none());
    /// ```
    pub fn extension_to_category(&self, ext: &str) -> Option<&Category> {
        self.extension_map.get(&ext.to_lowercase())
    }

    /// The category files with an unmapped extension fall into.
    pub fn default_category(&self) -> &Category {
        &self.default
    }

    /// The category files without an extension fall into.
    pub fn no_extension_category(&self) -> &Category {
        &self.no_extension
    }

    /// Classifies a file name by its extension.
    ///
    /// The extension is the part after the last dot, compared
    /// case-insensitively. Dotfiles such as `.bashrc`, names ending in a dot,
    /// names without a dot and the empty string have no extension and get the
    /// no-extension category. Unknown extensions get the default category.
    pub fn classify(&self, file_name: &str) -> Category {
        let extension = Path::new(file_name)
            .extension()
            .map(|ext| ext.to_string_lossy())
            .filter(|ext| !ext.is_empty());

        match extension {
            None => self.no_extension.clone(),
            Some(ext) => self
                .extension_to_category(&ext)
                .unwrap_or(&self.default)
                .clone(),
        }
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::builtin()
    }
}

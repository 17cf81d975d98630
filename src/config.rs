//! Runtime configuration.
//!
//! Everything has a constant default; the server binary may override the data
//! directory and the port with two positional arguments.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Counts table (one column per boss).
pub const DATA_FILE: &str = "原神.xlsx";
/// Materials reference table (three rows per boss).
pub const META_FILE: &str = "1.xlsx";
/// Header of the identifying column in the counts table.
pub const ID_COLUMN: &str = "怪物";
/// Identifying-column value of the totals row.
pub const TOTAL_LABEL: &str = "总计";
/// Reference table headers.
pub const REFERENCE_BOSS_COLUMN: &str = "周本名称";
pub const REFERENCE_MATERIAL_COLUMN: &str = "材料名称";
pub const DEFAULT_PORT: u16 = 3000;

/// Historical column spellings mapped to the short name the reference table uses.
pub const BOSS_ALIASES: &[(&str, &str)] = &[("阿佩普的绿洲守望者", "绿洲守望者")];

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub data_file: PathBuf,
    pub meta_file: PathBuf,
    pub bind_addr: SocketAddr,
    pub id_column: String,
    pub total_label: String,
    pub reference_boss_column: String,
    pub reference_material_column: String,
    pub aliases: Vec<(String, String)>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            data_file: PathBuf::from(DATA_FILE),
            meta_file: PathBuf::from(META_FILE),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            id_column: ID_COLUMN.to_string(),
            total_label: TOTAL_LABEL.to_string(),
            reference_boss_column: REFERENCE_BOSS_COLUMN.to_string(),
            reference_material_column: REFERENCE_MATERIAL_COLUMN.to_string(),
            aliases: BOSS_ALIASES
                .iter()
                .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
                .collect(),
        }
    }
}

impl TrackerConfig {
    /// Default file names resolved inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        TrackerConfig {
            data_file: dir.join(DATA_FILE),
            meta_file: dir.join(META_FILE),
            ..TrackerConfig::default()
        }
    }

    /// Build from process arguments: `[data_dir] [port]`.
    ///
    /// The first element is the program name. A port that does not parse
    /// keeps the default.
    pub fn from_args(args: &[String]) -> Self {
        let mut config = match args.get(1) {
            Some(dir) => TrackerConfig::in_dir(dir),
            None => TrackerConfig::default(),
        };

        if let Some(port) = args.get(2) {
            let port = port.parse().unwrap_or(DEFAULT_PORT);
            config.bind_addr.set_port(port);
        }

        config
    }

    /// Replace both file paths, keeping the rest.
    pub fn with_files(mut self, data_file: impl Into<PathBuf>, meta_file: impl Into<PathBuf>) -> Self {
        self.data_file = data_file.into();
        self.meta_file = meta_file.into();
        self
    }
}

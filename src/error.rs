//! Error and warning types for the tracker.

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while loading, mutating or saving the tables.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// One or both of the configured files do not exist.
    #[error("找不到文件，请确保 {} 存在。", display_paths(.paths))]
    MissingFile { paths: Vec<PathBuf> },

    /// A file exists but could not be read or parsed.
    #[error("读取文件失败: {}: {reason}", .path.display())]
    LoadFailure { path: PathBuf, reason: String },

    /// Writing the counts table back to disk failed.
    #[error("保存文件失败: {}: {reason}", .path.display())]
    SaveFailure { path: PathBuf, reason: String },

    /// A loot submission where every quantity is zero.
    #[error("请输入获得的材料数量")]
    EmptyLoot,

    /// A quantity field that is not a non-negative integer.
    #[error("数量必须是非负整数: {field} = {value:?}")]
    InvalidQuantity { field: String, value: String },

    /// A loot entry or edit that would push a count past what a cell holds.
    #[error("{boss} 的材料数量超出上限")]
    CountOverflow { boss: String },

    #[error("未知的周本: {0}")]
    UnknownBoss(String),

    #[error("无效的材料栏位: {0}")]
    InvalidSlot(usize),
}

impl TrackerError {
    /// Fatal errors stop the page from rendering anything past the message.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TrackerError::MissingFile { .. } | TrackerError::LoadFailure { .. }
        )
    }

    /// Validation errors leave every piece of state untouched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TrackerError::EmptyLoot
                | TrackerError::InvalidQuantity { .. }
                | TrackerError::CountOverflow { .. }
                | TrackerError::UnknownBoss(_)
                | TrackerError::InvalidSlot(_)
        )
    }

    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        TrackerError::LoadFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn save(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        TrackerError::SaveFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Non-fatal conditions found while pairing the two tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerWarning {
    #[error("警告：材料名称表行数({rows})少于周本数列数({bosses})×3，可能无法完全匹配。")]
    ReferenceTooShort { bosses: usize, rows: usize },

    /// A run of three reference rows names more than one boss, so the
    /// ordinal pairing has probably drifted.
    #[error("警告：{boss} 对应的材料名称行属于不同周本: {}", .names.join(" / "))]
    ReferenceGroupMixed { boss: String, names: Vec<String> },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" 和 ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_lists_every_path() {
        let err = TrackerError::MissingFile {
            paths: vec![PathBuf::from("原神.xlsx"), PathBuf::from("1.xlsx")],
        };
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "找不到文件，请确保 原神.xlsx 和 1.xlsx 存在。");
    }

    #[test]
    fn save_failure_is_neither_fatal_nor_validation() {
        let err = TrackerError::save("原神.xlsx", "disk full");
        assert!(!err.is_fatal());
        assert!(!err.is_validation());
        assert!(TrackerError::EmptyLoot.is_validation());
    }
}

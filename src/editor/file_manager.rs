//! Document files
//!
//! Loads and saves the edited document as plain JSON and tracks whether it
//! has unsaved changes.

use log::info;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Manages file operations for the edited document
pub struct FileManager {
    /// Current file path (None if unsaved/new file)
    current_file_path: Option<PathBuf>,
    /// Whether the document has been modified since last save
    is_modified: bool,
}

impl FileManager {
    pub fn new() -> Self {
        Self {
            current_file_path: None,
            is_modified: false,
        }
    }

    pub fn current_file_path(&self) -> Option<&PathBuf> {
        self.current_file_path.as_ref()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.is_modified
    }

    pub fn mark_modified(&mut self) {
        self.is_modified = true;
    }

    /// Title-bar name, with a `*` when modified
    pub fn get_file_display_name(&self) -> String {
        let name = match &self.current_file_path {
            Some(path) => path.file_name().and_then(|n| n.to_str()).unwrap_or("Unknown"),
            None => "Untitled",
        };
        if self.is_modified {
            format!("{}*", name)
        } else {
            name.to_string()
        }
    }

    pub fn save_to_file(&mut self, file_path: &Path, document: &Value) -> Result<(), String> {
        let json_content =
            serde_json::to_string_pretty(document).map_err(|e| format!("Failed to serialize document: {}", e))?;

        std::fs::write(file_path, json_content).map_err(|e| format!("Failed to write file: {}", e))?;

        info!("Saved document to {}", file_path.display());
        self.current_file_path = Some(file_path.to_path_buf());
        self.is_modified = false;
        Ok(())
    }

    pub fn load_from_file(&mut self, file_path: &Path) -> Result<Value, String> {
        let file_content = std::fs::read_to_string(file_path).map_err(|e| format!("Failed to read file: {}", e))?;

        let document: Value =
            serde_json::from_str(&file_content).map_err(|e| format!("Failed to parse document: {}", e))?;

        info!("Loaded document from {}", file_path.display());
        self.current_file_path = Some(file_path.to_path_buf());
        self.is_modified = false;
        Ok(document)
    }

    /// Save to the current path, if there is one
    pub fn save_file(&mut self, document: &Value) -> Result<(), String> {
        match self.current_file_path.clone() {
            Some(path) => self.save_to_file(&path, document),
            None => Err("No file path set. Use save as instead.".to_string()),
        }
    }

    /// Open file dialog and load the selected file
    pub fn open_file_dialog(&mut self) -> Result<Option<Value>, String> {
        use rfd::FileDialog;

        match FileDialog::new().add_filter("JSON files", &["json"]).pick_file() {
            Some(path) => self.load_from_file(&path).map(Some),
            None => Ok(None),
        }
    }

    pub fn save_as_file_dialog(&mut self, document: &Value) -> Result<bool, String> {
        use rfd::FileDialog;

        match FileDialog::new().add_filter("JSON files", &["json"]).save_file() {
            Some(path) => self.save_to_file(&path, document).map(|_| true),
            None => Ok(false),
        }
    }
}

impl Default for FileManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_and_load_document() {
        let dir = std::env::temp_dir().join(format!("opticraft-file-manager-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("system.json");

        let mut files = FileManager::new();
        files.mark_modified();
        assert_eq!(files.get_file_display_name(), "Untitled*");

        let document = json!({"class": "Group", "args": {"children": []}});
        files.save_to_file(&path, &document).unwrap();
        assert!(!files.has_unsaved_changes());
        assert_eq!(files.get_file_display_name(), "system.json");

        let loaded = FileManager::new().load_from_file(&path).unwrap();
        assert_eq!(loaded, document);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_save_without_path_fails() {
        let mut files = FileManager::new();
        assert!(files.save_file(&json!({})).is_err());
    }
}

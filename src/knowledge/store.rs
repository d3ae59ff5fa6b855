use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::KNOWLEDGE_HEADER;
use crate::utils::ChatError;

/// A snippet of reference text, optionally tagged with a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl KnowledgeItem {
    pub fn new(content: impl Into<String>, category: Option<String>) -> Self {
        Self {
            content: content.into(),
            category,
        }
    }
}

/// Append-only, insertion-ordered knowledge store.
///
/// When backed by a file, the whole store is rewritten after every add.
#[derive(Debug, Default)]
pub struct KnowledgeStore {
    items: RwLock<Vec<KnowledgeItem>>,
    path: Option<PathBuf>,
}

impl KnowledgeStore {
    /// Empty in-memory store
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store backed by a JSON file. A missing or unreadable file yields an empty store.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let items = match fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str::<Vec<KnowledgeItem>>(&json) {
                Ok(items) => {
                    info!(path = %path.display(), count = items.len(), "Loaded knowledge store");
                    items
                        .into_iter()
                        .filter(|item| !item.content.trim().is_empty())
                        .collect()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Knowledge file is malformed, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read knowledge file, starting empty");
                Vec::new()
            }
        };

        Self {
            items: RwLock::new(items),
            path: Some(path),
        }
    }

    /// Add an item. Empty content is rejected and leaves the store unchanged.
    pub fn add(&self, item: KnowledgeItem) -> Result<(), ChatError> {
        if item.content.trim().is_empty() {
            return Err(ChatError::validation("knowledge content must not be empty"));
        }

        let item = KnowledgeItem {
            category: item.category.filter(|c| !c.trim().is_empty()),
            ..item
        };

        let mut items = self.items.write();
        items.push(item);

        if let Some(path) = &self.path {
            if let Err(e) = persist(path, &items) {
                // Keep memory and disk in agreement
                items.pop();
                return Err(e);
            }
        }

        Ok(())
    }

    /// Items with exactly this category, or every item when `category` is None
    pub fn list(&self, category: Option<&str>) -> Vec<KnowledgeItem> {
        let items = self.items.read();
        match category {
            Some(category) => items
                .iter()
                .filter(|item| item.category.as_deref() == Some(category))
                .cloned()
                .collect(),
            None => items.clone(),
        }
    }

    /// Items to inject into a prompt: the category's items, or the whole store,
    /// capped at `limit`
    pub fn select_for_prompt(&self, category: Option<&str>, limit: usize) -> Vec<KnowledgeItem> {
        let mut items = self.list(category);
        items.truncate(limit);
        items
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

/// Numbered knowledge block for the prompt; empty when there is nothing to add
pub fn format_for_prompt(items: &[KnowledgeItem]) -> String {
    if items.is_empty() {
        return String::new();
    }

    let mut formatted = format!("{}\n\n", KNOWLEDGE_HEADER);
    for (i, item) in items.iter().enumerate() {
        formatted.push_str(&format!("{}. {}\n", i + 1, item.content));
    }
    formatted
}

fn persist(path: &Path, items: &[KnowledgeItem]) -> Result<(), ChatError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(items)?;
    fs::write(path, json)?;
    Ok(())
}

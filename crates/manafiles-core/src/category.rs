use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ManafilesError;

/// Fixed classification tag for a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Images,
    Documents,
    Certificates,
    Notes,
}

impl Category {
    pub const ALL: &[Category] = &[
        Category::Images,
        Category::Documents,
        Category::Certificates,
        Category::Notes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Images => "images",
            Category::Documents => "documents",
            Category::Certificates => "certificates",
            Category::Notes => "notes",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Images => "Images",
            Category::Documents => "Documents",
            Category::Certificates => "Certificates",
            Category::Notes => "Notes",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Category::Images => "Manage your photos and graphics",
            Category::Documents => "Store important documents",
            Category::Certificates => "Keep your certificates secure",
            Category::Notes => "Save your important notes",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "images" => Some(Category::Images),
            "documents" => Some(Category::Documents),
            "certificates" => Some(Category::Certificates),
            "notes" => Some(Category::Notes),
            _ => None,
        }
    }
}

impl std::str::FromStr for Category {
    type Err = ManafilesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::parse_str(s.trim())
            .ok_or_else(|| ManafilesError::InvalidInput(format!("unknown category '{s}'")))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Per-category entry shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: Category,
    pub display_name: String,
    pub description: String,
    pub file_count: i64,
}

impl CategorySummary {
    pub fn new(category: Category, file_count: i64) -> Self {
        Self {
            category,
            display_name: category.display_name().to_string(),
            description: category.description().to_string(),
            file_count,
        }
    }
}

//! Feature module tags that a freeze period can pause.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Closed set of feature areas that can be frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleTag {
    Habits,
    Tasks,
    Finance,
    Health,
    Studies,
    Work,
    Social,
    Home,
}

impl ModuleTag {
    /// Every module tag, in declaration order.
    pub const ALL: [ModuleTag; 8] = [
        Self::Habits,
        Self::Tasks,
        Self::Finance,
        Self::Health,
        Self::Studies,
        Self::Work,
        Self::Social,
        Self::Home,
    ];

    /// Stable string id used on the wire and in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Habits => MODULE_TAG_HABITS,
            Self::Tasks => MODULE_TAG_TASKS,
            Self::Finance => MODULE_TAG_FINANCE,
            Self::Health => MODULE_TAG_HEALTH,
            Self::Studies => MODULE_TAG_STUDIES,
            Self::Work => MODULE_TAG_WORK,
            Self::Social => MODULE_TAG_SOCIAL,
            Self::Home => MODULE_TAG_HOME,
        }
    }

    /// User-facing area name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Habits => "Habits",
            Self::Tasks => "Tasks",
            Self::Finance => "Finance",
            Self::Health => "Health",
            Self::Studies => "Studies",
            Self::Work => "Work",
            Self::Social => "Social",
            Self::Home => "Home",
        }
    }
}

impl Display for ModuleTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const MODULE_TAG_HABITS: &str = "HABITS";
pub const MODULE_TAG_TASKS: &str = "TASKS";
pub const MODULE_TAG_FINANCE: &str = "FINANCE";
pub const MODULE_TAG_HEALTH: &str = "HEALTH";
pub const MODULE_TAG_STUDIES: &str = "STUDIES";
pub const MODULE_TAG_WORK: &str = "WORK";
pub const MODULE_TAG_SOCIAL: &str = "SOCIAL";
pub const MODULE_TAG_HOME: &str = "HOME";

/// Parses one module tag from its stored/wire string.
pub fn parse_module_tag(value: &str) -> Result<ModuleTag, ModuleTagError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(ModuleTagError::EmptyTag);
    }

    match normalized {
        MODULE_TAG_HABITS => Ok(ModuleTag::Habits),
        MODULE_TAG_TASKS => Ok(ModuleTag::Tasks),
        MODULE_TAG_FINANCE => Ok(ModuleTag::Finance),
        MODULE_TAG_HEALTH => Ok(ModuleTag::Health),
        MODULE_TAG_STUDIES => Ok(ModuleTag::Studies),
        MODULE_TAG_WORK => Ok(ModuleTag::Work),
        MODULE_TAG_SOCIAL => Ok(ModuleTag::Social),
        MODULE_TAG_HOME => Ok(ModuleTag::Home),
        other => Err(ModuleTagError::UnsupportedTag(other.to_string())),
    }
}

/// Module tag parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleTagError {
    EmptyTag,
    UnsupportedTag(String),
}

impl Display for ModuleTagError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTag => write!(f, "module tag must not be empty"),
            Self::UnsupportedTag(value) => write!(f, "module tag is unsupported: {value}"),
        }
    }
}

impl Error for ModuleTagError {}

use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::fs;
use log::info;

#[derive(Debug)]
pub enum SiteContextError {
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for SiteContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteContextError::IoError(e) => write!(f, "Site context file IO error: {}", e),
            SiteContextError::JsonError(e) => write!(f, "Site context JSON parsing error: {}", e),
        }
    }
}

impl Error for SiteContextError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SiteContextError::IoError(e) => Some(e),
            SiteContextError::JsonError(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for SiteContextError {
    fn from(err: std::io::Error) -> Self {
        SiteContextError::IoError(err)
    }
}

impl From<serde_json::Error> for SiteContextError {
    fn from(err: serde_json::Error) -> Self {
        SiteContextError::JsonError(err)
    }
}

/// What the chat assistant knows about the site it is embedded in.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SiteContext {
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub navigation: Vec<String>,
    #[serde(default)]
    pub headings: Vec<String>,
    /// Label to value, e.g. "Email" -> "me@example.com".
    #[serde(default)]
    pub contact: BTreeMap<String, String>,
}

fn default_owner() -> String {
    "the site owner".to_string()
}

impl Default for SiteContext {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            title: String::new(),
            description: None,
            navigation: Vec::new(),
            headings: Vec::new(),
            contact: BTreeMap::new(),
        }
    }
}

pub fn parse_site_context(json: &str) -> Result<SiteContext, SiteContextError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_site_context(path: &str) -> Result<SiteContext, SiteContextError> {
    let content = fs::read_to_string(path)?;
    let context = parse_site_context(&content)?;
    info!(
        "Loaded site context '{}' from {} ({} nav items, {} headings, {} contacts)",
        context.title,
        path,
        context.navigation.len(),
        context.headings.len(),
        context.contact.len()
    );
    Ok(context)
}

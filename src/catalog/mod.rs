use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod builtin;

static LINK_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("valid link id pattern"));

/// Stable key of a shortcut target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(String);

impl LinkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_well_formed(&self) -> bool {
        LINK_ID_PATTERN.is_match(&self.0)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for LinkId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LinkId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for LinkId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDefinition {
    pub id: LinkId,
    pub label: String,
    pub target_uri: String,
}

impl LinkDefinition {
    pub fn new(
        id: impl Into<LinkId>,
        label: impl Into<String>,
        target_uri: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            target_uri: target_uri.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("link `{0}` is not in the catalog")]
    NotFound(String),
    #[error("link `{0}` is defined more than once")]
    Duplicate(LinkId),
    #[error("`{0}` is not a valid link id")]
    InvalidId(String),
}

/// Read-only table of every selectable shortcut, kept in canonical order.
#[derive(Debug, Clone)]
pub struct Catalog {
    links: Vec<LinkDefinition>,
    index: HashMap<LinkId, usize>,
}

impl Catalog {
    pub fn new(links: Vec<LinkDefinition>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(links.len());
        for (position, link) in links.iter().enumerate() {
            if !link.id.is_well_formed() {
                return Err(CatalogError::InvalidId(link.id.to_string()));
            }
            if index.insert(link.id.clone(), position).is_some() {
                return Err(CatalogError::Duplicate(link.id.clone()));
            }
        }
        Ok(Self { links, index })
    }

    /// The browser's internal pages, addressed through `uri_scheme`
    /// (for example `chrome://`).
    pub fn builtin(uri_scheme: &str) -> Self {
        let links: Vec<LinkDefinition> = builtin::PAGES
            .iter()
            .map(|(id, label)| LinkDefinition::new(*id, *label, format!("{uri_scheme}{id}")))
            .collect();
        let index = links
            .iter()
            .enumerate()
            .map(|(position, link)| (link.id.clone(), position))
            .collect();
        Self { links, index }
    }

    pub fn get(&self, id: &str) -> Result<&LinkDefinition, CatalogError> {
        self.index
            .get(id)
            .map(|&position| &self.links[position])
            .ok_or_else(|| CatalogError::NotFound(id.to_owned()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkDefinition> {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn builtin_catalog_passes_validation() {
        let catalog = Catalog::builtin("chrome://");
        let rebuilt = Catalog::new(catalog.iter().cloned().collect());
        assert_matches!(rebuilt, Ok(ref table) if table.len() == catalog.len());
    }

    #[test]
    fn builtin_links_use_configured_scheme() -> anyhow::Result<()> {
        let catalog = Catalog::builtin("edge://");
        let history = catalog.get("history")?;
        assert_eq!(history.target_uri, "edge://history");
        assert_eq!(history.label, "History");
        Ok(())
    }

    #[test]
    fn lookup_of_unknown_id_is_not_found() {
        let catalog = Catalog::builtin("chrome://");
        assert_eq!(
            catalog.get("not-a-page"),
            Err(CatalogError::NotFound("not-a-page".into()))
        );
        assert!(!catalog.contains("not-a-page"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = Catalog::new(vec![
            LinkDefinition::new("about", "About", "chrome://about"),
            LinkDefinition::new("about", "About again", "chrome://about"),
        ]);
        assert_matches!(result, Err(CatalogError::Duplicate(id)) if id.as_str() == "about");
    }

    #[test]
    fn malformed_ids_are_rejected() {
        let result = Catalog::new(vec![LinkDefinition::new("Bad Id", "Bad", "chrome://bad")]);
        assert_matches!(result, Err(CatalogError::InvalidId(_)));
    }

    #[test]
    fn enumeration_keeps_canonical_order() -> anyhow::Result<()> {
        let catalog = Catalog::new(vec![
            LinkDefinition::new("about", "About", "chrome://about"),
            LinkDefinition::new("history", "History", "chrome://history"),
            LinkDefinition::new("crashes", "Crashes", "chrome://crashes"),
        ])?;
        let ids: Vec<_> = catalog.iter().map(|link| link.id.as_str()).collect();
        assert_eq!(ids, ["about", "history", "crashes"]);
        assert_eq!(catalog.position("crashes"), Some(2));
        Ok(())
    }
}

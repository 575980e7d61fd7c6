// src/registry/mod.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fs, path::Path};
use url::Url;

/// Which table walker to run against a source's markup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyVariant {
    /// Layout-aware parser that understands `thead`, spans and multi-row headers.
    #[default]
    Generic,
    /// Strict `th`/`td` walker for tables whose header/body split is unreliable.
    Structural,
}

/// How to extract the rate table for a single source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: String,
    #[serde(rename = "url")]
    pub address: Url,
    /// 0-based index among every `<table>` in the document.
    #[serde(rename = "table_index")]
    pub table_position: usize,
    #[serde(rename = "strategy", default)]
    pub strategy_variant: StrategyVariant,
}

static BUILTIN_SOURCES: &[(&str, &str, usize, StrategyVariant)] = &[
    (
        "NSB",
        "https://www.nsb.lk/rates-tarriffs/rupee-deposit-rates/",
        1,
        StrategyVariant::Generic,
    ),
    (
        "RDB",
        "https://www.rdb.lk/interest-rates/",
        2,
        StrategyVariant::Generic,
    ),
    (
        "SDB",
        "https://www.sdb.lk/en/rates?tableid=5",
        1,
        StrategyVariant::Generic,
    ),
    (
        "SMIB",
        "https://www.smib.lk/en/normal-fd-rates",
        0,
        StrategyVariant::Generic,
    ),
    (
        "HDFC",
        "https://www.hdfc.lk/rates-%26-tarfiffs",
        1,
        StrategyVariant::Structural,
    ),
];

#[derive(Debug, Deserialize)]
struct RegistryFile {
    sources: Vec<SourceDescriptor>,
}

/// Immutable id → descriptor lookup, in definition order.
#[derive(Debug, Clone)]
pub struct Registry {
    sources: Vec<SourceDescriptor>,
}

impl Registry {
    /// The bank deposit-rate pages the service ships with.
    pub fn builtin() -> Self {
        let sources = BUILTIN_SOURCES
            .iter()
            .map(|&(id, url, table_position, strategy_variant)| SourceDescriptor {
                id: id.to_string(),
                address: Url::parse(url).expect("built-in source URL should parse"),
                table_position,
                strategy_variant,
            })
            .collect();
        Self { sources }
    }

    pub fn from_descriptors(sources: Vec<SourceDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        for s in &sources {
            if !seen.insert(s.id.as_str()) {
                bail!("duplicate source id {:?}", s.id);
            }
        }
        Ok(Self { sources })
    }

    /// Parse a YAML document of the form `sources: [{id, url, table_index, strategy}]`.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: RegistryFile = serde_yaml::from_str(yaml).context("parsing source registry")?;
        Self::from_descriptors(file.sources)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading source registry {:?}", path))?;
        Self::from_yaml_str(&text).with_context(|| format!("loading {:?}", path))
    }

    pub fn get(&self, id: &str) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builtin_registry() {
        let reg = Registry::builtin();
        assert_eq!(
            reg.ids().collect::<Vec<_>>(),
            vec!["NSB", "RDB", "SDB", "SMIB", "HDFC"]
        );
        let hdfc = reg.get("HDFC").unwrap();
        assert_eq!(hdfc.table_position, 1);
        assert_eq!(hdfc.strategy_variant, StrategyVariant::Structural);
        assert_eq!(
            reg.get("SMIB").unwrap().strategy_variant,
            StrategyVariant::Generic
        );
        assert!(reg.get("nsb").is_none());
    }

    #[test]
    fn test_yaml_registry() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
sources:
  - id: ALPHA
    url: https://alpha.example/rates
    table_index: 2
  - id: BETA
    url: https://beta.example/rates
    table_index: 0
    strategy: structural
"#
        )
        .unwrap();

        let reg = Registry::from_yaml_file(file.path()).unwrap();
        assert_eq!(reg.len(), 2);
        let alpha = reg.get("ALPHA").unwrap();
        assert_eq!(alpha.strategy_variant, StrategyVariant::Generic);
        assert_eq!(alpha.address.as_str(), "https://alpha.example/rates");
        assert_eq!(
            reg.get("BETA").unwrap().strategy_variant,
            StrategyVariant::Structural
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let yaml = r#"
sources:
  - { id: A, url: "https://a.example/", table_index: 0 }
  - { id: A, url: "https://b.example/", table_index: 1 }
"#;
        let err = Registry::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate source id"));
    }
}

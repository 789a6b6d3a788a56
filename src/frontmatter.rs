/// YAML frontmatter extraction for Markdown notes.
///
/// A note may open with a `---` delimited YAML block. The block is parsed as a
/// mapping and flattened to string key/value pairs so it can ride along as
/// document metadata: list values are comma-joined, null or empty values are
/// dropped. An opening `---` with no closing line is a horizontal rule, not
/// frontmatter, and a block that parses to something other than a mapping
/// carries no fields.
use std::collections::BTreeMap;

use serde_yaml::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::Metadata;

/// Errors raised while reading a frontmatter block.
#[derive(Error, Debug)]
pub enum FrontMatterError {
    #[error("invalid frontmatter YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A note split into its flattened frontmatter fields and the remaining body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub fields: Metadata,
    pub body: String,
}

/// Parse frontmatter from markdown content.
///
/// Content without a leading `---` line is returned unchanged as the body with
/// no fields.
pub fn parse(content: &str) -> Result<FrontMatter, FrontMatterError> {
    let mut lines = content.split_inclusive('\n');

    let Some(first) = lines.next() else {
        return Ok(FrontMatter::default());
    };
    if first.trim_end() != "---" {
        return Ok(FrontMatter {
            fields: Metadata::new(),
            body: content.to_string(),
        });
    }

    let mut yaml = String::new();
    let mut offset = first.len();

    for line in lines {
        offset += line.len();
        if line.trim_end() == "---" {
            return Ok(FrontMatter {
                fields: flatten(&yaml)?,
                body: content[offset..].to_string(),
            });
        }
        yaml.push_str(line);
    }

    Ok(FrontMatter {
        fields: Metadata::new(),
        body: content.to_string(),
    })
}

fn flatten(yaml: &str) -> Result<Metadata, FrontMatterError> {
    if yaml.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let Value::Mapping(mapping) = serde_yaml::from_str::<Value>(yaml)? else {
        debug!("frontmatter block is not a mapping, ignoring it");
        return Ok(BTreeMap::new());
    };

    let mut fields = BTreeMap::new();
    for (key, value) in &mapping {
        let Some(key) = scalar_to_string(key) else {
            continue;
        };
        if let Some(value) = flatten_value(value) {
            fields.insert(key, value);
        }
    }
    Ok(fields)
}

fn flatten_value(value: &Value) -> Option<String> {
    let flat = match value {
        Value::Sequence(items) => items
            .iter()
            .filter_map(scalar_to_string)
            .filter(|item| !item.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Mapping(_) => serde_yaml::to_string(value).ok()?.trim().to_string(),
        other => scalar_to_string(other)?,
    };

    (!flat.trim().is_empty()).then_some(flat)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_no_frontmatter() {
        let fm = parse("# Hello\n\nWorld").unwrap();
        assert!(fm.fields.is_empty());
        assert_eq!(fm.body, "# Hello\n\nWorld");
    }

    #[test]
    fn test_parse_with_frontmatter() {
        let content = "---\ndomain: backend\ntags: [auth, db]\n---\n# Doc\n";
        let fm = parse(content).unwrap();
        assert_eq!(fm.fields["domain"], "backend");
        assert_eq!(fm.fields["tags"], "auth, db");
        assert_eq!(fm.body, "# Doc\n");
    }

    #[test]
    fn test_block_list_is_comma_joined() {
        let content = "---\naliases:\n  - Web3\n  - decentralised web\n---\nbody\n";
        let fm = parse(content).unwrap();
        assert_eq!(fm.fields["aliases"], "Web3, decentralised web");
    }

    #[test]
    fn test_null_and_empty_entries_dropped() {
        let content = "---\nstatus:\ntitle: \"\"\ntags: []\nrating: 4\ndraft: false\n---\n";
        let fm = parse(content).unwrap();
        assert!(!fm.fields.contains_key("status"));
        assert!(!fm.fields.contains_key("title"));
        assert!(!fm.fields.contains_key("tags"));
        assert_eq!(fm.fields["rating"], "4");
        assert_eq!(fm.fields["draft"], "false");
    }

    #[test]
    fn test_empty_block() {
        let fm = parse("---\n---\ntext\n").unwrap();
        assert!(fm.fields.is_empty());
        assert_eq!(fm.body, "text\n");
    }

    #[test]
    fn test_unclosed_block_is_plain_body() {
        let content = "---\n# Heading\nSome content\n";
        let fm = parse(content).unwrap();
        assert!(fm.fields.is_empty());
        assert_eq!(fm.body, content);
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        let err = parse("---\ntitle: [unterminated\n---\nbody\n").unwrap_err();
        assert!(matches!(err, FrontMatterError::Yaml(_)), "got {err:?}");
    }

    #[test]
    fn test_scalar_block_has_no_fields() {
        let fm = parse("---\njust prose\n---\n# H\nbody\n").unwrap();
        assert!(fm.fields.is_empty());
        assert_eq!(fm.body, "# H\nbody\n");
    }

    #[test]
    fn test_crlf_delimiters() {
        let fm = parse("---\r\ntitle: x\r\n---\r\nbody\r\n").unwrap();
        assert_eq!(fm.fields["title"], "x");
        assert_eq!(fm.body, "body\r\n");
    }
}

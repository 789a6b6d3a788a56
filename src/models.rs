use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Flattened string metadata carried by documents and nodes.
pub type Metadata = BTreeMap<String, String>;

/// An addressable slice of a note, produced by the document builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// An embedding-sized fragment of a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub ref_doc_id: String,
    pub text: String,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Node {
    /// Text sent to the embedding model: metadata as `key: value` lines, a
    /// blank line, then the node text.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        if self.metadata.is_empty() {
            return self.text.clone();
        }
        let header: Vec<String> = self
            .metadata
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect();
        format!("{}\n\n{}", header.join("\n"), self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_text_with_metadata() {
        let node = Node {
            id: "a.md#Intro|0".into(),
            ref_doc_id: "a.md#Intro".into(),
            text: "hello".into(),
            metadata: Metadata::from([
                ("file_name".to_string(), "a.md".to_string()),
                ("tags".to_string(), "web3, dapps".to_string()),
            ]),
            embedding: None,
        };
        assert_eq!(
            node.embedding_text(),
            "file_name: a.md\ntags: web3, dapps\n\nhello"
        );
    }

    #[test]
    fn test_embedding_skipped_in_json_when_absent() {
        let node = Node {
            id: "n".into(),
            ref_doc_id: "d".into(),
            text: "t".into(),
            metadata: Metadata::new(),
            embedding: None,
        };
        let json = serde_json::to_value(&node).unwrap();
        assert!(json.get("embedding").is_none());
        assert_eq!(json["id"], "n");
    }
}

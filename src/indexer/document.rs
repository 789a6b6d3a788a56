use std::collections::{HashMap, HashSet};

use crate::indexer::markdown::Section;
use crate::models::{Document, Metadata};

/// Metadata key holding the note's file name.
pub const FILE_NAME_KEY: &str = "file_name";

/// Turns the sections of one note into addressable documents.
///
/// Header sections get id `<path>#<header>` and text `"\n\n<header>\n<body>"`.
/// Sections without a header get id `<path>:<n>`, where `n` counts only
/// header-less sections, and keep their body verbatim. A header repeated
/// within the note gets the lowest `:<n>` suffix not already issued for the
/// note, so a literal header such as `Notes:1` never collides with a repeat.
pub fn build_documents(
    relative_path: &str,
    file_name: &str,
    sections: Vec<Section>,
    front_matter: &Metadata,
) -> Vec<Document> {
    let mut metadata = front_matter.clone();
    metadata.insert(FILE_NAME_KEY.to_string(), file_name.to_string());

    let mut headerless = 0usize;
    let mut seen_headers: HashMap<String, usize> = HashMap::new();
    let mut issued: HashSet<String> = HashSet::new();

    sections
        .into_iter()
        .map(|section| {
            let (id, text) = match section.header {
                Some(header) => {
                    let base = format!("{relative_path}#{header}");
                    let mut id = base.clone();
                    if issued.contains(&id) {
                        let repeats = seen_headers.entry(header.clone()).or_insert(0);
                        loop {
                            *repeats += 1;
                            id = format!("{base}:{repeats}");
                            if !issued.contains(&id) {
                                break;
                            }
                        }
                    }
                    issued.insert(id.clone());
                    (id, format!("\n\n{header}\n{}", section.body))
                }
                None => {
                    let id = format!("{relative_path}:{headerless}");
                    headerless += 1;
                    (id, section.body)
                }
            };
            Document {
                id,
                text,
                metadata: metadata.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::markdown::split_sections;

    #[test]
    fn test_header_documents() {
        let docs = build_documents(
            "notes/web3.md",
            "web3.md",
            split_sections("# Title\nhello\n# Next\nworld\n"),
            &Metadata::new(),
        );
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "notes/web3.md#Title");
        assert_eq!(docs[0].text, "\n\nTitle\nhello\n");
        assert_eq!(docs[1].id, "notes/web3.md#Next");
        assert_eq!(docs[1].text, "\n\nNext\nworld\n");
    }

    #[test]
    fn test_headerless_document() {
        let docs = build_documents(
            "plain.md",
            "plain.md",
            split_sections("just text\n"),
            &Metadata::new(),
        );
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "plain.md:0");
        assert_eq!(docs[0].text, "just text\n");
    }

    #[test]
    fn test_metadata_shared_by_every_document() {
        let front_matter = Metadata::from([("tags".to_string(), "a, b".to_string())]);
        let docs = build_documents(
            "x.md",
            "x.md",
            split_sections("pre\n# One\n1\n# Two\n2\n"),
            &front_matter,
        );
        assert_eq!(docs.len(), 3);
        for doc in &docs {
            assert_eq!(doc.metadata["tags"], "a, b");
            assert_eq!(doc.metadata[FILE_NAME_KEY], "x.md");
        }
        assert_eq!(docs[0].id, "x.md:0");
    }

    #[test]
    fn test_repeated_headers_get_unique_ids() {
        let docs = build_documents(
            "log.md",
            "log.md",
            split_sections("# Notes\na\n# Notes\nb\n# Notes\nc\n"),
            &Metadata::new(),
        );
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["log.md#Notes", "log.md#Notes:1", "log.md#Notes:2"]);
    }

    #[test]
    fn test_repeat_suffix_skips_literal_header() {
        let docs = build_documents(
            "log.md",
            "log.md",
            split_sections("# Notes\na\n# Notes\nb\n# Notes:1\nc\n"),
            &Metadata::new(),
        );
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["log.md#Notes", "log.md#Notes:1", "log.md#Notes:1:1"]);
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_literal_header_first_pushes_repeat_further() {
        let docs = build_documents(
            "log.md",
            "log.md",
            split_sections("# Notes:1\nx\n# Notes\na\n# Notes\nb\n"),
            &Metadata::new(),
        );
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["log.md#Notes:1", "log.md#Notes", "log.md#Notes:2"]);
    }
}

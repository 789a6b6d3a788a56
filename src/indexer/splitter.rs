use crate::models::{Document, Node};

#[derive(Debug, Clone, Copy)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 200,
        }
    }
}

/// Splits documents into embedding-sized nodes.
///
/// Node ids are `<document id>|<n>`. Blank documents produce no nodes.
pub fn split_documents(documents: &[Document], config: SplitterConfig) -> Vec<Node> {
    documents
        .iter()
        .flat_map(|doc| {
            split_text(&doc.text, config.chunk_size, config.chunk_overlap)
                .into_iter()
                .enumerate()
                .map(|(position, text)| Node {
                    id: format!("{}|{position}", doc.id),
                    ref_doc_id: doc.id.clone(),
                    text,
                    metadata: doc.metadata.clone(),
                    embedding: None,
                })
        })
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Splits text into chunks of approximately `chunk_size` characters (using `char` count).
///
/// Text that already fits is returned unchanged as a single chunk. Longer text
/// is packed paragraph by paragraph, and consecutive chunks share up to
/// `chunk_overlap` trailing characters.
pub fn split_text(content: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if content.trim().is_empty() {
        return Vec::new();
    }
    if char_len(content) <= chunk_size {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    for para in content.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        let para_len = char_len(para);

        // A paragraph that cannot fit on its own is cut at sentence boundaries
        if para_len > chunk_size {
            if !current_chunk.is_empty() {
                chunks.push(std::mem::take(&mut current_chunk));
            }
            chunks.extend(split_large_paragraph(para, chunk_size, chunk_overlap));
            continue;
        }

        let current_len = char_len(&current_chunk);
        if current_len > 0 && current_len + para_len + 2 > chunk_size {
            let tail = overlap_tail(&current_chunk, chunk_overlap).to_string();
            chunks.push(std::mem::take(&mut current_chunk));
            if !tail.is_empty() && char_len(&tail) + para_len + 2 <= chunk_size {
                current_chunk = tail;
            }
        }

        if !current_chunk.is_empty() {
            current_chunk.push_str("\n\n");
        }
        current_chunk.push_str(para);
    }

    if !current_chunk.is_empty() {
        chunks.push(current_chunk);
    }

    chunks
}

/// Last `overlap` characters of a chunk, advanced to the next word start.
fn overlap_tail(chunk: &str, overlap: usize) -> &str {
    if overlap == 0 {
        return "";
    }
    let count = char_len(chunk);
    if count <= overlap {
        return chunk;
    }
    let start = chunk
        .char_indices()
        .nth(count - overlap)
        .map_or(0, |(i, _)| i);
    let tail = &chunk[start..];
    match tail.find(char::is_whitespace) {
        Some(ws) => tail[ws..].trim_start(),
        None => tail,
    }
}

/// Splits a large paragraph into smaller chunks, preferring sentence boundaries.
fn split_large_paragraph(para: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = para.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while chars.len() - start > chunk_size {
        let limit = start + chunk_size;
        let mut cut = limit;

        // Search backwards from the limit to half a chunk for a sentence boundary
        for i in (start + chunk_size / 2..limit).rev() {
            if matches!(chars[i], '.' | '!' | '?' | '\n' | '。') {
                cut = i + 1;
                break;
            }
        }

        let piece: String = chars[start..cut].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        // Overlap never eats more than half of the piece just emitted
        let back = chunk_overlap.min((cut - start) / 2);
        start = cut - back;
    }

    let rest: String = chars[start..].iter().collect();
    let rest = rest.trim();
    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    fn doc(id: &str, text: &str) -> Document {
        Document {
            id: id.to_string(),
            text: text.to_string(),
            metadata: Metadata::from([("file_name".to_string(), "a.md".to_string())]),
        }
    }

    #[test]
    fn test_short_text_unchanged() {
        let text = "\n\nTitle\nhello\n";
        assert_eq!(split_text(text, 500, 50), vec![text.to_string()]);
    }

    #[test]
    fn test_split_empty_text() {
        assert!(split_text("", 500, 0).is_empty());
        assert!(split_text("   \n\n   \n\n   ", 500, 0).is_empty());
    }

    #[test]
    fn test_split_long_text_respects_size() {
        let para = "Test paragraph. ".repeat(20);
        let content = vec![para; 10].join("\n\n");
        let chunks = split_text(&content, 500, 0);

        assert!(chunks.len() >= 2);
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(!chunk.is_empty(), "Chunk {i} is empty");
            assert!(char_len(chunk) <= 500, "Chunk {i} too long");
        }
    }

    #[test]
    fn test_overlap_carries_tail() {
        let paras: Vec<String> = (0..6).map(|i| format!("para{i} ").repeat(15)).collect();
        let content = paras.join("\n\n");
        let chunks = split_text(&content, 200, 40);

        assert!(chunks.len() >= 2);
        for pair in chunks.windows(2) {
            let prev_len = char_len(&pair[0]);
            let prev_tail: String = pair[0].chars().skip(prev_len - 10).collect();
            assert!(
                pair[1].contains(prev_tail.trim()),
                "expected {:?} to start with overlap from {:?}",
                pair[1],
                pair[0]
            );
        }
    }

    #[test]
    fn test_split_large_paragraph() {
        let long_para = "This is a long sentence. ".repeat(100);
        let chunks = split_large_paragraph(&long_para, 500, 0);

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(!chunk.is_empty());
            assert!(chunk.ends_with('.'), "should cut at a sentence end: {chunk:?}");
        }
    }

    #[test]
    fn test_split_large_paragraph_with_overlap_terminates() {
        let long_para = "x".repeat(5000);
        let chunks = split_large_paragraph(&long_para, 100, 90);
        assert!(chunks.len() > 50);
        assert!(chunks.iter().all(|c| char_len(c) <= 100));
    }

    #[test]
    fn test_split_japanese() {
        let long_para = "これは日本語のテストです。".repeat(100);
        let chunks = split_large_paragraph(&long_para, 500, 20);

        assert!(chunks.len() >= 2);
        for chunk in chunks {
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn test_split_documents_ids_and_metadata() {
        let long = format!("{}\n\n{}", "a ".repeat(150), "b ".repeat(150));
        let docs = vec![
            doc("a.md#Intro", "\n\nIntro\nshort\n"),
            doc("a.md#Long", &long),
            doc("a.md:0", "  \n"),
        ];
        let config = SplitterConfig {
            chunk_size: 400,
            chunk_overlap: 0,
        };
        let nodes = split_documents(&docs, config);

        assert_eq!(nodes[0].id, "a.md#Intro|0");
        assert_eq!(nodes[0].text, "\n\nIntro\nshort\n");
        assert_eq!(nodes[0].ref_doc_id, "a.md#Intro");

        let long_nodes: Vec<&Node> = nodes
            .iter()
            .filter(|n| n.ref_doc_id == "a.md#Long")
            .collect();
        assert_eq!(long_nodes.len(), 2);
        assert_eq!(long_nodes[1].id, "a.md#Long|1");

        assert!(
            !nodes.iter().any(|n| n.ref_doc_id == "a.md:0"),
            "blank docs yield no nodes"
        );
        assert!(nodes.iter().all(|n| n.metadata["file_name"] == "a.md"));
        assert!(nodes.iter().all(|n| n.embedding.is_none()));
    }
}

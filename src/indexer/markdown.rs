use std::sync::LazyLock;

use regex::Regex;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#+\s").unwrap());
static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<.*?>").unwrap());
static HYPERLINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]\((.*?)\)").unwrap());
static IMAGE_EMBED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[\[(.*?)\]\]").unwrap());

/// Whole-file rewrites applied before a note is split into sections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub remove_hyperlinks: bool,
    pub remove_images: bool,
}

/// A header-delimited slice of a note. `header` is `None` for text that
/// precedes the first header (or for a note without headers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub header: Option<String>,
    pub body: String,
}

/// Pre-process a note body and split it into sections.
pub fn parse_markdown(content: &str, options: ParseOptions) -> Vec<Section> {
    let mut content = content.to_string();
    if options.remove_hyperlinks {
        content = remove_hyperlinks(&content);
    }
    if options.remove_images {
        content = remove_images(&content);
    }
    split_sections(&content)
}

/// Rewrites every `[label](url)` to `label`.
///
/// Runs to a fixpoint so nested links such as `[[a](b)](c)` leave no pair behind.
pub fn remove_hyperlinks(content: &str) -> String {
    replace_until_stable(&HYPERLINK_RE, content, "${1}")
}

/// Deletes every `![[...]]` embed.
pub fn remove_images(content: &str) -> String {
    replace_until_stable(&IMAGE_EMBED_RE, content, "")
}

// Each replacement shortens the text, so this terminates.
fn replace_until_stable(re: &Regex, content: &str, replacement: &str) -> String {
    let mut current = content.to_string();
    loop {
        let next = re.replace_all(&current, replacement).into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Splits a note on header lines (`#`, `##`, ... followed by whitespace).
///
/// A section whose body is blank is dropped when the next header starts, but
/// the last section is always kept.
pub fn split_sections(markdown: &str) -> Vec<Section> {
    let mut raw: Vec<(Option<&str>, String)> = Vec::new();
    let mut current_header: Option<&str> = None;
    let mut current_text = String::new();

    for line in markdown.lines() {
        if HEADER_RE.is_match(line) {
            if !current_text.trim().is_empty() {
                raw.push((current_header, std::mem::take(&mut current_text)));
            }
            current_header = Some(line);
            current_text.clear();
        } else {
            current_text.push_str(line);
            current_text.push('\n');
        }
    }
    raw.push((current_header, current_text));

    raw.into_iter()
        .map(|(header, body)| Section {
            header: header.and_then(clean_header),
            body: HTML_TAG_RE.replace_all(&body, "").into_owned(),
        })
        .collect()
}

fn clean_header(line: &str) -> Option<String> {
    let header = line.replace('#', "");
    let header = header.trim();
    (!header.is_empty()).then(|| header.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(header: Option<&str>, body: &str) -> Section {
        Section {
            header: header.map(str::to_string),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_two_headers() {
        let sections = split_sections("# Title\nhello\n# Next\nworld\n");
        assert_eq!(
            sections,
            vec![
                section(Some("Title"), "hello\n"),
                section(Some("Next"), "world\n")
            ]
        );
    }

    #[test]
    fn test_headerless_note() {
        let sections = split_sections("just text\n");
        assert_eq!(sections, vec![section(None, "just text\n")]);
    }

    #[test]
    fn test_preamble_before_first_header_is_kept() {
        let sections = split_sections("intro line\n## Details\nmore\n");
        assert_eq!(
            sections,
            vec![section(None, "intro line\n"), section(Some("Details"), "more\n")]
        );
    }

    #[test]
    fn test_empty_intermediate_section_dropped() {
        let sections = split_sections("# A\n\n   \n# B\ntext\n");
        assert_eq!(sections, vec![section(Some("B"), "text\n")]);
    }

    #[test]
    fn test_last_section_kept_even_if_empty() {
        let sections = split_sections("# A\nbody\n# Trailing\n");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1], section(Some("Trailing"), ""));

        let only_header = split_sections("# Lonely");
        assert_eq!(only_header, vec![section(Some("Lonely"), "")]);

        let empty = split_sections("");
        assert_eq!(empty, vec![section(None, "")]);
    }

    #[test]
    fn test_deep_headers_and_hash_stripping() {
        let sections = split_sections("### Layer #2 ###\nbody\n");
        assert_eq!(sections[0].header.as_deref(), Some("Layer 2"));
    }

    #[test]
    fn test_tags_are_not_headers() {
        let sections = split_sections("#web3 #dapps\n#\nplain\n");
        assert_eq!(sections, vec![section(None, "#web3 #dapps\n#\nplain\n")]);
    }

    #[test]
    fn test_html_tags_stripped_from_body() {
        let sections = split_sections("# T\nsome <b>bold</b> and <br/> text\n");
        assert_eq!(sections[0].body, "some bold and  text\n");
    }

    #[test]
    fn test_remove_hyperlinks() {
        assert_eq!(
            remove_hyperlinks("see [the docs](https://example.com) and [x](y)"),
            "see the docs and x"
        );
    }

    #[test]
    fn test_remove_hyperlinks_idempotent_on_nested() {
        let once = remove_hyperlinks("[[inner](a)](b) tail");
        assert!(!HYPERLINK_RE.is_match(&once), "left a link in {once:?}");
        assert_eq!(remove_hyperlinks(&once), once);
    }

    #[test]
    fn test_remove_images() {
        let cleaned = remove_images("before ![[diagram.png]] middle ![[other.jpg]] after");
        assert_eq!(cleaned, "before  middle  after");
        assert!(!cleaned.contains("![["));
    }

    #[test]
    fn test_remove_images_exposed_embed() {
        let cleaned = remove_images("!![[a.png]][[b.png]]");
        assert!(!IMAGE_EMBED_RE.is_match(&cleaned), "left an embed in {cleaned:?}");
    }

    #[test]
    fn test_wikilinks_survive_image_removal() {
        let cleaned = remove_images("through [[Layer 2#DApps|DApps]] which");
        assert_eq!(cleaned, "through [[Layer 2#DApps|DApps]] which");
    }

    #[test]
    fn test_options_default_off() {
        let content = "# H\n[a](b) ![[c.png]]\n";
        let sections = parse_markdown(content, ParseOptions::default());
        assert_eq!(sections[0].body, "[a](b) ![[c.png]]\n");

        let sections = parse_markdown(
            content,
            ParseOptions {
                remove_hyperlinks: true,
                remove_images: true,
            },
        );
        assert_eq!(sections[0].body, "a \n");
    }
}

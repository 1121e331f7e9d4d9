//! Line-based frontmatter parsing for prompt documents.
//!
//! Only a restricted `key: value` subset is understood. The `references`
//! key is the one list-valued field.

use std::collections::HashMap;

const DELIMITER: &str = "---";
const LIST_KEYS: [&str; 1] = ["references"];

#[derive(Debug, Clone, PartialEq)]
pub enum FrontmatterValue {
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    entries: HashMap<String, FrontmatterValue>,
}

impl Frontmatter {
    pub fn get(&self, key: &str) -> Option<&FrontmatterValue> {
        self.entries.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(FrontmatterValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> Option<&[String]> {
        match self.entries.get(key) {
            Some(FrontmatterValue::List(items)) => Some(items),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: FrontmatterValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Splits a document into its frontmatter and body.
///
/// A header is recognised only when the first line is `---` and a second
/// `---` line closes it; the body after a header is trimmed. Without a
/// header the frontmatter is empty and the body is the document unchanged.
pub fn parse_frontmatter(content: &str) -> (Frontmatter, String) {
    let mut frontmatter = Frontmatter::default();

    let Some((header, body)) = split_header(content) else {
        log::debug!("No frontmatter found");
        return (frontmatter, content.to_string());
    };

    for line in header.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        let value = if LIST_KEYS.contains(&key) {
            FrontmatterValue::List(parse_list_value(value))
        } else {
            FrontmatterValue::Text(unquote(value.trim()).to_string())
        };
        frontmatter.insert(key, value);
    }

    log::debug!("Parsed frontmatter: {:?}", frontmatter);
    (frontmatter, body.trim().to_string())
}

/// Parses `[a, b, c]` or a single bare value into a list.
pub fn parse_list_value(value: &str) -> Vec<String> {
    let value = value.trim();

    if let Some(inner) = value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        return inner
            .split(',')
            .map(|item| unquote(item.trim()))
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect();
    }

    match unquote(value) {
        "" => Vec::new(),
        single => vec![single.to_string()],
    }
}

fn split_header(content: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    let mut header_start = None;

    for line in content.split_inclusive('\n') {
        let is_delimiter = line.trim_end_matches(|c: char| c == '\n' || c == '\r') == DELIMITER;
        match header_start {
            None if is_delimiter => header_start = Some(offset + line.len()),
            None => return None,
            Some(start) if is_delimiter => {
                return Some((&content[start..offset], &content[offset + line.len()..]));
            }
            Some(_) => {}
        }
        offset += line.len();
    }

    None
}

/// Removes one layer of matching single or double quotes.
fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_without_header_is_all_body() {
        let doc = "Just a prompt\nwith two lines\n";
        let (frontmatter, body) = parse_frontmatter(doc);
        assert!(frontmatter.is_empty());
        assert_eq!(body, doc);
    }

    #[test]
    fn delimiter_must_open_the_document() {
        let doc = "intro\n---\ntitle: a\n---\nBody";
        let (frontmatter, body) = parse_frontmatter(doc);
        assert!(frontmatter.is_empty());
        assert_eq!(body, doc);
    }

    #[test]
    fn unterminated_header_is_ignored() {
        let doc = "---\ntitle: a\nBody";
        let (frontmatter, body) = parse_frontmatter(doc);
        assert!(frontmatter.is_empty());
        assert_eq!(body, doc);
    }

    #[test]
    fn parses_title_and_reference_list() {
        let (frontmatter, body) =
            parse_frontmatter("---\ntitle: a\nreferences: [x.jpg, y.png]\n---\nBody");
        assert_eq!(frontmatter.len(), 2);
        assert_eq!(frontmatter.text("title"), Some("a"));
        assert_eq!(
            frontmatter.list("references"),
            Some(&["x.jpg".to_string(), "y.png".to_string()][..])
        );
        assert_eq!(body, "Body");
    }

    #[test]
    fn single_reference_without_brackets() {
        let (frontmatter, _) = parse_frontmatter("---\nreferences: single.jpg\n---\n");
        assert_eq!(
            frontmatter.get("references"),
            Some(&FrontmatterValue::List(vec!["single.jpg".into()]))
        );
    }

    #[test]
    fn empty_reference_list() {
        let (frontmatter, _) = parse_frontmatter("---\nreferences: []\n---\nBody");
        assert_eq!(frontmatter.list("references"), Some(&[][..]));
        assert_eq!(parse_list_value(""), Vec::<String>::new());
    }

    #[test]
    fn values_lose_one_layer_of_quotes() {
        let (frontmatter, _) = parse_frontmatter(
            "---\ntitle: \"quoted title\"\nresolution: '2K'\nnested: \"'inner'\"\n---\n",
        );
        assert_eq!(frontmatter.text("title"), Some("quoted title"));
        assert_eq!(frontmatter.text("resolution"), Some("2K"));
        assert_eq!(frontmatter.text("nested"), Some("'inner'"));
    }

    #[test]
    fn quoted_list_items_are_unwrapped() {
        assert_eq!(
            parse_list_value(" [\"a b.png\", 'c.jpg', , d.gif] "),
            vec!["a b.png", "c.jpg", "d.gif"]
        );
    }

    #[test]
    fn value_may_contain_colons() {
        let (frontmatter, _) = parse_frontmatter("---\naspect_ratio: 16:9\n---\n");
        assert_eq!(frontmatter.text("aspect_ratio"), Some("16:9"));
    }

    #[test]
    fn lines_without_colon_are_skipped() {
        let (frontmatter, body) = parse_frontmatter("---\njunk line\nbatch: 3\n---\n\n  Body text  \n");
        assert_eq!(frontmatter.len(), 1);
        assert_eq!(frontmatter.text("batch"), Some("3"));
        assert_eq!(body, "Body text");
    }

    #[test]
    fn crlf_delimiters_are_accepted() {
        let (frontmatter, body) = parse_frontmatter("---\r\ntitle: win\r\n---\r\nBody\r\n");
        assert_eq!(frontmatter.text("title"), Some("win"));
        assert_eq!(body, "Body");
    }
}

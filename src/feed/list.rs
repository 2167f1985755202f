//! Plain-text identity lists used for import and export.
use std::collections::HashSet;
use std::io;
use std::path::Path;

use crate::util::write_atomic;

/// Read one feed identity (URL or shell command) per line.
///
/// Lines are trimmed; blank lines and lines starting with `#` are skipped;
/// repeated identities are kept once, in first-seen order.
pub fn read_identity_list(path: &Path) -> io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_identity_list(&content))
}

pub fn parse_identity_list(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(*line))
        .map(str::to_string)
        .collect()
}

/// Overwrite `path` with one link per line.
pub fn write_link_list<'a>(
    path: &Path,
    links: impl IntoIterator<Item = &'a str>,
) -> io::Result<usize> {
    let mut out = String::new();
    let mut count = 0;
    for link in links {
        out.push_str(link);
        out.push('\n');
        count += 1;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_atomic(path, out.as_bytes())?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_skips_blanks_comments_and_repeats() {
        let content = "\
https://a.example/rss
  # a comment

curl -s https://b.example/feed | sed 's/x/y/'
https://a.example/rss
   https://c.example/atom
";
        assert_eq!(
            parse_identity_list(content),
            vec![
                "https://a.example/rss",
                "curl -s https://b.example/feed | sed 's/x/y/'",
                "https://c.example/atom",
            ]
        );
    }

    #[test]
    fn test_missing_list_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_identity_list(&dir.path().join("list.txt")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_write_then_read_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list_export.txt");
        std::fs::write(&path, "stale\n").unwrap();

        let n = write_link_list(&path, ["https://a.example/rss", "cat feed.xml"]).unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "https://a.example/rss\ncat feed.xml\n"
        );
        assert_eq!(
            read_identity_list(&path).unwrap(),
            vec!["https://a.example/rss", "cat feed.xml"]
        );
    }
}

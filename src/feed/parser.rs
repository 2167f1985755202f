use chrono::{DateTime, Local};
use feed_rs::parser;

use crate::storage::ordering::sort_items;
use crate::storage::{Feed, Item};
use crate::util::sanitize_line;

/// Parse an RSS, Atom or JSON Feed document into a [`Feed`].
///
/// The feed's link is forced to `identity`. Entries without a timestamp or
/// dated after `now` are dropped, the rest are converted to local time,
/// painted with `color` and sorted newest first.
pub fn parse_feed(
    bytes: &[u8],
    identity: &str,
    color: u8,
    now: DateTime<Local>,
) -> Result<Feed, parser::ParseFeedError> {
    let parsed = parser::parse(bytes)?;

    let total = parsed.entries.len();
    let mut items: Vec<Item> = parsed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let published = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.with_timezone(&Local))
                .filter(|p| *p <= now)?;

            let title = entry
                .title
                .map(|t| sanitize_line(&t.content).into_owned())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());
            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            let link = entry.links.first().map(|l| l.href.clone()).unwrap_or_default();
            let author = entry
                .authors
                .first()
                .map(|p| p.name.trim().to_string())
                .filter(|n| !n.is_empty());

            Some(Item {
                title,
                description,
                link,
                author,
                published: Some(published),
                belongs_to: identity.to_string(),
                color,
            })
        })
        .collect();

    let dropped = total - items.len();
    if dropped > 0 {
        tracing::debug!(
            feed = %identity,
            dropped = dropped,
            "Entries without a past timestamp skipped"
        );
    }

    sort_items(&mut items);

    let title = parsed
        .title
        .map(|t| sanitize_line(&t.content).into_owned())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| identity.to_string());

    Ok(Feed {
        link: identity.to_string(),
        title,
        description: parsed.description.map(|d| d.content).unwrap_or_default(),
        site_link: parsed.links.first().map(|l| l.href.clone()).unwrap_or_default(),
        published: parsed
            .published
            .or(parsed.updated)
            .map(|dt| dt.with_timezone(&Local)),
        color,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Example   Blog</title>
    <link>https://example.com/</link>
    <description>Posts</description>
    <item>
        <title>Older</title>
        <link>https://example.com/older</link>
        <pubDate>Mon, 01 Jan 2024 10:00:00 +0000</pubDate>
        <description>first</description>
    </item>
    <item>
        <title>Newer</title>
        <link>https://example.com/newer</link>
        <pubDate>Tue, 02 Jan 2024 10:00:00 +0000</pubDate>
    </item>
    <item>
        <title>From the future</title>
        <pubDate>Wed, 01 Jan 2031 10:00:00 +0000</pubDate>
    </item>
    <item>
        <title>Undated</title>
    </item>
</channel></rss>"#;

    #[test]
    fn test_parse_rss_filters_and_sorts() {
        let feed = parse_feed(RSS.as_bytes(), "https://example.com/rss", 77, now()).unwrap();

        assert_eq!(feed.link, "https://example.com/rss");
        assert_eq!(feed.title, "Example Blog");
        assert_eq!(feed.site_link, "https://example.com/");
        assert_eq!(feed.color, 77);

        let titles: Vec<_> = feed.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Newer", "Older"]);
        assert!(feed.items.iter().all(|i| i.belongs_to == "https://example.com/rss"));
        assert!(feed.items.iter().all(|i| i.color == 77));
        assert_eq!(feed.items[1].description, "first");
        assert_eq!(feed.items[0].link, "https://example.com/newer");
    }

    #[test]
    fn test_parse_atom_uses_updated_and_author() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <id>urn:feed</id>
  <updated>2024-01-03T00:00:00Z</updated>
  <entry>
    <title>Entry</title>
    <id>urn:1</id>
    <updated>2024-01-03T00:00:00Z</updated>
    <author><name>Jo</name></author>
  </entry>
</feed>"#;
        let feed = parse_feed(atom.as_bytes(), "cat feed.xml", 3, now()).unwrap();
        assert_eq!(feed.link, "cat feed.xml");
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].author.as_deref(), Some("Jo"));
        assert!(feed.published.is_some());
    }

    #[test]
    fn test_missing_titles_fall_back() {
        let rss = r#"<rss version="2.0"><channel>
            <item><pubDate>Mon, 01 Jan 2024 10:00:00 +0000</pubDate></item>
        </channel></rss>"#;
        let feed = parse_feed(rss.as_bytes(), "https://x.example/feed", 1, now()).unwrap();
        assert_eq!(feed.title, "https://x.example/feed");
        assert_eq!(feed.items[0].title, "Untitled");
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(parse_feed(b"<not valid xml", "x", 1, now()).is_err());
    }
}

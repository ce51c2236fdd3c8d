use std::fs;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::config::{parse_with_format, strip_weekday_word};
use crate::http::{HttpClient, HttpError};

pub(crate) const ENCLOSURE_REL: &str = "enclosure";
const ALTERNATE_REL: &str = "alternate";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Link {
    pub(crate) rel: String,
    pub(crate) href: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FeedEntry {
    pub(crate) title: String,
    /// Publication date exactly as the feed wrote it.
    pub(crate) published: String,
    pub(crate) published_at: Option<DateTime<Utc>>,
    pub(crate) links: Vec<Link>,
}

impl FeedEntry {
    pub(crate) fn enclosure_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.rel == ENCLOSURE_REL)
            .map(|link| link.href.as_str())
    }

    /// The publication instant, falling back to the configured date format for
    /// feeds that do not use RFC 2822 or RFC 3339 dates.
    pub(crate) fn published_instant(&self, date_format: &str) -> Option<DateTime<Utc>> {
        self.published_at
            .or_else(|| parse_with_format(&self.published, date_format).ok())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Feed {
    pub(crate) title: Option<String>,
    /// Entries in the order the feed lists them.
    pub(crate) entries: Vec<FeedEntry>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum FeedError {
    #[error("failed to fetch feed {address}")]
    Fetch {
        address: String,
        #[source]
        source: HttpError,
    },
    #[error("failed to parse feed as RSS ({rss}) or Atom ({atom})")]
    Parse { rss: String, atom: String },
}

pub(crate) trait FeedSource {
    fn snapshot(&self, address: &str) -> Result<Feed, FeedError>;
}

impl FeedSource for HttpClient {
    fn snapshot(&self, address: &str) -> Result<Feed, FeedError> {
        let raw = if address.starts_with("http://") || address.starts_with("https://") {
            self.get_bytes(address)
        } else {
            let path = address.strip_prefix("file://").unwrap_or(address);
            fs::read(Path::new(path)).map_err(HttpError::from)
        }
        .map_err(|source| FeedError::Fetch {
            address: address.to_string(),
            source,
        })?;
        parse_feed(&raw)
    }
}

pub(crate) fn parse_feed(raw: &[u8]) -> Result<Feed, FeedError> {
    match parse_rss(raw) {
        Ok(feed) => {
            debug!(entries = feed.entries.len(), "parsed feed as RSS");
            Ok(feed)
        }
        Err(rss_err) => match parse_atom(raw) {
            Ok(feed) => {
                debug!(entries = feed.entries.len(), "parsed feed as Atom");
                Ok(feed)
            }
            Err(atom_err) => Err(FeedError::Parse {
                rss: rss_err.to_string(),
                atom: atom_err.to_string(),
            }),
        },
    }
}

fn parse_rss(raw: &[u8]) -> Result<Feed, rss::Error> {
    let channel = rss::Channel::read_from(raw)?;
    let entries = channel
        .items()
        .iter()
        .map(|item| {
            let mut links = Vec::new();
            if let Some(link) = item.link() {
                links.push(Link {
                    rel: ALTERNATE_REL.to_string(),
                    href: link.to_string(),
                });
            }
            if let Some(enclosure) = item.enclosure() {
                links.push(Link {
                    rel: ENCLOSURE_REL.to_string(),
                    href: enclosure.url().to_string(),
                });
            }

            let published = item.pub_date().unwrap_or_default().trim().to_string();
            let published_at = parse_rfc2822(&published);

            FeedEntry {
                title: item.title().unwrap_or_default().to_string(),
                published,
                published_at,
                links,
            }
        })
        .collect();

    Ok(Feed {
        title: non_empty(channel.title()),
        entries,
    })
}

/// RFC 2822, tolerating a day-of-week that does not match the date.
fn parse_rfc2822(published: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(published)
        .ok()
        .or_else(|| DateTime::parse_from_rfc2822(strip_weekday_word(published)?).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_atom(raw: &[u8]) -> Result<Feed, atom_syndication::Error> {
    let feed = atom_syndication::Feed::read_from(raw)?;
    let entries = feed
        .entries()
        .iter()
        .map(|entry| {
            let published = entry
                .published()
                .unwrap_or_else(|| entry.updated())
                .to_rfc3339_opts(SecondsFormat::AutoSi, true);
            let published_at = DateTime::parse_from_rfc3339(&published)
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
            let links = entry
                .links()
                .iter()
                .map(|link| Link {
                    rel: link.rel().to_string(),
                    href: link.href().to_string(),
                })
                .collect();

            FeedEntry {
                title: entry.title().as_str().to_string(),
                published,
                published_at,
                links,
            }
        })
        .collect();

    Ok(Feed {
        title: non_empty(feed.title().as_str()),
        entries,
    })
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Pure extraction helpers for YouTube search and watch pages
use super::{Candidate, Resolution, ResolveError, VideoDetails};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

pub const YOUTUBE_ORIGIN: &str = "https://www.youtube.com";

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\d.]+").unwrap());
static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.\d+)?S)?)?$").unwrap()
});

static RESULT_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ytd-video-renderer a#video-title").unwrap());
static INFO_SPAN: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#info span").unwrap());
static META_VIEWS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[itemprop="interactionCount"]"#).unwrap());
static PLAYER_DURATION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".ytp-time-duration").unwrap());
static META_DURATION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[itemprop="duration"]"#).unwrap());

/// Parse a rendered view counter such as `1.2M views`, `3.4万 次观看` or `1,234`.
///
/// Unreadable input yields 0.
pub fn parse_view_count(text: &str) -> u64 {
    let lowered = text.trim().to_lowercase();
    let cleaned = lowered
        .replace(',', "")
        .replace("次观看", "")
        .replace("views", "");
    let s = cleaned.trim();
    if s.is_empty() {
        return 0;
    }

    if s.contains('亿') || s.contains("萬億") {
        return scaled(s, 100_000_000.0);
    }
    if s.contains('万') || s.contains('萬') {
        return scaled(s, 10_000.0);
    }
    if s.contains('k') {
        return scaled(s, 1_000.0);
    }
    if s.contains('m') {
        return scaled(s, 1_000_000.0);
    }
    if s.contains('b') {
        return scaled(s, 1_000_000_000.0);
    }

    DIGITS
        .find(s)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn scaled(s: &str, factor: f64) -> u64 {
    NUMBER
        .find(s)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|n| (n * factor).round() as u64)
        .unwrap_or(0)
}

/// Parse a player duration (`12:34`, `1:23:45`, `3分钟`, `90`) into whole minutes.
///
/// Seconds are dropped, unreadable input yields 0.
pub fn parse_duration_to_minutes(text: &str) -> u64 {
    let s: String = text
        .trim()
        .replace('：', ":")
        .chars()
        .filter(|c| *c != ' ')
        .collect();
    if s.is_empty() {
        return 0;
    }

    let digits: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ':')
        .collect();
    if digits.is_empty() {
        return 0;
    }

    if digits.contains(':') {
        let parts: Vec<&str> = digits.split(':').collect();
        let field = |p: &str| -> Option<u64> {
            if p.is_empty() {
                Some(0)
            } else {
                p.parse().ok()
            }
        };
        match parts.len() {
            3 => {
                return match (field(parts[0]), field(parts[1])) {
                    (Some(hours), Some(minutes)) => hours
                        .checked_mul(60)
                        .and_then(|m| m.checked_add(minutes))
                        .unwrap_or(0),
                    _ => 0,
                }
            }
            2 => return field(parts[0]).unwrap_or(0),
            _ => {}
        }
    }

    DIGITS
        .find(&digits)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Parse an ISO-8601 duration such as `PT1H2M3S` into whole minutes
pub fn parse_iso8601_minutes(text: &str) -> Option<u64> {
    let caps = ISO_DURATION.captures(text.trim())?;
    let part = |i: usize| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    let minutes = part(1)
        .checked_mul(24 * 60)
        .and_then(|m| m.checked_add(part(2).checked_mul(60)?))
        .and_then(|m| m.checked_add(part(3)))
        .unwrap_or(0);
    Some(minutes)
}

/// Canonical watch URL (`https://www.youtube.com/watch?v=<id>`) for an href found on a page.
///
/// Tracking parameters are dropped so the same video always maps to the same identity.
pub fn canonical_watch_url(href: &str) -> Option<String> {
    let base = Url::parse(YOUTUBE_ORIGIN).ok()?;
    let url = base.join(href.trim()).ok()?;

    let host = url.host_str()?;
    if !(host == "youtube.com" || host.ends_with(".youtube.com")) || url.path() != "/watch" {
        return None;
    }

    let video_id = url
        .query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())?;

    Some(format!("{}/watch?v={}", YOUTUBE_ORIGIN, video_id))
}

/// Extract search results from rendered search page HTML.
///
/// Entries without a title or without a watch link are skipped.
pub fn extract_candidates(html: &str) -> Vec<Candidate> {
    let document = Html::parse_document(html);

    document
        .select(&RESULT_TITLE)
        .filter_map(|anchor| {
            let title = anchor
                .value()
                .attr("title")
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| anchor.text().collect::<String>().trim().to_string());
            if title.is_empty() {
                return None;
            }

            let url = canonical_watch_url(anchor.value().attr("href")?)?;
            Some(Candidate { title, url })
        })
        .collect()
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .find(|text| !text.is_empty())
}

fn first_meta(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
}

/// Read view count and duration from rendered watch page HTML.
///
/// Player widgets are preferred, the structured-data meta tags are the fallback.
pub fn parse_watch_page(html: &str) -> Resolution {
    let document = Html::parse_document(html);

    let views = first_text(&document, &INFO_SPAN)
        .map(|text| parse_view_count(&text))
        .or_else(|| {
            first_meta(&document, &META_VIEWS).and_then(|c| {
                DIGITS.find(&c.replace(',', "")).and_then(|m| m.as_str().parse().ok())
            })
        });

    let minutes = first_text(&document, &PLAYER_DURATION)
        .map(|text| parse_duration_to_minutes(&text))
        .or_else(|| first_meta(&document, &META_DURATION).and_then(|c| parse_iso8601_minutes(&c)));

    let details = VideoDetails {
        popularity_score: views.unwrap_or(0),
        duration_minutes: minutes.unwrap_or(0),
    };

    match (views, minutes) {
        (Some(_), Some(_)) => Resolution::resolved(details),
        (None, _) => Resolution::partial(details, ResolveError::MissingField("view_count")),
        (_, None) => Resolution::partial(details, ResolveError::MissingField("duration")),
    }
}

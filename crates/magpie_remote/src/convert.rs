//! Wire-to-domain normalization.

use crate::wire::{SearchHit, ViewData};
use chrono::{DateTime, Utc};
use magpie_core::{
    BasicInfo, Candidate, CrawlInfo, ItemId, MetadataRecord, OwnerInfo, PageInfo, StatsInfo,
};

/// Clamp a wire counter to a non-negative integer.
pub fn clamp(value: i64) -> u64 {
    value.max(0) as u64
}

/// Epoch seconds to a UTC timestamp; out-of-range values collapse to epoch.
pub fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs.max(0), 0).unwrap_or_default()
}

/// Parse a clock-string duration (`"SS"`, `"MM:SS"`, or `"HH:MM:SS"`) into
/// whole seconds. Unparseable input yields 0.
pub fn parse_clock_duration(raw: &str) -> u64 {
    let mut total: u64 = 0;
    for part in raw.split(':') {
        let Ok(value) = part.trim().parse::<u64>() else {
            return 0;
        };
        total = total * 60 + value;
    }
    total
}

/// Strip the `<em>` highlight markup and unescape the entities the search
/// surface injects into titles.
pub fn clean_title(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => rest = &rest[open + close + 1..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .trim()
        .to_string()
}

/// Map one search row into a candidate, or `None` when the row has no
/// usable identifier.
pub fn candidate_from_hit(hit: &SearchHit, keyword: &str) -> Option<Candidate> {
    let item_id = ItemId::new(hit.bvid.trim()).ok()?;
    Some(Candidate {
        item_id,
        title: clean_title(&hit.title),
        duration_seconds: parse_clock_duration(&hit.duration),
        publish_time: timestamp(hit.pubdate),
        uploader_id: clamp(hit.mid).to_string(),
        uploader_name: hit.author.trim().to_string(),
        play_count: clamp(hit.play),
        like_count: clamp(hit.like),
        coin_count: None,
        favorite_count: None,
        keyword: keyword.to_string(),
    })
}

/// Compose a normalized metadata record from the detail payload and its
/// tag names. Counters are clamped and strings trimmed here; required-field
/// validation is the collector's job.
pub fn record_from_view(view: &ViewData, tags: Vec<String>) -> Option<MetadataRecord> {
    let item_id = ItemId::new(view.bvid.trim()).ok()?;
    Some(MetadataRecord {
        basic_info: BasicInfo {
            item_id,
            title: view.title.trim().to_string(),
            description: view.desc.trim().to_string(),
            duration_seconds: clamp(view.duration),
            publish_time: timestamp(view.pubdate),
            cover_url: view.pic.trim().to_string(),
        },
        stats: StatsInfo {
            play_count: clamp(view.stat.view),
            like_count: clamp(view.stat.like),
            coin_count: clamp(view.stat.coin),
            favorite_count: clamp(view.stat.favorite),
            share_count: clamp(view.stat.share),
            comment_count: clamp(view.stat.reply),
        },
        owner: OwnerInfo {
            uploader_id: clamp(view.owner.mid).to_string(),
            uploader_name: view.owner.name.trim().to_string(),
            avatar_url: view.owner.face.trim().to_string(),
        },
        pages: view
            .pages
            .iter()
            .map(|p| PageInfo {
                internal_id: p.cid,
                page_number: p.page,
                title: p.part.trim().to_string(),
                duration_seconds: clamp(p.duration),
            })
            .collect(),
        tags,
        crawl_info: CrawlInfo::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_clock_durations() {
        assert_eq!(parse_clock_duration("45"), 45);
        assert_eq!(parse_clock_duration("12:34"), 754);
        assert_eq!(parse_clock_duration("1:02:03"), 3723);
        assert_eq!(parse_clock_duration("oops"), 0);
        assert_eq!(parse_clock_duration(""), 0);
    }

    #[test]
    fn test_cleans_highlighted_titles() {
        assert_eq!(
            clean_title("<em class=\"keyword\">rust</em> tutorial &amp; demo"),
            "rust tutorial & demo"
        );
        assert_eq!(clean_title("plain title"), "plain title");
        assert_eq!(clean_title("broken <em"), "broken");
    }

    #[test]
    fn test_clamps_negative_counters() {
        assert_eq!(clamp(-3), 0);
        assert_eq!(clamp(17), 17);
    }

    #[test]
    fn test_hit_without_id_is_dropped() {
        let hit = SearchHit {
            bvid: String::new(),
            title: "t".to_string(),
            duration: "1:00".to_string(),
            pubdate: 0,
            mid: 1,
            author: "a".to_string(),
            play: 1,
            like: 1,
        };
        assert!(candidate_from_hit(&hit, "kw").is_none());
    }
}

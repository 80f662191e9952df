//! Candidate filtering.

use magpie_core::{Candidate, SearchConfig};

/// Whether a candidate survives the configured filters.
///
/// Duration bounds are a closed interval; pubdate bounds are open-ended
/// when unset; title filters are case-insensitive substring matches.
pub fn passes_filters(config: &SearchConfig, candidate: &Candidate) -> bool {
    if candidate.duration_seconds < config.min_duration {
        return false;
    }
    if let Some(max) = config.max_duration_bound() {
        if candidate.duration_seconds > max {
            return false;
        }
    }
    if candidate.play_count < config.min_view_count {
        return false;
    }
    if let Some(min) = config.min_pubdate {
        if candidate.publish_time < min {
            return false;
        }
    }
    if let Some(max) = config.max_pubdate {
        if candidate.publish_time > max {
            return false;
        }
    }

    let title = candidate.title.to_lowercase();
    if !config.keyword_filters.is_empty()
        && !config
            .keyword_filters
            .iter()
            .any(|needle| title.contains(&needle.to_lowercase()))
    {
        return false;
    }
    if config
        .keyword_excludes
        .iter()
        .any(|needle| title.contains(&needle.to_lowercase()))
    {
        return false;
    }

    if config.quality_threshold > 0.0 && quality_score(config, candidate) < config.quality_threshold
    {
        return false;
    }
    true
}

/// Weighted engagement score normalized by play count.
///
/// Counters the search surface does not report contribute zero.
pub fn quality_score(config: &SearchConfig, candidate: &Candidate) -> f64 {
    if candidate.play_count == 0 {
        return 0.0;
    }
    let weights = &config.quality_weights;
    let weighted = weights.like * candidate.like_count as f64
        + weights.coin * candidate.coin_count.unwrap_or(0) as f64
        + weights.favorite * candidate.favorite_count.unwrap_or(0) as f64;
    weighted / candidate.play_count as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use magpie_core::{ItemId, QualityWeights};

    fn config() -> SearchConfig {
        SearchConfig {
            page_size: 20,
            max_pages: 5,
            page_interval: [0.0, 0.0],
            min_view_count: 0,
            min_pubdate: None,
            max_pubdate: None,
            keyword_filters: Vec::new(),
            keyword_excludes: Vec::new(),
            min_duration: 0,
            max_duration: 0,
            quality_threshold: 0.0,
            quality_weights: QualityWeights {
                like: 1.0,
                coin: 2.0,
                favorite: 3.0,
            },
        }
    }

    fn candidate(duration: u64, play: u64, title: &str) -> Candidate {
        Candidate {
            item_id: ItemId::new("BV1a").unwrap(),
            title: title.to_string(),
            duration_seconds: duration,
            publish_time: Utc::now(),
            uploader_id: "1".to_string(),
            uploader_name: "u".to_string(),
            play_count: play,
            like_count: 10,
            coin_count: None,
            favorite_count: None,
            keyword: "kw".to_string(),
        }
    }

    #[test]
    fn test_duration_bounds_are_closed() {
        let mut cfg = config();
        cfg.min_duration = 10;
        cfg.max_duration = 60;
        assert!(passes_filters(&cfg, &candidate(10, 1, "t")));
        assert!(passes_filters(&cfg, &candidate(60, 1, "t")));
        assert!(!passes_filters(&cfg, &candidate(9, 1, "t")));
        assert!(!passes_filters(&cfg, &candidate(61, 1, "t")));
    }

    #[test]
    fn test_zero_max_duration_is_open_ended() {
        let cfg = config();
        assert!(passes_filters(&cfg, &candidate(86_400, 1, "t")));
    }

    #[test]
    fn test_view_count_floor() {
        let mut cfg = config();
        cfg.min_view_count = 100;
        assert!(!passes_filters(&cfg, &candidate(30, 99, "t")));
        assert!(passes_filters(&cfg, &candidate(30, 100, "t")));
    }

    #[test]
    fn test_title_filters_are_case_insensitive() {
        let mut cfg = config();
        cfg.keyword_filters = vec!["Rust".to_string()];
        cfg.keyword_excludes = vec!["SPAM".to_string()];
        assert!(passes_filters(&cfg, &candidate(30, 1, "learn rust fast")));
        assert!(!passes_filters(&cfg, &candidate(30, 1, "unrelated title")));
        assert!(!passes_filters(&cfg, &candidate(30, 1, "rust spam offer")));
    }

    #[test]
    fn test_quality_threshold_drops_low_scores() {
        let mut cfg = config();
        cfg.quality_threshold = 0.5;
        // like=10, play=100 -> score 0.1
        assert!(!passes_filters(&cfg, &candidate(30, 100, "t")));
        // like=10, play=10 -> score 1.0
        assert!(passes_filters(&cfg, &candidate(30, 10, "t")));
    }

    #[test]
    fn test_quality_score_handles_zero_plays() {
        let cfg = config();
        assert_eq!(quality_score(&cfg, &candidate(30, 0, "t")), 0.0);
    }
}

/// Small helpers shared by the enricher, the providers and the scheduler

/// URL utilities for provider payloads
pub mod url {
    use url::Url;

    /// An absolute http(s) URL with a host
    pub fn is_http_url(url_str: &str) -> bool {
        match Url::parse(url_str.trim()) {
            Ok(url) => matches!(url.scheme(), "http" | "https") && url.host().is_some(),
            Err(_) => false,
        }
    }
}

/// Time utilities for scheduling and expiry
pub mod time {
    use chrono::Duration;

    /// Format duration in human-readable form
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.num_seconds();

        if total_seconds < 60 {
            format!("{}s", total_seconds)
        } else if total_seconds < 3600 {
            format!("{}m", total_seconds / 60)
        } else if total_seconds < 86400 {
            format!("{}h", total_seconds / 3600)
        } else {
            format!("{}d", total_seconds / 86400)
        }
    }

    /// Convert a std duration for logging and arithmetic against chrono timestamps
    pub fn from_std(duration: std::time::Duration) -> Duration {
        Duration::from_std(duration).unwrap_or_else(|_| Duration::days(365))
    }
}

/// Text utilities for the keyword heuristics
pub mod text {
    /// Lower-cased "title description" the keyword tables are matched against
    pub fn searchable_text(title: &str, description: &str) -> String {
        format!("{} {}", title, description).to_lowercase()
    }

    /// How many of `keywords` occur in `text`; each keyword counts once
    pub fn count_matches<S: AsRef<str>>(text: &str, keywords: &[S]) -> usize {
        keywords.iter().filter(|k| text.contains(k.as_ref())).count()
    }

    pub fn contains_any<S: AsRef<str>>(text: &str, keywords: &[S]) -> bool {
        keywords.iter().any(|k| text.contains(k.as_ref()))
    }

    /// Estimate reading time based on content length
    pub fn estimate_reading_time_minutes(content: &str, words_per_minute: u32) -> u32 {
        let word_count = content.split_whitespace().count();
        let wpm = words_per_minute.max(1) as f64;
        ((word_count as f64 / wpm).ceil() as u32).max(1)
    }
}

//! Small formatting helpers for terminal output: sizes, relative times, bars.

use chrono::{DateTime, Utc};

pub fn human(b: u64) -> String {
    const K: f64 = 1024.0;
    let b = b as f64;
    if b < K { return format!("{b:.0}B"); }
    let kb = b / K;
    if kb < K { return format!("{kb:.1}KB"); }
    let mb = kb / K;
    if mb < K { return format!("{mb:.1}MB"); }
    let gb = mb / K;
    if gb < K { return format!("{gb:.1}GB"); }
    let tb = gb / K;
    format!("{tb:.2}TB")
}

/// "just now", "5m ago", "3h ago", "2d ago". Future timestamps (clock skew) read as "just now".
pub fn relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - ts).num_seconds();
    if secs < 60 {
        "just now".into()
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}

/// Fixed-width text gauge for 0..=100, e.g. `[#####-----]`.
pub fn bar(pct: f64, width: usize) -> String {
    let filled = ((pct.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

pub fn truncate_middle(s: &str, max: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max { return s.to_string(); }
    if max <= 3 { return "...".into(); }
    let keep = max - 3;
    let left = keep / 2;
    let right = keep - left;
    let head: String = chars[..left].iter().collect();
    let tail: String = chars[chars.len() - right..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn human_sizes() {
        assert_eq!(human(512), "512B");
        assert_eq!(human(2048), "2.0KB");
        assert_eq!(human(4_096_000_000), "3.8GB");
    }

    #[test]
    fn relative_times() {
        let now = Utc::now();
        assert_eq!(relative_time(now, now), "just now");
        assert_eq!(relative_time(now + Duration::minutes(3), now), "just now");
        assert_eq!(relative_time(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(relative_time(now - Duration::hours(3), now), "3h ago");
        assert_eq!(relative_time(now - Duration::days(2), now), "2d ago");
    }

    #[test]
    fn bars_clamp() {
        assert_eq!(bar(50.0, 10), "[#####-----]");
        assert_eq!(bar(250.0, 4), "[####]");
        assert_eq!(bar(-3.0, 4), "[----]");
    }

    #[test]
    fn truncation_is_char_safe() {
        assert_eq!(truncate_middle("short", 10), "short");
        assert_eq!(truncate_middle("nginx-reverse-proxy.service", 11), "ngin...vice");
        assert_eq!(truncate_middle("ääääääääää", 5), "ä...ä");
    }
}

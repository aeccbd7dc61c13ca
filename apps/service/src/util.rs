use chrono::{DateTime, SecondsFormat, Utc};

/// Escape the characters the chat HTML parser treats as markup
pub fn html_escape(input: &str) -> String {
    input.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// RFC 3339 UTC timestamp with second precision
pub fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Like `rfc3339`, with `-` for a time that never happened
pub fn format_time(ts: Option<DateTime<Utc>>) -> String {
    ts.map(rfc3339).unwrap_or_else(|| "-".to_string())
}

/// Split `text` into chunks of at most `max_len` bytes, breaking on line
/// boundaries where possible.
///
/// Lines longer than `max_len` are cut on char boundaries.
pub fn split_by_line_limit(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(4);
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.split_inclusive('\n') {
        if !current.is_empty() && current.len() + line.len() > max_len {
            chunks.push(std::mem::take(&mut current));
        }

        if line.len() <= max_len {
            current.push_str(line);
            continue;
        }

        let mut rest = line;
        while rest.len() > max_len {
            let mut cut = max_len;
            while !rest.is_char_boundary(cut) {
                cut -= 1;
            }
            chunks.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
        current.push_str(rest);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .map(|chunk| chunk.trim_end_matches('\n').to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a<b>&c"), "a&lt;b&gt;&amp;c");
        assert_eq!(html_escape("plain"), "plain");
    }

    #[test]
    fn test_rfc3339_uses_z_suffix() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(rfc3339(ts), "2024-03-09T07:05:01Z");
        assert_eq!(format_time(None), "-");
    }

    #[test]
    fn test_split_short_text_is_untouched() {
        assert_eq!(split_by_line_limit("one\ntwo", 100), vec!["one\ntwo".to_string()]);
    }

    #[test]
    fn test_split_on_line_boundaries() {
        let text = "aaaa\nbbbb\ncccc";
        let chunks = split_by_line_limit(text, 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb".to_string(), "cccc".to_string()]);
    }

    #[test]
    fn test_split_long_line_on_char_boundary() {
        let text = "ééééé"; // 10 bytes
        let chunks = split_by_line_limit(text, 5);
        assert!(chunks.iter().all(|c| c.len() <= 5));
        assert_eq!(chunks.concat(), text);
    }
}

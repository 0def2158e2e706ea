use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, Utc};
use regex::Regex;

/// Title used when a candidate title cleans down to nothing
pub const FALLBACK_TITLE: &str = "Daily Security News Summary";

/// Slug used when a title has no ASCII alphanumerics
pub const FALLBACK_SLUG: &str = "slides";

/// Default maximum slug length
pub const DEFAULT_SLUG_LEN: usize = 80;

/// Japan Standard Time offset; briefings are dated in JST
const JST_OFFSET_HOURS: i64 = 9;

/// Trim each line, drop empty ones and strip leading bullet markers.
pub fn strip_bullets<'a, I>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.trim_start_matches(['・', '-', '•', '*', ' ', '\t'])
                .to_string()
        })
        .collect()
}

/// Lowercase, hyphen-separated ASCII slug capped at `max_len` characters.
pub fn slugify(text: &str, max_len: usize) -> String {
    static NON_ALNUM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

    let lower = text.to_lowercase();
    let hyphenated = NON_ALNUM_RE.replace_all(&lower, "-");
    let slug: String = hyphenated.trim_matches('-').chars().take(max_len).collect();

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Pull a JSON object out of free-form model output.
///
/// An optional ```` ```json ```` fence is stripped first. When the text ends
/// with `}` and the span from the first `{` to the end parses, that span is
/// returned; otherwise the first brace-balanced object (string-aware) is
/// returned.
pub fn find_json(text: &str) -> Option<String> {
    static OPEN_FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^```(?:json)?\s*").expect("valid regex"));
    static CLOSE_FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s*```$").expect("valid regex"));
    static ANCHORED_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)\{.*\}\s*$").expect("valid regex"));

    let text = text.trim();
    let text = OPEN_FENCE_RE.replace(text, "");
    let text = CLOSE_FENCE_RE.replace(&text, "");

    if let Some(m) = ANCHORED_RE.find(&text) {
        let candidate = m.as_str().trim_end();
        if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
            return Some(candidate.to_string());
        }
    }

    balanced_object(&text).map(str::to_string)
}

/// First `{ ... }` span whose braces balance, ignoring braces inside strings.
fn balanced_object(text: &str) -> Option<&str> {
    text.match_indices('{')
        .find_map(|(start, _)| balanced_end(&text[start..]).map(|end| &text[start..start + end]))
}

/// Byte length of the balanced object at the start of `text`
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

/// First line of a model-suggested title with quotes, colons and
/// "suggested title" prefixes removed.
pub fn clean_title(raw: &str) -> String {
    const TRIM_CHARS: [char; 10] = ['「', '」', '『', '』', '"', '\'', ' ', '\u{3000}', ':', '：'];
    static PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^(以下のようなタイトル.*|title:?|suggested:?|案:?)[\s：:]*")
            .expect("valid regex")
    });

    let Some(first) = raw.trim().lines().next() else {
        return FALLBACK_TITLE.to_string();
    };

    let text = first.trim_matches(TRIM_CHARS);
    let text = PREFIX_RE.replace(text, "");

    if text.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        text.into_owned()
    }
}

/// Today's date in Japan Standard Time
pub fn today_jst() -> NaiveDate {
    (Utc::now() + Duration::hours(JST_OFFSET_HOURS)).date_naive()
}

/// Today's JST date as `YYYY-MM-DD`
pub fn today_iso() -> String {
    today_jst().format("%Y-%m-%d").to_string()
}

/// Deck title for a briefing dated `date`
pub fn briefing_title(date: &str) -> String {
    format!("{}_Daily_Security_Briefing", date)
}

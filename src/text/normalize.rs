//! Slide-document normalization.
//!
//! Each transform is a whole-string `&str -> String` function. Generated
//! slide bodies go through [`normalize_slides`], which applies them in a fixed
//! order: separators must exist before they are deduplicated, and the header
//! is inserted after separator cleanup because it replaces a leading `---`
//! block.

use std::sync::LazyLock;

use regex::Regex;

use super::clean_title;

/// Slide boundary line
pub const SEPARATOR: &str = "---";

/// Front-matter options for the rendered deck
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarpHeader {
    pub paginate: bool,
    pub theme: String,
}

impl Default for MarpHeader {
    fn default() -> Self {
        Self {
            paginate: true,
            theme: "default".to_string(),
        }
    }
}

impl MarpHeader {
    /// Render the front-matter block, including the blank line that follows it
    pub fn render(&self, title: &str) -> String {
        format!(
            "---\nmarp: true\npaginate: {}\ntheme: {}\ntitle: {}\n---\n\n",
            self.paginate, self.theme, title
        )
    }
}

/// Run the full normalization chain on raw model output.
pub fn normalize_slides(raw: &str, title: &str, header: &MarpHeader) -> String {
    let mut md = strip_whole_code_fence(raw);
    md = insert_separators(&md);
    md = dedupe_separators(&md);
    md = ensure_marp_header(&md, &clean_title(title), header);
    remove_presenter_lines(&md)
}

// ---------------------------------------------------------------------------
// Step 1: Unwrap a fence around the whole document
// ---------------------------------------------------------------------------

/// Remove one opening fence (with optional info string) and one closing
/// fence when the text starts with a fence. A missing closer is tolerated.
pub fn strip_whole_code_fence(md: &str) -> String {
    static OPEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^```[a-zA-Z0-9_-]*\s*\n?").expect("valid regex"));
    static CLOSE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n?```$").expect("valid regex"));

    let text = md.trim();
    if !text.starts_with("```") {
        return text.to_string();
    }

    let without_open = OPEN_RE.replace(text, "");
    CLOSE_RE.replace(without_open.trim(), "").into_owned()
}

// ---------------------------------------------------------------------------
// Step 2: Separator before every H2
// ---------------------------------------------------------------------------

/// Insert a `---` line before each `## ` heading not already preceded by one.
///
/// Fences opened with ```` ``` ```` or `~~~` are tracked; a fence only closes
/// on a line starting with the same marker, and nothing inside is touched.
pub fn insert_separators(md: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut fence: Option<&str> = None;
    let mut prev = "";

    for line in md.lines() {
        if line.starts_with("```") || line.starts_with("~~~") {
            match fence {
                None => fence = Some(&line[..3]),
                Some(open) if line.starts_with(open) => fence = None,
                Some(_) => {}
            }
            out.push(line);
            prev = line;
            continue;
        }

        if fence.is_none() && line.starts_with("## ") && prev.trim() != SEPARATOR {
            out.push(SEPARATOR);
        }
        out.push(line);
        prev = line;
    }

    format!("{}\n", out.join("\n").trim())
}

// ---------------------------------------------------------------------------
// Step 3: Collapse repeated separators
// ---------------------------------------------------------------------------

/// Collapse runs of separators (blank lines between them included) into one,
/// and any leading run into a single `---` line.
pub fn dedupe_separators(md: &str) -> String {
    static RUN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?:\n*\s*---\s*\n+){2,}").expect("valid regex"));
    static LEADING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(?:\s*---\s*\n)+").expect("valid regex"));

    let collapsed = RUN_RE.replace_all(md, "\n---\n");
    LEADING_RE.replace(&collapsed, "---\n").into_owned()
}

// ---------------------------------------------------------------------------
// Step 4: Front matter
// ---------------------------------------------------------------------------

/// Replace the first leading `---`-delimited block (if any) with the deck's
/// front matter. Applying it twice with the same title is a no-op.
pub fn ensure_marp_header(md: &str, title: &str, header: &MarpHeader) -> String {
    static FRONT_MATTER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^---[\s\S]*?---\s*").expect("valid regex"));

    let body = FRONT_MATTER_RE.replace(md.trim(), "");

    let mut doc = header.render(title);
    doc.push_str(&body);
    if !body.ends_with('\n') {
        doc.push('\n');
    }
    doc
}

// ---------------------------------------------------------------------------
// Step 5: Presenter lines
// ---------------------------------------------------------------------------

/// Drop presenter/speaker label lines from the text before the first
/// `\n---\n` boundary, then squeeze blank-line runs there.
pub fn remove_presenter_lines(md: &str) -> String {
    match md.split_once("\n---\n") {
        Some((head, rest)) => format!("{}\n---\n{}", clean_head(head), rest),
        None => clean_head(md),
    }
}

fn clean_head(head: &str) -> String {
    static PRESENTER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^\s*(発表者|Presenter|Speaker)\s*[:：].*$").expect("valid regex")
    });
    static BLANK_RUN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let head = PRESENTER_RE.replace_all(head, "");
    BLANK_RUN_RE.replace_all(&head, "\n\n").trim().to_string()
}

/// Number of slide boundaries in a document
pub fn separator_count(md: &str) -> usize {
    md.lines().filter(|l| l.trim() == SEPARATOR).count()
}

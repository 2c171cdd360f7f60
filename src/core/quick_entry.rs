//! Natural-language task entry.
//!
//! `Buy milk #Errands @store tomorrow at 9:00` splits into content, a project
//! name, label names and a due phrase. Only the extraction happens here; the
//! due phrase itself is interpreted by the service.

use std::sync::LazyLock;

use regex::Regex;

/// Pieces extracted from one line of entry text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedEntry {
    pub content: String,
    pub project: Option<String>,
    pub labels: Vec<String>,
    pub due: Option<String>,
}

/// Swappable extraction strategy.
pub trait EntryParser: Send + Sync {
    fn parse(&self, text: &str) -> ParsedEntry;
}

static PROJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#(\w+)").expect("valid regex"));

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)@(\w+)").expect("valid regex"));

const TIME_SUFFIX: &str = r"(?:\s+at\s+\d{1,2}(?::\d{2})?\s?(?:[ap]m)?)?";

/// Tried in order; the first hit wins.
static DUE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bevery\s+(?:day|week|month|year|weekday|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
        r"\b(?:today|tomorrow|yesterday)\b",
        r"\b(?:next\s+|this\s+)?(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
        r"\b\d{1,2}[/-]\d{1,2}(?:[/-]\d{2,4})?\b",
        r"\b(?:next|this)\s+(?:week|month|year)\b",
        r"\bin\s+\d+\s+(?:day|week|month|year)s?\b",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}{TIME_SUFFIX}")).expect("valid regex"))
    .chain(std::iter::once(
        Regex::new(r"(?i)\bat\s+\d{1,2}:\d{2}\s?(?:[ap]m)?").expect("valid regex"),
    ))
    .collect()
});

/// Regex-based [`EntryParser`] understanding `#project`, `@label` and common
/// due phrases.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternParser;

impl EntryParser for PatternParser {
    fn parse(&self, text: &str) -> ParsedEntry {
        let project = PROJECT_RE
            .captures(text)
            .map(|caps| caps[1].to_string());
        let mut labels: Vec<String> = Vec::new();
        for caps in LABEL_RE.captures_iter(text) {
            let name = caps[1].to_string();
            if !labels.iter().any(|l| l.eq_ignore_ascii_case(&name)) {
                labels.push(name);
            }
        }

        let mut rest = PROJECT_RE.replace_all(text, " ").into_owned();
        rest = LABEL_RE.replace_all(&rest, " ").into_owned();

        let mut due = None;
        for re in DUE_RES.iter() {
            if let Some(found) = re.find(&rest) {
                due = Some(collapse(found.as_str()));
                rest.replace_range(found.range(), " ");
                break;
            }
        }

        ParsedEntry {
            content: collapse(&rest),
            project,
            labels,
            due,
        }
    }
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

use regex::Regex;

use crate::extract::record::{Field, ReportRecord};

/// One declarative extraction rule. A match yields the trimmed capture group
/// (with an optional constant prefix glued back on), a non-match yields the
/// fallback — `None` for null, `Some("")` for an empty string.
pub struct FieldRule {
    field: Field,
    regex: Regex,
    group: usize,
    prefix: Option<&'static str>,
    fallback: Option<&'static str>,
}

impl FieldRule {
    /// Patterns are static per layout, so a bad one is a programming error.
    pub fn new(field: Field, pattern: &str, fallback: Option<&'static str>) -> Self {
        Self {
            field,
            regex: Regex::new(pattern).unwrap(),
            group: 1,
            prefix: None,
            fallback,
        }
    }

    pub fn group(mut self, group: usize) -> Self {
        self.group = group;
        self
    }

    /// Constant prefix re-attached to the capture, e.g. the `WO-` the
    /// work-order pattern strips while matching.
    pub fn prefix(mut self, prefix: &'static str) -> Self {
        self.prefix = Some(prefix);
        self
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn apply(&self, text: &str) -> Option<String> {
        match self.regex.captures(text).and_then(|caps| caps.get(self.group)) {
            Some(m) => {
                let captured = m.as_str().trim();
                Some(match self.prefix {
                    Some(prefix) => format!("{prefix}{captured}"),
                    None => captured.to_string(),
                })
            }
            None => self.fallback.map(str::to_string),
        }
    }
}

/// Run a layout's rule table over the full document text.
pub fn apply_rules(rules: &[FieldRule], text: &str, record: &mut ReportRecord) {
    for rule in rules {
        record.set(rule.field(), rule.apply(text));
    }
}

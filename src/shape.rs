//! Shape rules shared by the XML reader and writer.
//!
//! XML cannot tell a one-element sequence from a singular child, so the reader
//! needs to know up front which tags the course model treats as sequences.
//! The same table, together with the value coercions, drives the writer.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::tree::{Element, Node};

/// How a tag is recognised as a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceRule {
    /// The tag is a sequence wherever it appears.
    Tag(&'static str),
    /// The tag is a sequence when the dotted path ends with these segments,
    /// e.g. `Course.Lap`.
    PathSuffix(&'static str),
}

impl SequenceRule {
    fn matches(&self, tag: &str, path: &str) -> bool {
        match self {
            Self::Tag(name) => local_name(tag) == *name,
            Self::PathSuffix(suffix) => {
                path == *suffix
                    || path
                        .strip_suffix(suffix)
                        .is_some_and(|stem| stem.ends_with('.'))
            }
        }
    }
}

const TCX_SEQUENCES: &[SequenceRule] = &[
    SequenceRule::Tag("CourseNameRef"),
    SequenceRule::Tag("Course"),
    SequenceRule::Tag("Track"),
    SequenceRule::Tag("Trackpoint"),
    SequenceRule::Tag("CoursePoint"),
    SequenceRule::PathSuffix("Course.Lap"),
];

const TCX_TIME_TAGS: &[&str] = &["Time"];

/// Parse/serialize configuration for a generic XML reader and writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeRules {
    sequences: &'static [SequenceRule],
    time_tags: &'static [&'static str],
}

impl ShapeRules {
    pub const fn new(
        sequences: &'static [SequenceRule],
        time_tags: &'static [&'static str],
    ) -> Self {
        Self {
            sequences,
            time_tags,
        }
    }

    /// Rules for TCX course documents.
    pub const fn tcx() -> Self {
        Self::new(TCX_SEQUENCES, TCX_TIME_TAGS)
    }

    /// Whether `tag` at `path` must always be materialised as a list.
    /// `path` is the dotted path from the root and includes `tag` itself.
    pub fn is_sequence_tag(&self, tag: &str, path: &str) -> bool {
        self.sequences.iter().any(|rule| rule.matches(tag, path))
    }

    fn is_time_tag(&self, tag: &str) -> bool {
        let local = local_name(tag);
        self.time_tags.iter().any(|t| *t == local)
    }

    /// Coerce the text content of a leaf element read from XML.
    ///
    /// Time tags with a parseable timestamp become `Node::Time`. Anything else,
    /// unparseable timestamps included, is kept verbatim as text.
    pub fn coerce_parsed(&self, tag: &str, raw: String) -> Node {
        if self.is_time_tag(tag) {
            if let Some(time) = parse_time(&raw) {
                return Node::Time(time);
            }
        }
        Node::Text(raw)
    }

    /// Text to write for a leaf node, or `None` for elements and lists.
    pub fn coerce_serialized(&self, _tag: &str, node: &Node) -> Option<String> {
        match node {
            Node::Text(text) => Some(text.clone()),
            Node::Time(time) => Some(format_time(time)),
            Node::Element(_) | Node::List(_) => None,
        }
    }

    /// Places where `root` disagrees with the sequence table: lists under an
    /// undeclared tag, and bare nodes under a declared one.
    pub fn shape_mismatches(&self, root: &Element) -> Vec<String> {
        let mut found = Vec::new();
        self.collect_mismatches(root, "", &mut found);
        found
    }

    fn collect_mismatches(&self, element: &Element, path: &str, found: &mut Vec<String>) {
        for (name, node) in &element.children {
            let child_path = join_path(path, name);
            let declared = self.is_sequence_tag(name, &child_path);
            match node {
                Node::List(items) => {
                    if !declared {
                        found.push(format!("{child_path} is a list but not a declared sequence"));
                    }
                    for item in items {
                        if let Node::Element(inner) = item {
                            self.collect_mismatches(inner, &child_path, found);
                        }
                    }
                }
                other => {
                    if declared {
                        found.push(format!(
                            "{child_path} is a declared sequence but holds a bare {}",
                            other.kind()
                        ));
                    }
                    if let Node::Element(inner) = other {
                        self.collect_mismatches(inner, &child_path, found);
                    }
                }
            }
        }
    }
}

impl Default for ShapeRules {
    fn default() -> Self {
        Self::tcx()
    }
}

/// Extend a dotted path with one more tag.
pub fn join_path(parent: &str, tag: &str) -> String {
    if parent.is_empty() {
        tag.to_string()
    } else {
        format!("{parent}.{tag}")
    }
}

fn local_name(tag: &str) -> &str {
    tag.rsplit_once(':').map_or(tag, |(_, local)| local)
}

/// Parse an ISO-8601 timestamp. A value without an offset is taken as UTC.
pub fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|time| time.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|naive| naive.and_utc())
        })
        .ok()
}

/// Format a timestamp as ISO-8601 UTC with millisecond precision, eliding a
/// zero fraction. Finer precision is written in full.
pub fn format_time(time: &DateTime<Utc>) -> String {
    let precision = if time.timestamp_subsec_nanos() % 1_000_000 == 0 {
        SecondsFormat::Millis
    } else {
        SecondsFormat::AutoSi
    };
    let text = time.to_rfc3339_opts(precision, true);
    match text.strip_suffix(".000Z") {
        Some(stem) => format!("{stem}Z"),
        None => text,
    }
}

use chrono::{DateTime, Utc};

/// Key under which mixed text content is stored when an element also has
/// children or attributes.
pub const TEXT_KEY: &str = "#text";

/// One value of the untyped parse tree.
///
/// An element with neither children nor attributes collapses to its text, so
/// `<Name>Loop</Name>` is `Text("Loop")` and `<Courses/>` is `Text("")`.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Time(DateTime<Utc>),
    Element(Element),
    List(Vec<Node>),
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Time(_) => "timestamp",
            Self::Element(_) => "element",
            Self::List(_) => "list",
        }
    }
}

/// An element with its attributes and named children, in document order.
///
/// Each child name appears at most once; repeated elements are gathered into a
/// single `Node::List`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub attributes: Vec<(String, String)>,
    pub children: Vec<(String, Node)>,
}

impl Element {
    pub const fn new() -> Self {
        Self {
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.children
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, node)| node)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }

    /// Append a child, turning an existing same-named child into a list.
    pub fn push_child(&mut self, name: &str, node: Node) {
        match self.children.iter_mut().find(|(key, _)| key == name) {
            Some((_, Node::List(items))) => items.push(node),
            Some((_, existing)) => {
                let first = std::mem::replace(existing, Node::List(Vec::new()));
                *existing = Node::List(vec![first, node]);
            }
            None => self.children.push((name.to_string(), node)),
        }
    }

    /// Append a child that must stay a list even with a single occurrence.
    pub fn push_sequence_item(&mut self, name: &str, node: Node) {
        match self.children.iter_mut().find(|(key, _)| key == name) {
            Some((_, Node::List(items))) => items.push(node),
            Some((_, existing)) => {
                let first = std::mem::replace(existing, Node::List(Vec::new()));
                *existing = Node::List(vec![first, node]);
            }
            None => self
                .children
                .push((name.to_string(), Node::List(vec![node]))),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.push((name.to_string(), value.into()));
        self
    }

    pub fn with_child(mut self, name: &str, node: Node) -> Self {
        self.children.push((name.to_string(), node));
        self
    }

    /// Add `name` only when `node` is present.
    pub fn with_optional(self, name: &str, node: Option<Node>) -> Self {
        match node {
            Some(node) => self.with_child(name, node),
            None => self,
        }
    }

    /// Add `name` as a list, or skip it when there are no items.
    pub fn with_list(self, name: &str, items: Vec<Node>) -> Self {
        if items.is_empty() {
            self
        } else {
            self.with_child(name, Node::List(items))
        }
    }
}

use serde::Deserialize;

/// Options for writing a course document back to XML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOptions {
    /// Spaces per nesting level; 0 writes everything on one line (default: 2)
    #[serde(default = "default_indent")]
    pub indent: usize,

    /// Start the output with `<?xml version="1.0" encoding="UTF-8"?>` (default: true)
    #[serde(default = "default_true")]
    pub xml_declaration: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            xml_declaration: true,
        }
    }
}

impl WriteOptions {
    /// Single-line output without a declaration.
    pub fn compact() -> Self {
        Self {
            indent: 0,
            xml_declaration: false,
        }
    }
}

fn default_indent() -> usize {
    2
}

fn default_true() -> bool {
    true
}

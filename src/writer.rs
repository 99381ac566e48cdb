use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::Result;
use crate::options::WriteOptions;
use crate::shape::ShapeRules;
use crate::tree::{Element, Node, TEXT_KEY};

/// Write an element tree (as returned by [`crate::reader::parse_tree`] or
/// [`crate::serialize::to_tree`]) as XML text.
///
/// Lists are written as repeated elements, and leaf values go through
/// `ShapeRules::coerce_serialized`.
pub fn write_tree(document: &Element, rules: &ShapeRules, options: &WriteOptions) -> Result<String> {
    let mut writer = if options.indent > 0 {
        Writer::new_with_indent(Vec::new(), b' ', options.indent)
    } else {
        Writer::new(Vec::new())
    };

    if options.xml_declaration {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    }
    for (name, node) in &document.children {
        write_node(&mut writer, rules, name, node)?;
    }

    let xml = String::from_utf8(writer.into_inner())?;
    tracing::debug!(bytes = xml.len(), "wrote XML");
    Ok(xml)
}

fn write_node(
    writer: &mut Writer<Vec<u8>>,
    rules: &ShapeRules,
    name: &str,
    node: &Node,
) -> Result<()> {
    match node {
        Node::List(items) => {
            for item in items {
                write_node(writer, rules, name, item)?;
            }
        }
        Node::Element(el) => {
            let mut start = BytesStart::new(name);
            for (key, value) in &el.attributes {
                start.push_attribute((key.as_str(), value.as_str()));
            }
            if el.children.is_empty() {
                writer.write_event(Event::Empty(start))?;
                return Ok(());
            }

            writer.write_event(Event::Start(start))?;
            for (child_name, child) in &el.children {
                if child_name == TEXT_KEY {
                    if let Some(text) = rules.coerce_serialized(name, child) {
                        writer.write_event(Event::Text(BytesText::new(&text)))?;
                    }
                } else {
                    write_node(writer, rules, child_name, child)?;
                }
            }
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        leaf => {
            let text = rules.coerce_serialized(name, leaf).unwrap_or_default();
            if text.is_empty() {
                writer.write_event(Event::Empty(BytesStart::new(name)))?;
            } else {
                writer.write_event(Event::Start(BytesStart::new(name)))?;
                writer.write_event(Event::Text(BytesText::new(&text)))?;
                writer.write_event(Event::End(BytesEnd::new(name)))?;
            }
        }
    }
    Ok(())
}

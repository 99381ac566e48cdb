use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Result, TcxError};
use crate::shape::{ShapeRules, join_path};
use crate::tree::{Element, Node, TEXT_KEY};

/// An element whose end tag has not been read yet.
struct OpenElement {
    name: String,
    path: String,
    element: Element,
    text: String,
}

/// Parse XML text into an untyped tree.
///
/// The returned element stands for the document itself; its children are the
/// top-level elements (`TrainingCenterDatabase` for a TCX file). Sequence tags
/// named by `rules` always become lists, and leaf text goes through
/// `ShapeRules::coerce_parsed`.
pub fn parse_tree(xml: &str, rules: &ShapeRules) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    let mut document = Element::new();
    let mut stack: Vec<OpenElement> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let open = open_element(&e, stack.last())?;
                stack.push(open);
            }
            Ok(Event::Empty(e)) => {
                let open = open_element(&e, stack.last())?;
                close_element(open, rules, &mut stack, &mut document);
            }
            Ok(Event::End(_)) => {
                if let Some(open) = stack.pop() {
                    close_element(open, rules, &mut stack, &mut document);
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if let Some(open) = stack.last_mut() {
                    // Character references (&#60; &#x3C;) first, then the
                    // predefined entities. Anything else is kept verbatim.
                    if let Ok(Some(ch)) = e.resolve_char_ref() {
                        open.text.push(ch);
                    } else {
                        let name = String::from_utf8_lossy(e.as_ref());
                        match name.as_ref() {
                            "amp" => open.text.push('&'),
                            "lt" => open.text.push('<'),
                            "gt" => open.text.push('>'),
                            "quot" => open.text.push('"'),
                            "apos" => open.text.push('\''),
                            other => {
                                open.text.push('&');
                                open.text.push_str(other);
                                open.text.push(';');
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(TcxError::MalformedXml(e)),
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(TcxError::UnclosedElement(open.name));
    }

    tracing::debug!(
        top_level = document.children.len(),
        "parsed XML into element tree"
    );
    Ok(document)
}

fn open_element(start: &BytesStart<'_>, parent: Option<&OpenElement>) -> Result<OpenElement> {
    // Elements are keyed by local name so `<tcx:Course>` and `<Course>` read
    // the same. Attribute keys stay qualified (`xsi:type`, `xmlns:ns3`).
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let path = join_path(parent.map_or("", |p| p.path.as_str()), &name);

    let mut element = Element::new();
    for attr_result in start.attributes() {
        let attr = attr_result.map_err(|e| TcxError::MalformedXml(e.into()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value);
        let value = quick_xml::escape::unescape(&raw)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        element.attributes.push((key, value));
    }

    Ok(OpenElement {
        name,
        path,
        element,
        text: String::new(),
    })
}

/// Turn a finished element into a node and attach it to its parent.
fn close_element(
    open: OpenElement,
    rules: &ShapeRules,
    stack: &mut [OpenElement],
    document: &mut Element,
) {
    let OpenElement {
        name,
        path,
        mut element,
        text,
    } = open;

    // Leaf text is a field value and is kept verbatim. Text inside an element
    // with children or attributes is trimmed.
    let node = if element.is_empty() {
        rules.coerce_parsed(&name, text)
    } else {
        let text = text.trim();
        if !text.is_empty() {
            element
                .children
                .push((TEXT_KEY.to_string(), Node::text(text)));
        }
        Node::Element(element)
    };

    let parent = match stack.last_mut() {
        Some(open_parent) => &mut open_parent.element,
        None => document,
    };
    if rules.is_sequence_tag(&name, &path) {
        parent.push_sequence_item(&name, node);
    } else {
        parent.push_child(&name, node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn parse(xml: &str) -> Element {
        parse_tree(xml, &ShapeRules::tcx()).unwrap()
    }

    fn child<'a>(el: &'a Element, name: &str) -> &'a Node {
        el.get(name).unwrap_or_else(|| panic!("missing <{name}>"))
    }

    fn element<'a>(node: &'a Node) -> &'a Element {
        match node {
            Node::Element(el) => el,
            other => panic!("expected element, got {other:?}"),
        }
    }

    fn list(node: &Node) -> &[Node] {
        match node {
            Node::List(items) => items,
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn test_single_course_is_a_list() {
        let xml = r#"<?xml version="1.0"?>
<TrainingCenterDatabase>
  <Courses>
    <Course><Name>Loop</Name></Course>
  </Courses>
</TrainingCenterDatabase>"#;
        let doc = parse(xml);
        let root = element(child(&doc, "TrainingCenterDatabase"));
        let courses = element(child(root, "Courses"));
        let course = list(child(courses, "Course"));
        assert_eq!(course.len(), 1);
        assert_eq!(child(element(&course[0]), "Name"), &Node::text("Loop"));
    }

    #[test]
    fn test_single_trackpoint_and_lap_are_lists() {
        let xml = r#"<TrainingCenterDatabase><Courses><Course>
  <Name>One</Name>
  <Lap><TotalTimeSeconds>10</TotalTimeSeconds><DistanceMeters>5</DistanceMeters></Lap>
  <Track>
    <Trackpoint><Time>2024-05-01T08:00:00Z</Time></Trackpoint>
  </Track>
</Course></Courses></TrainingCenterDatabase>"#;
        let doc = parse(xml);
        let root = element(child(&doc, "TrainingCenterDatabase"));
        let course = element(&list(child(element(child(root, "Courses")), "Course"))[0]);
        assert_eq!(list(child(course, "Lap")).len(), 1);
        let track = element(&list(child(course, "Track"))[0]);
        let points = list(child(track, "Trackpoint"));
        assert_eq!(points.len(), 1);
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        assert_eq!(child(element(&points[0]), "Time"), &Node::Time(expected));
    }

    #[test]
    fn test_undeclared_repeats_gathered() {
        let xml = "<a><b>1</b><b>2</b><c>3</c></a>";
        let doc = parse(xml);
        let a = element(child(&doc, "a"));
        assert_eq!(
            child(a, "b"),
            &Node::List(vec![Node::text("1"), Node::text("2")])
        );
        assert_eq!(child(a, "c"), &Node::text("3"));
    }

    #[test]
    fn test_attributes_kept() {
        let xml = r#"<Folders><Courses><CourseFolder Name="My &amp; Courses"/></Courses></Folders>"#;
        let doc = parse(xml);
        let courses = element(child(element(child(&doc, "Folders")), "Courses"));
        let folder = element(child(courses, "CourseFolder"));
        assert_eq!(folder.attribute("Name"), Some("My & Courses"));
    }

    #[test]
    fn test_empty_element_is_empty_text() {
        let doc = parse("<Courses/>");
        assert_eq!(child(&doc, "Courses"), &Node::text(""));
    }

    #[test]
    fn test_entities_and_cdata() {
        let xml = "<r><a>Caf&#233; &amp; Bar &lt;1&gt;</a><b><![CDATA[x & y]]></b></r>";
        let doc = parse(xml);
        let r = element(child(&doc, "r"));
        assert_eq!(child(r, "a"), &Node::text("Café & Bar <1>"));
        assert_eq!(child(r, "b"), &Node::text("x & y"));
    }

    #[test]
    fn test_mixed_text_kept_under_text_key() {
        let doc = parse(r#"<r><Notes lang="en">hello</Notes></r>"#);
        let notes = element(child(element(child(&doc, "r")), "Notes"));
        assert_eq!(notes.attribute("lang"), Some("en"));
        assert_eq!(child(notes, TEXT_KEY), &Node::text("hello"));
    }

    #[test]
    fn test_mismatched_end_tag_is_malformed() {
        let err = parse_tree("<a><b></a>", &ShapeRules::tcx()).unwrap_err();
        assert!(matches!(err, TcxError::MalformedXml(_)), "{err:?}");
    }

    #[test]
    fn test_unclosed_root_is_malformed() {
        let err = parse_tree("<a><b>x</b>", &ShapeRules::tcx()).unwrap_err();
        assert!(
            matches!(err, TcxError::MalformedXml(_) | TcxError::UnclosedElement(_)),
            "{err:?}"
        );
    }

    #[test]
    fn test_prefixed_elements_keyed_by_local_name() {
        let xml = r#"<tcx:TrainingCenterDatabase xmlns:tcx="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2">
  <tcx:Courses><tcx:Course><tcx:Name>Loop</tcx:Name>
    <tcx:Lap><tcx:TotalTimeSeconds>1</tcx:TotalTimeSeconds></tcx:Lap>
  </tcx:Course></tcx:Courses>
</tcx:TrainingCenterDatabase>"#;
        let doc = parse(xml);
        let root = element(child(&doc, "TrainingCenterDatabase"));
        assert_eq!(
            root.attribute("xmlns:tcx"),
            Some("http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2")
        );
        let course = element(&list(child(element(child(root, "Courses")), "Course"))[0]);
        assert_eq!(child(course, "Name"), &Node::text("Loop"));
        assert_eq!(list(child(course, "Lap")).len(), 1);
    }

    #[test]
    fn test_leaf_text_kept_verbatim() {
        let xml = "<r>\n  <Name> Loop </Name>\n  <Notes>\n  indented\n</Notes>\n  <Blank>  </Blank>\n</r>";
        let doc = parse(xml);
        let r = element(child(&doc, "r"));
        assert_eq!(child(r, "Name"), &Node::text(" Loop "));
        assert_eq!(child(r, "Notes"), &Node::text("\n  indented\n"));
        assert_eq!(child(r, "Blank"), &Node::text("  "));
        assert!(r.get(TEXT_KEY).is_none());
    }

    #[test]
    fn test_empty_input() {
        let doc = parse("");
        assert!(doc.is_empty());
    }
}

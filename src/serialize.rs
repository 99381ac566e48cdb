use crate::model::*;
use crate::shape::ShapeRules;
use crate::tree::{Element, Node};
use crate::validate::ROOT_TAG;

pub const TCX_NAMESPACE: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2 \
     http://www.garmin.com/xmlschemas/TrainingCenterDatabasev2.xsd";

/// Build the element tree for `doc`, in TCX schema element order.
///
/// Sequence fields are always emitted as `Node::List`, times as `Node::Time`,
/// so the tree has the same shape the reader produces for the written XML.
pub fn to_tree(doc: &CourseDocument) -> Element {
    let root = Element::new()
        .with_attribute("xmlns", TCX_NAMESPACE)
        .with_attribute("xmlns:xsi", XSI_NAMESPACE)
        .with_attribute("xsi:schemaLocation", SCHEMA_LOCATION)
        .with_optional("Folders", doc.folders.as_ref().map(folders_node))
        .with_child("Courses", course_list_node(&doc.courses));

    let document = Element::new().with_child(ROOT_TAG, Node::Element(root));
    debug_assert!(
        ShapeRules::tcx().shape_mismatches(&document).is_empty(),
        "serialized tree disagrees with the shape rules: {:?}",
        ShapeRules::tcx().shape_mismatches(&document)
    );
    document
}

/// An element with no content is written the way the reader reads it back.
fn element_or_empty(el: Element) -> Node {
    if el.is_empty() {
        Node::text("")
    } else {
        Node::Element(el)
    }
}

fn number(value: f64) -> Node {
    Node::Text(value.to_string())
}

fn folders_node(folders: &Folders) -> Node {
    let courses = folders.courses.as_ref().map(|folder| {
        Node::Element(Element::new().with_child("CourseFolder", course_folder_node(folder)))
    });
    element_or_empty(Element::new().with_optional("Courses", courses))
}

fn course_folder_node(folder: &CourseFolder) -> Node {
    let mut el = Element::new();
    if let Some(name) = &folder.name {
        el = el.with_attribute("Name", name.as_str());
    }
    let refs = folder
        .course_name_refs
        .iter()
        .map(|r| Node::Element(Element::new().with_child("Id", Node::text(r.id.as_str()))))
        .collect();
    element_or_empty(el.with_list("CourseNameRef", refs))
}

fn course_list_node(list: &CourseList) -> Node {
    let courses = list.courses.iter().map(course_node).collect();
    element_or_empty(Element::new().with_list("Course", courses))
}

fn course_node(course: &Course) -> Node {
    let el = Element::new()
        .with_child("Name", Node::text(course.name.as_str()))
        .with_list("Lap", course.laps.iter().map(lap_node).collect())
        .with_list("Track", course.tracks.iter().map(track_node).collect())
        .with_optional("Notes", course.notes.as_deref().map(Node::text))
        .with_list(
            "CoursePoint",
            course.course_points.iter().map(course_point_node).collect(),
        );
    Node::Element(el)
}

fn lap_node(lap: &Lap) -> Node {
    let el = Element::new()
        .with_child("TotalTimeSeconds", number(lap.total_time_seconds))
        .with_child("DistanceMeters", number(lap.distance_meters))
        .with_optional("BeginPosition", lap.begin_position.as_ref().map(position_node))
        .with_optional("BeginAltitudeMeters", lap.begin_altitude_meters.map(number))
        .with_optional("EndPosition", lap.end_position.as_ref().map(position_node))
        .with_optional("EndAltitudeMeters", lap.end_altitude_meters.map(number))
        .with_optional("Intensity", lap.intensity.map(|i| Node::text(i.as_str())));
    Node::Element(el)
}

fn track_node(track: &Track) -> Node {
    let points = track.points().iter().map(track_point_node).collect();
    Node::Element(Element::new().with_list("Trackpoint", points))
}

fn track_point_node(point: &TrackPoint) -> Node {
    let el = Element::new()
        .with_child("Time", Node::Time(point.time))
        .with_child("Position", position_node(&point.position))
        .with_child("AltitudeMeters", number(point.altitude_meters))
        .with_child("DistanceMeters", number(point.distance_meters));
    Node::Element(el)
}

fn course_point_node(point: &CoursePoint) -> Node {
    let el = Element::new()
        .with_child("Name", Node::text(point.name.as_str()))
        .with_child("Time", Node::Time(point.time))
        .with_child("Position", position_node(&point.position))
        .with_optional("AltitudeMeters", point.altitude_meters.map(number))
        .with_child("PointType", Node::text(point.point_type.as_str()))
        .with_optional("Notes", point.notes.as_deref().map(Node::text));
    Node::Element(el)
}

fn position_node(position: &Position) -> Node {
    let el = Element::new()
        .with_child("LatitudeDegrees", number(position.latitude_degrees))
        .with_child("LongitudeDegrees", number(position.longitude_degrees));
    Node::Element(el)
}

//! Turn an untyped element tree into a [`CourseDocument`].
//!
//! Validation stops at the first field that cannot be satisfied and reports
//! its dotted path, with sequence indices, from the document root.

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::model::*;
use crate::shape::{join_path, parse_time};
use crate::tree::{Element, Node};

type Checked<T> = std::result::Result<T, ValidationError>;

pub const ROOT_TAG: &str = "TrainingCenterDatabase";

static EMPTY: Element = Element::new();

/// Validate a parsed document (the element returned by
/// [`crate::reader::parse_tree`]).
pub fn validate_document(document: &Element) -> Checked<CourseDocument> {
    let root = document
        .get(ROOT_TAG)
        .ok_or_else(|| ValidationError::new(ROOT_TAG, "a <TrainingCenterDatabase> root element"))?;
    let root = as_element(root, ROOT_TAG)?;

    let folders = match root.get("Folders") {
        Some(node) => Some(validate_folders(node, &join_path(ROOT_TAG, "Folders"))?),
        None => None,
    };

    let courses_path = join_path(ROOT_TAG, "Courses");
    let courses_node = root
        .get("Courses")
        .ok_or_else(|| ValidationError::new(&courses_path, "required <Courses> element"))?;
    let courses_el = as_element(courses_node, &courses_path)?;

    let mut courses = Vec::new();
    for (i, node) in sequence(courses_el, "Course", &courses_path)?.iter().enumerate() {
        courses.push(validate_course(node, &indexed(&courses_path, "Course", i))?);
    }

    let doc = CourseDocument {
        folders,
        courses: CourseList { courses },
    };
    warn_dangling_refs(&doc);
    tracing::debug!(courses = doc.courses.courses.len(), "validated course document");
    Ok(doc)
}

fn validate_folders(node: &Node, path: &str) -> Checked<Folders> {
    let el = as_element(node, path)?;
    let courses = match el.get("Courses") {
        Some(courses) => {
            let courses_path = join_path(path, "Courses");
            let courses_el = as_element(courses, &courses_path)?;
            let folder_path = join_path(&courses_path, "CourseFolder");
            let folder = courses_el.get("CourseFolder").ok_or_else(|| {
                ValidationError::new(&folder_path, "required <CourseFolder> element")
            })?;
            Some(validate_course_folder(folder, &folder_path)?)
        }
        None => None,
    };
    Ok(Folders { courses })
}

fn validate_course_folder(node: &Node, path: &str) -> Checked<CourseFolder> {
    let el = as_element(node, path)?;
    let mut course_name_refs = Vec::new();
    for (i, item) in sequence(el, "CourseNameRef", path)?.iter().enumerate() {
        let ref_path = indexed(path, "CourseNameRef", i);
        let ref_el = as_element(item, &ref_path)?;
        course_name_refs.push(NameKeyReference {
            id: string(ref_el, "Id", &ref_path)?,
        });
    }
    Ok(CourseFolder {
        name: el.attribute("Name").map(str::to_string),
        course_name_refs,
    })
}

fn validate_course(node: &Node, path: &str) -> Checked<Course> {
    let el = as_element(node, path)?;

    let name = string(el, "Name", path)?;
    if name.trim().is_empty() {
        return Err(ValidationError::new(
            join_path(path, "Name"),
            "non-empty course name",
        ));
    }

    let mut laps = Vec::new();
    for (i, lap) in sequence(el, "Lap", path)?.iter().enumerate() {
        laps.push(validate_lap(lap, &indexed(path, "Lap", i))?);
    }

    let mut tracks = Vec::new();
    for (i, track) in sequence(el, "Track", path)?.iter().enumerate() {
        tracks.push(validate_track(track, &indexed(path, "Track", i))?);
    }

    let mut course_points = Vec::new();
    for (i, point) in sequence(el, "CoursePoint", path)?.iter().enumerate() {
        course_points.push(validate_course_point(point, &indexed(path, "CoursePoint", i))?);
    }

    tracing::trace!(
        course = %name,
        laps = laps.len(),
        tracks = tracks.len(),
        course_points = course_points.len(),
        "validated course"
    );

    Ok(Course {
        name,
        laps: laps.into(),
        tracks: tracks.into(),
        notes: optional_string(el, "Notes", path)?,
        course_points: course_points.into(),
    })
}

fn validate_lap(node: &Node, path: &str) -> Checked<Lap> {
    let el = as_element(node, path)?;
    let total_time_seconds = non_negative(el, "TotalTimeSeconds", path)?;
    let distance_meters = non_negative(el, "DistanceMeters", path)?;
    let begin_position = optional_position(el, "BeginPosition", path)?;
    let begin_altitude_meters = optional_number(el, "BeginAltitudeMeters", path)?;
    let end_position = optional_position(el, "EndPosition", path)?;
    let end_altitude_meters = optional_number(el, "EndAltitudeMeters", path)?;
    let intensity = match optional_string(el, "Intensity", path)? {
        Some(value) => Some(Intensity::parse(value.trim()).ok_or_else(|| {
            ValidationError::new(
                join_path(path, "Intensity"),
                format!("one of Active, Resting, found '{value}'"),
            )
        })?),
        None => None,
    };

    Ok(Lap {
        total_time_seconds,
        distance_meters,
        begin_position,
        begin_altitude_meters,
        end_position,
        end_altitude_meters,
        intensity,
    })
}

fn validate_track(node: &Node, path: &str) -> Checked<Track> {
    let el = as_element(node, path)?;
    let mut points = Vec::new();
    for (i, point) in sequence(el, "Trackpoint", path)?.iter().enumerate() {
        points.push(validate_track_point(point, &indexed(path, "Trackpoint", i))?);
    }
    Track::new(points).map_err(|e| e.under(path))
}

fn validate_track_point(node: &Node, path: &str) -> Checked<TrackPoint> {
    let el = as_element(node, path)?;
    Ok(TrackPoint {
        time: time(el, "Time", path)?,
        position: position(el, "Position", path)?,
        altitude_meters: number(el, "AltitudeMeters", path)?,
        distance_meters: non_negative(el, "DistanceMeters", path)?,
    })
}

fn validate_course_point(node: &Node, path: &str) -> Checked<CoursePoint> {
    let el = as_element(node, path)?;
    let name = string(el, "Name", path)?;
    let time = time(el, "Time", path)?;
    let position = position(el, "Position", path)?;
    let altitude_meters = optional_number(el, "AltitudeMeters", path)?;

    let raw_type = string(el, "PointType", path)?;
    let point_type = PointType::parse(raw_type.trim()).ok_or_else(|| {
        ValidationError::new(
            join_path(path, "PointType"),
            format!("a TCX course point type, found '{raw_type}'"),
        )
    })?;

    Ok(CoursePoint {
        name,
        time,
        position,
        altitude_meters,
        point_type,
        notes: optional_string(el, "Notes", path)?,
    })
}

fn position(el: &Element, tag: &str, path: &str) -> Checked<Position> {
    let field = join_path(path, tag);
    let node = el
        .get(tag)
        .ok_or_else(|| ValidationError::new(&field, "required position"))?;
    validate_position(node, &field)
}

fn optional_position(el: &Element, tag: &str, path: &str) -> Checked<Option<Position>> {
    el.get(tag)
        .map(|node| validate_position(node, &join_path(path, tag)))
        .transpose()
}

fn validate_position(node: &Node, path: &str) -> Checked<Position> {
    let el = as_element(node, path)?;
    let latitude_degrees = number(el, "LatitudeDegrees", path)?;
    let longitude_degrees = number(el, "LongitudeDegrees", path)?;
    let position = Position::new(latitude_degrees, longitude_degrees);
    position.check().map_err(|e| e.under(path))?;
    Ok(position)
}

fn as_element<'a>(node: &'a Node, path: &str) -> Checked<&'a Element> {
    match node {
        Node::Element(el) => Ok(el),
        // `<Courses/>` and friends, including `<Courses>\n</Courses>`
        Node::Text(text) if text.trim().is_empty() => Ok(&EMPTY),
        other => Err(ValidationError::new(
            path,
            format!("an element, found {}", other.kind()),
        )),
    }
}

/// Items of a sequence-typed field. Absent means empty; a bare element means
/// the tree was built without this tag in the shape rules.
fn sequence<'a>(el: &'a Element, tag: &str, path: &str) -> Checked<&'a [Node]> {
    match el.get(tag) {
        None => Ok(&[][..]),
        Some(Node::List(items)) => Ok(items.as_slice()),
        Some(other) => Err(ValidationError::new(
            join_path(path, tag),
            format!("a sequence of <{tag}> elements, found a bare {}", other.kind()),
        )),
    }
}

fn indexed(path: &str, tag: &str, index: usize) -> String {
    format!("{}[{index}]", join_path(path, tag))
}

fn text_of<'a>(node: &'a Node, path: &str, what: &str) -> Checked<&'a str> {
    match node {
        Node::Text(text) => Ok(text.as_str()),
        other => Err(ValidationError::new(
            path,
            format!("{what}, found {}", other.kind()),
        )),
    }
}

fn string(el: &Element, tag: &str, path: &str) -> Checked<String> {
    let field = join_path(path, tag);
    let node = el
        .get(tag)
        .ok_or_else(|| ValidationError::new(&field, "required string"))?;
    text_of(node, &field, "string").map(str::to_string)
}

fn optional_string(el: &Element, tag: &str, path: &str) -> Checked<Option<String>> {
    el.get(tag)
        .map(|node| text_of(node, &join_path(path, tag), "string").map(str::to_string))
        .transpose()
}

fn parse_number(node: &Node, path: &str) -> Checked<f64> {
    let text = text_of(node, path, "number")?;
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ValidationError::new(
            path,
            format!("finite number, found '{text}'"),
        )),
    }
}

fn number(el: &Element, tag: &str, path: &str) -> Checked<f64> {
    let field = join_path(path, tag);
    let node = el
        .get(tag)
        .ok_or_else(|| ValidationError::new(&field, "required number"))?;
    parse_number(node, &field)
}

fn optional_number(el: &Element, tag: &str, path: &str) -> Checked<Option<f64>> {
    el.get(tag)
        .map(|node| parse_number(node, &join_path(path, tag)))
        .transpose()
}

fn non_negative(el: &Element, tag: &str, path: &str) -> Checked<f64> {
    let value = number(el, tag, path)?;
    check_non_negative(value, tag).map_err(|e| e.under(path))
}

fn time(el: &Element, tag: &str, path: &str) -> Checked<DateTime<Utc>> {
    let field = join_path(path, tag);
    match el.get(tag) {
        Some(Node::Time(time)) => Ok(*time),
        Some(Node::Text(text)) => parse_time(text).ok_or_else(|| {
            ValidationError::new(&field, format!("ISO-8601 timestamp, found '{text}'"))
        }),
        Some(other) => Err(ValidationError::new(
            &field,
            format!("ISO-8601 timestamp, found {}", other.kind()),
        )),
        None => Err(ValidationError::new(&field, "required timestamp")),
    }
}

fn warn_dangling_refs(doc: &CourseDocument) {
    let Some(folder) = doc.folders.as_ref().and_then(|f| f.courses.as_ref()) else {
        return;
    };
    for reference in &folder.course_name_refs {
        if doc.course(&reference.id).is_none() {
            tracing::warn!(id = %reference.id, "course folder references an unknown course");
        }
    }
}

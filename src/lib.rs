pub mod error;
pub mod lookup;
pub mod model;
pub mod options;
pub mod reader;
pub mod serialize;
pub mod shape;
pub mod tree;
pub mod validate;
pub mod writer;

use wasm_bindgen::prelude::*;

pub use crate::error::{Result, TcxError, ValidationError};
pub use crate::lookup::{find_nearest_by_distance, find_time_equivalent};
pub use crate::model::*;
pub use crate::options::WriteOptions;
pub use crate::shape::ShapeRules;

/// Parse and validate a TCX course document.
pub fn parse_course_document(xml: &str) -> Result<CourseDocument> {
    let tree = reader::parse_tree(xml, &ShapeRules::tcx())?;
    Ok(validate::validate_document(&tree)?)
}

/// Write a course document as TCX XML.
pub fn serialize_course_document(doc: &CourseDocument, options: &WriteOptions) -> Result<String> {
    writer::write_tree(&serialize::to_tree(doc), &ShapeRules::tcx(), options)
}

/// Parse a TCX string, returned as a JS object.
#[wasm_bindgen(js_name = parseCourseDocument)]
pub fn parse_course_document_js(xml: &str) -> std::result::Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let doc = parse_course_document(xml)?;
    serde_wasm_bindgen::to_value(&doc).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Parse a TCX string, returned as a JSON string.
#[wasm_bindgen(js_name = parseCourseDocumentString)]
pub fn parse_course_document_string(xml: &str) -> std::result::Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let doc = parse_course_document(xml)?;
    serde_json::to_string(&doc).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Write a course document object (as produced by `parseCourseDocument`) as
/// TCX XML. The document is validated again before writing.
#[wasm_bindgen(js_name = serializeCourseDocument)]
pub fn serialize_course_document_js(
    doc: JsValue,
    options: JsValue,
) -> std::result::Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let doc: CourseDocument =
        serde_wasm_bindgen::from_value(doc).map_err(|e| JsValue::from_str(&e.to_string()))?;
    let tree = serialize::to_tree(&doc);
    validate::validate_document(&tree).map_err(TcxError::from)?;
    Ok(writer::write_tree(&tree, &ShapeRules::tcx(), &opts)?)
}

/// The track point at or before `distance` meters along `track`.
#[wasm_bindgen(js_name = findNearestByDistance)]
pub fn find_nearest_by_distance_js(
    track: JsValue,
    distance: f64,
) -> std::result::Result<JsValue, JsValue> {
    let track = parse_track(track)?;
    let point = lookup::find_nearest_by_distance(&track, distance);
    serde_wasm_bindgen::to_value(point).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// The track point before the one recorded at `time`, or `null`.
#[wasm_bindgen(js_name = findTimeEquivalent)]
pub fn find_time_equivalent_js(
    track: JsValue,
    time: &str,
) -> std::result::Result<JsValue, JsValue> {
    let track = parse_track(track)?;
    let time = shape::parse_time(time)
        .ok_or_else(|| JsValue::from_str(&format!("Invalid timestamp '{time}'")))?;
    match lookup::find_time_equivalent(&track, time) {
        Ok(point) => {
            serde_wasm_bindgen::to_value(point).map_err(|e| JsValue::from_str(&e.to_string()))
        }
        Err(TcxError::NotFound(_)) => Ok(JsValue::NULL),
        Err(e) => Err(e.into()),
    }
}

fn parse_track(track: JsValue) -> std::result::Result<Track, JsValue> {
    serde_wasm_bindgen::from_value(track).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn parse_options(options: JsValue) -> std::result::Result<WriteOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(WriteOptions::default())
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

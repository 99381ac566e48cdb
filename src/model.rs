//! Typed TCX course documents.
//!
//! Every type here is immutable once built. Sequences are stored as `Arc<[T]>`
//! so an edited course can share the laps and tracks of the course it was
//! derived from.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TcxError, ValidationError};
use crate::lookup;

/// Root of a TCX course file (`<TrainingCenterDatabase>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CourseDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folders: Option<Folders>,
    pub courses: CourseList,
}

impl CourseDocument {
    pub fn course(&self, name: &str) -> Option<&Course> {
        self.courses.courses.iter().find(|c| c.name == name)
    }

    /// A new document with `course` replacing the course of the same name,
    /// or appended when there is none.
    pub fn with_course(&self, course: Course) -> CourseDocument {
        let mut courses = self.courses.courses.clone();
        match courses.iter_mut().find(|c| c.name == course.name) {
            Some(existing) => *existing = course,
            None => courses.push(course),
        }
        CourseDocument {
            folders: self.folders.clone(),
            courses: CourseList { courses },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CourseList {
    #[serde(rename = "Course", default)]
    pub courses: Vec<Course>,
}

/// `<Folders>`: the navigation tree that points into the course list by name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Folders {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub courses: Option<CourseFolder>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CourseFolder {
    /// The `Name` attribute of `<CourseFolder>`.
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "CourseNameRef", default)]
    pub course_name_refs: Vec<NameKeyReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NameKeyReference {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Course {
    pub name: String,
    #[serde(rename = "Lap", default)]
    pub laps: Arc<[Lap]>,
    #[serde(rename = "Track", default)]
    pub tracks: Arc<[Track]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "CoursePoint", default)]
    pub course_points: Arc<[CoursePoint]>,
}

impl Course {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            laps: Arc::from(Vec::new()),
            tracks: Arc::from(Vec::new()),
            notes: None,
            course_points: Arc::from(Vec::new()),
        }
    }

    /// A copy of this course with `point` inserted after every course point
    /// whose time is not later than its own. Laps and tracks are shared.
    pub fn with_course_point(&self, point: CoursePoint) -> Course {
        let at = self
            .course_points
            .partition_point(|existing| existing.time <= point.time);
        let mut points = Vec::with_capacity(self.course_points.len() + 1);
        points.extend_from_slice(&self.course_points[..at]);
        points.push(point);
        points.extend_from_slice(&self.course_points[at..]);

        Course {
            name: self.name.clone(),
            laps: Arc::clone(&self.laps),
            tracks: Arc::clone(&self.tracks),
            notes: self.notes.clone(),
            course_points: points.into(),
        }
    }

    /// Add a course point anchored to the track point found by
    /// [`lookup::find_nearest_by_distance`] at `distance_meters`.
    ///
    /// The first track whose recorded extent reaches the distance is used,
    /// falling back to the last track.
    pub fn place_course_point(
        &self,
        name: impl Into<String>,
        point_type: PointType,
        distance_meters: f64,
    ) -> Result<Course> {
        let track = self
            .tracks
            .iter()
            .find(|track| track.last().distance_meters >= distance_meters)
            .or_else(|| self.tracks.last())
            .ok_or_else(|| TcxError::NoTrack(self.name.clone()))?;

        let anchor = lookup::find_nearest_by_distance(track, distance_meters);
        tracing::trace!(
            course = %self.name,
            distance_meters,
            anchor_distance = anchor.distance_meters,
            "placing course point"
        );
        Ok(self.with_course_point(CoursePoint::at_track_point(name, point_type, anchor)))
    }

    /// The track point just before `point`, located by its exact time.
    pub fn track_point_before(&self, point: &CoursePoint) -> Result<&TrackPoint> {
        if self.tracks.is_empty() {
            return Err(TcxError::NoTrack(self.name.clone()));
        }
        self.tracks
            .iter()
            .find_map(|track| lookup::find_time_equivalent(track, point.time).ok())
            .ok_or(TcxError::NotFound(point.time))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Lap {
    pub total_time_seconds: f64,
    pub distance_meters: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_altitude_meters: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_altitude_meters: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<Intensity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intensity {
    Active,
    Resting,
}

impl Intensity {
    pub const ALL: [Intensity; 2] = [Self::Active, Self::Resting];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Resting => "Resting",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.as_str() == value)
    }
}

/// A track: at least one point, distances non-negative and non-decreasing,
/// times strictly increasing, every value finite and every position in range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrackRepr", into = "TrackRepr")]
pub struct Track {
    points: Arc<[TrackPoint]>,
}

#[derive(Serialize, Deserialize)]
struct TrackRepr {
    #[serde(rename = "Trackpoint")]
    points: Vec<TrackPoint>,
}

impl Track {
    /// Build a track, checking its invariants. Error paths are relative to
    /// the track (`Trackpoint[3].Time`).
    pub fn new(points: Vec<TrackPoint>) -> std::result::Result<Self, ValidationError> {
        if points.is_empty() {
            return Err(ValidationError::new(
                "Trackpoint",
                "at least one track point",
            ));
        }
        for (i, point) in points.iter().enumerate() {
            point
                .check()
                .map_err(|e| e.under(&format!("Trackpoint[{i}]")))?;
        }
        for (i, pair) in points.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.distance_meters < prev.distance_meters {
                return Err(ValidationError::new(
                    format!("Trackpoint[{}].DistanceMeters", i + 1),
                    format!("distance not less than {}", prev.distance_meters),
                ));
            }
            if next.time <= prev.time {
                return Err(ValidationError::new(
                    format!("Trackpoint[{}].Time", i + 1),
                    format!("time after {}", prev.time.to_rfc3339()),
                ));
            }
        }
        Ok(Self {
            points: points.into(),
        })
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn first(&self) -> &TrackPoint {
        &self.points[0]
    }

    pub fn last(&self) -> &TrackPoint {
        &self.points[self.points.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl TryFrom<TrackRepr> for Track {
    type Error = ValidationError;

    fn try_from(repr: TrackRepr) -> std::result::Result<Self, Self::Error> {
        Track::new(repr.points)
    }
}

impl From<Track> for TrackRepr {
    fn from(track: Track) -> Self {
        TrackRepr {
            points: track.points.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackPoint {
    pub time: DateTime<Utc>,
    pub position: Position,
    pub altitude_meters: f64,
    /// Cumulative distance from the start of the track.
    pub distance_meters: f64,
}

impl TrackPoint {
    fn check(&self) -> std::result::Result<(), ValidationError> {
        self.position.check().map_err(|e| e.under("Position"))?;
        check_finite(self.altitude_meters, "AltitudeMeters")?;
        check_non_negative(self.distance_meters, "DistanceMeters")?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CoursePoint {
    pub name: String,
    pub time: DateTime<Utc>,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_meters: Option<f64>,
    pub point_type: PointType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CoursePoint {
    /// A course point sitting exactly on `anchor`.
    pub fn at_track_point(
        name: impl Into<String>,
        point_type: PointType,
        anchor: &TrackPoint,
    ) -> Self {
        Self {
            name: name.into(),
            time: anchor.time,
            position: anchor.position,
            altitude_meters: Some(anchor.altitude_meters),
            point_type,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Position {
    pub latitude_degrees: f64,
    pub longitude_degrees: f64,
}

impl Position {
    pub fn new(latitude_degrees: f64, longitude_degrees: f64) -> Self {
        Self {
            latitude_degrees,
            longitude_degrees,
        }
    }

    /// Latitude in [-90, 90], longitude in [-180, 180]. Error paths are
    /// relative to the position.
    pub fn check(&self) -> std::result::Result<(), ValidationError> {
        if !(-90.0..=90.0).contains(&self.latitude_degrees) {
            return Err(ValidationError::new(
                "LatitudeDegrees",
                format!("latitude in [-90, 90], found {}", self.latitude_degrees),
            ));
        }
        if !(-180.0..=180.0).contains(&self.longitude_degrees) {
            return Err(ValidationError::new(
                "LongitudeDegrees",
                format!("longitude in [-180, 180], found {}", self.longitude_degrees),
            ));
        }
        Ok(())
    }
}

pub(crate) fn check_finite(value: f64, field: &str) -> std::result::Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::new(
            field,
            format!("finite number, found {value}"),
        ))
    }
}

pub(crate) fn check_non_negative(
    value: f64,
    field: &str,
) -> std::result::Result<f64, ValidationError> {
    if check_finite(value, field)? < 0.0 {
        return Err(ValidationError::new(
            field,
            format!("non-negative number, found {value}"),
        ));
    }
    Ok(value)
}

/// The closed set of TCX course point types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointType {
    Generic,
    Summit,
    Valley,
    Water,
    Food,
    Danger,
    Left,
    Right,
    Straight,
    #[serde(rename = "First Aid")]
    FirstAid,
    #[serde(rename = "4th Category")]
    FourthCategory,
    #[serde(rename = "3rd Category")]
    ThirdCategory,
    #[serde(rename = "2nd Category")]
    SecondCategory,
    #[serde(rename = "1st Category")]
    FirstCategory,
    #[serde(rename = "Hors Category")]
    HorsCategory,
    Sprint,
}

impl PointType {
    pub const ALL: [PointType; 16] = [
        Self::Generic,
        Self::Summit,
        Self::Valley,
        Self::Water,
        Self::Food,
        Self::Danger,
        Self::Left,
        Self::Right,
        Self::Straight,
        Self::FirstAid,
        Self::FourthCategory,
        Self::ThirdCategory,
        Self::SecondCategory,
        Self::FirstCategory,
        Self::HorsCategory,
        Self::Sprint,
    ];

    /// The spelling used in TCX files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "Generic",
            Self::Summit => "Summit",
            Self::Valley => "Valley",
            Self::Water => "Water",
            Self::Food => "Food",
            Self::Danger => "Danger",
            Self::Left => "Left",
            Self::Right => "Right",
            Self::Straight => "Straight",
            Self::FirstAid => "First Aid",
            Self::FourthCategory => "4th Category",
            Self::ThirdCategory => "3rd Category",
            Self::SecondCategory => "2nd Category",
            Self::FirstCategory => "1st Category",
            Self::HorsCategory => "Hors Category",
            Self::Sprint => "Sprint",
        }
    }

    /// Exact, case-sensitive match against the TCX spelling.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for PointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Curriculum catalog types: Book → Course → SubCourse.
//!
//! The catalog is read-only from the engine's point of view. Courses and
//! sub-courses keep their declaration order, which is also the order
//! progress reports are emitted in.

use serde::{Deserialize, Serialize};

/// Top-level curriculum container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    /// Student-ID prefixes admitted to this book. Empty admits everyone.
    #[serde(default)]
    pub student_id_prefixes: Vec<String>,
    #[serde(default)]
    pub courses: Vec<Course>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sub_courses: Vec<SubCourse>,
}

/// Leaf category carrying the completion requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCourse {
    pub id: String,
    pub name: String,
    /// Count needed across the whole program (overall mode).
    #[serde(default)]
    pub always_required: u32,
    /// Count needed within a single subject (by-subject mode).
    #[serde(default)]
    pub in_subject_required: Option<u32>,
    /// Students type their own subject label per record.
    #[serde(default)]
    pub is_subject_freeform: bool,
    /// Fixed subject list offered when the sub-course is not freeform.
    #[serde(default)]
    pub subjects: Vec<String>,
}

/// Flattened view of one sub-course's requirements, as returned by
/// `CatalogStore::get_sub_courses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCourseRequirement {
    pub id: String,
    pub course_id: String,
    pub always_required: u32,
    pub in_subject_required: Option<u32>,
    pub is_freeform: bool,
    pub subjects: Vec<String>,
}

impl Book {
    /// Whether `student_id` may submit records against this book.
    pub fn admits(&self, student_id: &str) -> bool {
        self.student_id_prefixes.is_empty()
            || self
                .student_id_prefixes
                .iter()
                .any(|p| student_id.starts_with(p.as_str()))
    }

    pub fn course(&self, course_id: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == course_id)
    }

    /// Resolve a (course, sub-course) pair, requiring the sub-course to be
    /// nested under the given course.
    pub fn sub_course(&self, course_id: &str, sub_course_id: &str) -> Option<&SubCourse> {
        self.course(course_id)?
            .sub_courses
            .iter()
            .find(|s| s.id == sub_course_id)
    }

    pub fn sub_course_requirements(&self) -> Vec<SubCourseRequirement> {
        self.courses
            .iter()
            .flat_map(|course| {
                course.sub_courses.iter().map(|sub| SubCourseRequirement {
                    id: sub.id.clone(),
                    course_id: course.id.clone(),
                    always_required: sub.always_required,
                    in_subject_required: sub.in_subject_required,
                    is_freeform: sub.is_subject_freeform,
                    subjects: sub.subjects.clone(),
                })
            })
            .collect()
    }
}

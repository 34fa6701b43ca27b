//! Progress aggregation.
//!
//! Completion is derived on every call from the student's `CONFIRMED`
//! records and the catalog requirements; nothing is cached.
//!
//! The rule is a capped sum. Each sub-course (or, in by-subject mode, each
//! listed subject of a sub-course) contributes `min(done, required)` to the
//! numerator and `required` to the denominator. Capping happens before
//! summation, so surplus in one category never offsets a deficit in another.
//! Categories whose requirement is null or zero under the active mode are
//! not applicable and contribute nothing. An empty denominator is 100%.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use logbook_storage::{
    Book, CatalogStore, ExperienceRecord, ExperienceStatus, RecordFilter, RecordStore, SubCourse,
};
use serde::{Deserialize, Serialize};

use crate::approval::CredentialStore;
use crate::engine::ExperienceEngine;
use crate::error::LifecycleError;

/// Which requirement counter drives the aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountingMode {
    /// `always_required`: counted across the whole program.
    #[default]
    Overall,
    /// `in_subject_required`: counted within each subject.
    BySubject,
}

impl fmt::Display for CountingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountingMode::Overall => f.write_str("overall"),
            CountingMode::BySubject => f.write_str("by_subject"),
        }
    }
}

impl FromStr for CountingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overall" => Ok(CountingMode::Overall),
            "by_subject" | "by-subject" | "bysubject" => Ok(CountingMode::BySubject),
            other => Err(format!(
                "unknown counting mode '{}' (expected overall or by_subject)",
                other
            )),
        }
    }
}

// ──────────────────────────────────────────────
// Report types
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectProgress {
    pub subject: String,
    pub required: u32,
    pub raw_done: u32,
    pub capped_done: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCourseProgress {
    pub sub_course_id: String,
    pub name: String,
    /// False when the active mode sets no requirement for this sub-course.
    pub applicable: bool,
    pub required: u64,
    /// All confirmed records on the sub-course, uncapped.
    pub raw_done: u64,
    pub capped_done: u64,
    pub percent: u32,
    /// Per-subject buckets, only in by-subject mode on fixed-list sub-courses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<SubjectProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseProgress {
    pub course_id: String,
    pub name: String,
    pub required: u64,
    pub done: u64,
    pub percent: u32,
    pub sub_courses: Vec<SubCourseProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookProgress {
    pub book_id: String,
    pub student_id: String,
    pub mode: CountingMode,
    pub required: u64,
    pub done: u64,
    pub overall_percent: u32,
    pub courses: Vec<CourseProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortSubCourseProgress {
    pub sub_course_id: String,
    pub name: String,
    pub applicable: bool,
    pub student_count: usize,
    pub done_student_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortCourseProgress {
    pub course_id: String,
    pub name: String,
    pub student_count: usize,
    pub done_student_count: usize,
    pub sub_courses: Vec<CohortSubCourseProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortProgress {
    pub book_id: String,
    pub mode: CountingMode,
    pub student_count: usize,
    pub done_student_count: usize,
    pub courses: Vec<CohortCourseProgress>,
}

// ──────────────────────────────────────────────
// Aggregation
// ──────────────────────────────────────────────

/// `done / required` as a percentage rounded half up. Zero requirement is
/// vacuously complete.
pub fn percent(done: u64, required: u64) -> u32 {
    if required == 0 {
        return 100;
    }
    let done = u128::from(done.min(required));
    let required = u128::from(required);
    ((done * 200 + required) / (required * 2)) as u32
}

/// Confirmed-record counts keyed by (course, sub-course) and by
/// (course, sub-course, subject).
#[derive(Default)]
struct Tally<'a> {
    by_sub_course: HashMap<(&'a str, &'a str), u32>,
    by_subject: HashMap<(&'a str, &'a str, &'a str), u32>,
}

impl<'a> Tally<'a> {
    fn count(records: impl IntoIterator<Item = &'a ExperienceRecord>) -> Self {
        let mut tally = Tally::default();
        for r in records {
            if r.status != ExperienceStatus::Confirmed {
                continue;
            }
            let key = (r.course_id.as_str(), r.sub_course_id.as_str());
            *tally.by_sub_course.entry(key).or_insert(0) += 1;
            if let Some(subject) = r.subject.as_deref() {
                *tally
                    .by_subject
                    .entry((key.0, key.1, subject))
                    .or_insert(0) += 1;
            }
        }
        tally
    }

    fn sub_course(&self, course_id: &str, sub_course_id: &str) -> u32 {
        self.by_sub_course
            .get(&(course_id, sub_course_id))
            .copied()
            .unwrap_or(0)
    }

    fn subject(&self, course_id: &str, sub_course_id: &str, subject: &str) -> u32 {
        self.by_subject
            .get(&(course_id, sub_course_id, subject))
            .copied()
            .unwrap_or(0)
    }
}

fn evaluate_sub_course(
    course_id: &str,
    sub: &SubCourse,
    mode: CountingMode,
    tally: &Tally<'_>,
) -> SubCourseProgress {
    let raw_done = u64::from(tally.sub_course(course_id, &sub.id));
    let mut subjects = Vec::new();

    let (required, capped_done) = match mode {
        CountingMode::Overall => {
            let required = u64::from(sub.always_required);
            (required, raw_done.min(required))
        }
        CountingMode::BySubject => {
            let per_subject = sub.in_subject_required.unwrap_or(0);
            if !sub.is_subject_freeform && !sub.subjects.is_empty() && per_subject > 0 {
                for subject in &sub.subjects {
                    let raw = tally.subject(course_id, &sub.id, subject);
                    subjects.push(SubjectProgress {
                        subject: subject.clone(),
                        required: per_subject,
                        raw_done: raw,
                        capped_done: raw.min(per_subject),
                    });
                }
                let required = u64::from(per_subject) * subjects.len() as u64;
                let capped: u64 = subjects.iter().map(|s| u64::from(s.capped_done)).sum();
                (required, capped)
            } else {
                let required = u64::from(per_subject);
                (required, raw_done.min(required))
            }
        }
    };

    SubCourseProgress {
        sub_course_id: sub.id.clone(),
        name: sub.name.clone(),
        applicable: required > 0,
        required,
        raw_done,
        capped_done,
        percent: percent(capped_done, required),
        subjects,
    }
}

fn aggregate_records<'a>(
    book: &Book,
    student_id: &str,
    records: impl IntoIterator<Item = &'a ExperienceRecord>,
    mode: CountingMode,
) -> BookProgress {
    let tally = Tally::count(
        records
            .into_iter()
            .filter(|r| r.student_id == student_id && r.book_id == book.id),
    );

    let courses: Vec<CourseProgress> = book
        .courses
        .iter()
        .map(|course| {
            let sub_courses: Vec<SubCourseProgress> = course
                .sub_courses
                .iter()
                .map(|sub| evaluate_sub_course(&course.id, sub, mode, &tally))
                .collect();
            let required = sub_courses.iter().map(|s| s.required).sum();
            let done = sub_courses.iter().map(|s| s.capped_done).sum();
            CourseProgress {
                course_id: course.id.clone(),
                name: course.name.clone(),
                required,
                done,
                percent: percent(done, required),
                sub_courses,
            }
        })
        .collect();

    let required = courses.iter().map(|c| c.required).sum();
    let done = courses.iter().map(|c| c.done).sum();
    BookProgress {
        book_id: book.id.clone(),
        student_id: student_id.to_string(),
        mode,
        required,
        done,
        overall_percent: percent(done, required),
        courses,
    }
}

/// Capped-sum progress of one student in one book.
///
/// Only `CONFIRMED` records of that student in that book are counted;
/// anything else in `records` is ignored.
pub fn aggregate(
    book: &Book,
    student_id: &str,
    records: &[ExperienceRecord],
    mode: CountingMode,
) -> BookProgress {
    aggregate_records(book, student_id, records, mode)
}

/// Run [`aggregate`] per student and count who is done at each level.
///
/// A student is done with a sub-course when `capped_done == required`
/// (vacuously true when not applicable), with a course or book when its
/// capped sum reaches its requirement.
pub fn aggregate_cohort(
    book: &Book,
    student_ids: &[String],
    records: &[ExperienceRecord],
    mode: CountingMode,
) -> CohortProgress {
    let mut seen = HashSet::new();
    let students: Vec<&str> = student_ids
        .iter()
        .map(String::as_str)
        .filter(|s| seen.insert(*s))
        .collect();

    let mut by_student: HashMap<&str, Vec<&ExperienceRecord>> = HashMap::new();
    for r in records {
        by_student.entry(r.student_id.as_str()).or_default().push(r);
    }

    let reports: Vec<BookProgress> = students
        .iter()
        .map(|student| {
            let own = by_student.get(student).map(Vec::as_slice).unwrap_or(&[]);
            aggregate_records(book, student, own.iter().copied(), mode)
        })
        .collect();

    let courses = book
        .courses
        .iter()
        .enumerate()
        .map(|(ci, course)| {
            let sub_courses = course
                .sub_courses
                .iter()
                .enumerate()
                .map(|(si, sub)| {
                    let done = reports
                        .iter()
                        .filter(|p| {
                            let s = &p.courses[ci].sub_courses[si];
                            s.capped_done == s.required
                        })
                        .count();
                    CohortSubCourseProgress {
                        sub_course_id: sub.id.clone(),
                        name: sub.name.clone(),
                        applicable: reports
                            .first()
                            .map(|p| p.courses[ci].sub_courses[si].applicable)
                            .unwrap_or_else(|| requirement_for(sub, mode) > 0),
                        student_count: reports.len(),
                        done_student_count: done,
                    }
                })
                .collect();
            let done = reports
                .iter()
                .filter(|p| p.courses[ci].done == p.courses[ci].required)
                .count();
            CohortCourseProgress {
                course_id: course.id.clone(),
                name: course.name.clone(),
                student_count: reports.len(),
                done_student_count: done,
                sub_courses,
            }
        })
        .collect();

    CohortProgress {
        book_id: book.id.clone(),
        mode,
        student_count: reports.len(),
        done_student_count: reports.iter().filter(|p| p.done == p.required).count(),
        courses,
    }
}

/// Requirement of a sub-course under `mode`, bucket expansion included.
fn requirement_for(sub: &SubCourse, mode: CountingMode) -> u64 {
    evaluate_sub_course("", sub, mode, &Tally::default()).required
}

impl<R, C, K> ExperienceEngine<R, C, K>
where
    R: RecordStore,
    C: CatalogStore,
    K: CredentialStore,
{
    /// Progress of one student in one book, from a single read of the
    /// student's confirmed records.
    pub async fn compute_progress(
        &self,
        student_id: &str,
        book_id: &str,
        mode: CountingMode,
    ) -> Result<BookProgress, LifecycleError> {
        let book = self.catalog.get_book(book_id).await?;
        let confirmed = self
            .records
            .find_confirmed_by_student_and_book(student_id, book_id)
            .await?;
        Ok(aggregate(&book, student_id, &confirmed, mode))
    }

    /// Cohort progress over `student_ids`, or over every student with at
    /// least one record in the book when `student_ids` is empty.
    pub async fn compute_cohort_progress(
        &self,
        student_ids: &[String],
        book_id: &str,
        mode: CountingMode,
    ) -> Result<CohortProgress, LifecycleError> {
        let book = self.catalog.get_book(book_id).await?;
        if !student_ids.is_empty() {
            let confirmed = self.records.find_confirmed_by_book(book_id).await?;
            return Ok(aggregate_cohort(&book, student_ids, &confirmed, mode));
        }

        let all = self
            .records
            .list(&RecordFilter {
                book_id: Some(book_id.to_string()),
                ..RecordFilter::default()
            })
            .await?;
        let mut students: Vec<String> = all.iter().map(|r| r.student_id.clone()).collect();
        students.sort();
        students.dedup();
        Ok(aggregate_cohort(&book, &students, &all, mode))
    }
}

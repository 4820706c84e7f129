use std::io::Write;

use serde::Serialize;

use super::results::SubjectAttainment;

const HEADER: [&str; 9] = [
    "subject",
    "course_outcome",
    "exam_type",
    "method",
    "target_percentage",
    "attainment_percentage",
    "students_assessed",
    "students_meeting_target",
    "target_met",
];

#[derive(Debug, Serialize)]
struct AttainmentRow<'a> {
    subject: &'a str,
    course_outcome: &'a str,
    exam_type: &'a str,
    method: &'a str,
    target_percentage: String,
    attainment_percentage: String,
    students_assessed: usize,
    students_meeting_target: usize,
    target_met: &'a str,
}

/// Writes a header and one CSV row per course outcome, percentages to two decimals.
pub fn write_subject_attainment_csv<W: Write>(
    attainment: &SubjectAttainment,
    writer: W,
) -> Result<(), csv::Error> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(HEADER)?;
    let exam_type = attainment
        .exam_type
        .map(|exam_type| exam_type.label())
        .unwrap_or("all");

    for outcome in &attainment.course_outcomes {
        csv_writer.serialize(AttainmentRow {
            subject: &attainment.subject_code,
            course_outcome: &outcome.code,
            exam_type,
            method: outcome.method.label(),
            target_percentage: format!("{:.2}", outcome.target_percentage),
            attainment_percentage: format!("{:.2}", outcome.attainment_percentage),
            students_assessed: outcome.students_assessed,
            students_meeting_target: outcome.students_meeting_target,
            target_met: if outcome.target_met { "yes" } else { "no" },
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}

use serde::Deserialize;
use std::io::Read;

/// One row of the bulk marks spreadsheet template.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarkUploadRow {
    /// Roll number, or the internal student id.
    #[serde(
        alias = "Student ID",
        alias = "student_identifier",
        alias = "Roll Number",
        alias = "roll_number"
    )]
    pub student_id: String,
    #[serde(alias = "Question No", alias = "Question Number", alias = "question")]
    pub question_number: u32,
    #[serde(alias = "Marks", alias = "Marks Obtained", alias = "marks")]
    pub marks_obtained: f64,
}

pub fn parse_upload<R: Read>(reader: R) -> Result<Vec<MarkUploadRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    csv_reader
        .deserialize::<MarkUploadRow>()
        .collect::<Result<Vec<_>, _>>()
}

//! Parsing of the lines that follow an `enroll` command.
//!
//! The server sends the id first, then the seven metadata fields:
//!
//! ```text
//! id
//! first_name
//! middle_name
//! last_name
//! age
//! gender
//! phone_number
//! address
//! ```

use fingerlink_core::{
    EnrollmentRecord, FingerId, Metadata, Result,
    constants::{ENROLL_REQUEST_LINES, LINE_TERMINATOR},
    error::Error,
};

/// Build an [`EnrollmentRecord`] from the lines following `enroll`.
///
/// The id must be a decimal number in `1..=capacity`. Metadata fields are
/// taken verbatim, but a field holding a line break is refused: it could
/// not be echoed back as a single line.
///
/// # Errors
///
/// Returns an error if the line count is wrong, the id is invalid or a
/// field contains `\r` or `\n`.
///
/// # Examples
///
/// ```
/// use fingerlink_protocol::parse_enrollment;
///
/// let lines = ["7", "Jane", "Q", "Doe", "30", "F", "5551234", "1 Main St"].map(String::from);
/// let record = parse_enrollment(lines, 127).unwrap();
/// assert_eq!(record.id.as_u16(), 7);
/// assert_eq!(record.metadata.last_name, "Doe");
/// ```
pub fn parse_enrollment<I>(lines: I, capacity: u16) -> Result<EnrollmentRecord>
where
    I: IntoIterator<Item = String>,
{
    let lines: Vec<String> = lines.into_iter().collect();
    if lines.len() != ENROLL_REQUEST_LINES {
        return Err(Error::InvalidMessageFormat {
            message: format!(
                "Enrollment needs {ENROLL_REQUEST_LINES} lines, got {}",
                lines.len()
            ),
        });
    }

    if let Some(bad) = lines.iter().find(|l| l.contains(['\r', LINE_TERMINATOR])) {
        return Err(Error::InvalidMessageFormat {
            message: format!("Line break inside enrollment field: {bad:?}"),
        });
    }

    let mut lines = lines.into_iter();
    let id_line = lines
        .next()
        .ok_or_else(|| Error::MissingField("id".to_string()))?;
    let id = FingerId::parse_with_capacity(&id_line, capacity)?;
    let metadata = Metadata::from_fields(lines)?;

    Ok(EnrollmentRecord::new(id, metadata))
}

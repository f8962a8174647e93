//! Line format of the chat log.
//!
//! One record per line, fields joined by the ASCII record separator (0x1E):
//!
//! ```text
//! id <RS> name <RS> comment <RS> nice_count \n
//! ```
//!
//! There is no escaping. Text containing the separator or a line break is
//! rejected before it reaches the file.

use wikichat_types::models::ChatEntry;

use crate::error::RecordError;

pub const SEPARATOR: char = '\u{1e}';

const FIELD_COUNT: usize = 4;

/// Reject text that would break the line format.
pub fn validate_field(field: &'static str, value: &str) -> Result<(), RecordError> {
    if value.contains(|c: char| matches!(c, SEPARATOR | '\n' | '\r')) {
        return Err(RecordError::ForbiddenChar { field });
    }
    Ok(())
}

/// Encode an entry as a single newline-terminated line.
pub fn encode(entry: &ChatEntry) -> Result<String, RecordError> {
    validate_field("name", &entry.author)?;
    validate_field("comment", &entry.body)?;

    let mut line = String::with_capacity(entry.author.len() + entry.body.len() + 24);
    line.push_str(&entry.id.to_string());
    line.push(SEPARATOR);
    line.push_str(&entry.author);
    line.push(SEPARATOR);
    line.push_str(&entry.body);
    line.push(SEPARATOR);
    line.push_str(&entry.nice_count.to_string());
    line.push('\n');
    Ok(line)
}

/// Decode one line, without its trailing newline.
pub fn decode(line: &str) -> Result<ChatEntry, RecordError> {
    let fields: Vec<&str> = line.split(SEPARATOR).collect();
    if fields.len() != FIELD_COUNT {
        return Err(RecordError::FieldCount {
            expected: FIELD_COUNT,
            found: fields.len(),
        });
    }

    Ok(ChatEntry {
        id: parse_number("id", fields[0])?,
        author: fields[1].to_string(),
        body: fields[2].to_string(),
        nice_count: parse_number("nice_count", fields[3])?,
    })
}

fn parse_number(field: &'static str, value: &str) -> Result<u64, RecordError> {
    value.parse().map_err(|_| RecordError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

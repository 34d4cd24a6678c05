//! Response decoding
//!
//! The controller answers every command with one text line. Acknowledgements are
//! opaque; the `Q:` status record is fixed-width and read positionally.

use std::ops::Range;

use super::commands::AxisSelector;
use super::ProtocolError;

/// One line read back from the controller, terminator and trailing
/// whitespace removed. Leading whitespace is kept: status fields are
/// right-aligned and their offsets count it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControllerResponse(String);

impl ControllerResponse {
    /// Decode raw line bytes as Latin-1 and trim the end
    pub fn from_bytes(raw: &[u8]) -> Self {
        let text: String = raw.iter().map(|&b| b as char).collect();
        Self(text.trim_end().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the read timed out with no data
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for ControllerResponse {
    fn from(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }
}

/// Where each selector's data sits in the `Q:` record.
///
/// These character ranges match the controller's reply layout as observed on
/// the bench; they are not taken from firmware documentation.
///
/// | Selector     | Range    | Contents                       |
/// |--------------|----------|--------------------------------|
/// | All          | [0, 21)  | first and second position      |
/// | Axis 1       | [0, 10)  | first position, sign included  |
/// | Axis 2, 3, 4 | [12, 21) | second position, sign skipped  |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusField {
    Record,
    First,
    Second,
}

impl StatusField {
    /// Field shown for a given selector
    pub fn for_axis(axis: AxisSelector) -> Self {
        match axis {
            AxisSelector::All => StatusField::Record,
            AxisSelector::Axis1 => StatusField::First,
            AxisSelector::Axis2 | AxisSelector::Axis3 | AxisSelector::Axis4 => StatusField::Second,
        }
    }

    /// Character range within the record
    pub fn range(&self) -> Range<usize> {
        match self {
            StatusField::Record => 0..21,
            StatusField::First => 0..10,
            StatusField::Second => 12..21,
        }
    }
}

/// Accept any non-empty line as an acknowledgement
pub fn decode_ack(response: ControllerResponse) -> Result<String, ProtocolError> {
    if response.is_empty() {
        return Err(ProtocolError::NoResponse);
    }
    Ok(response.into_string())
}

/// Cut the part of a status record that belongs to `axis`.
///
/// Short records yield whatever characters fall inside the range, which may be
/// nothing at all.
pub fn decode_status(
    response: &ControllerResponse,
    axis: AxisSelector,
) -> Result<String, ProtocolError> {
    if response.is_empty() {
        return Err(ProtocolError::NoResponse);
    }
    let range = StatusField::for_axis(axis).range();
    Ok(response
        .as_str()
        .chars()
        .skip(range.start)
        .take(range.end - range.start)
        .collect())
}

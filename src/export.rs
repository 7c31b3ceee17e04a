//! CSV rendering of extracted data points.

use csv::{QuoteStyle, WriterBuilder};

use crate::error::{DocParserError, Result};
use crate::models::DataPoint;

pub const CSV_FILE_NAME: &str = "extracted_data_points.csv";

/// Render data points as `Field,Value` CSV with every cell quoted.
pub fn data_points_to_csv(data_points: &[DataPoint]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());

    writer
        .write_record(["Field", "Value"])
        .map_err(|e| DocParserError::Export(e.to_string()))?;
    for point in data_points {
        writer
            .write_record([point.field.as_str(), point.value.as_str()])
            .map_err(|e| DocParserError::Export(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| DocParserError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| DocParserError::Export(e.to_string()))
}

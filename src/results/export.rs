//! CSV and ZIP export
//!
//! Exports contain active regions only. Each row is
//! `bbox,text,confidence,image` with the box as `[x1, y1, x2, y2]` and the
//! confidence as a percentage.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::confidence::format_percent;
use super::types::DetectedRegion;
use crate::storage::ImageRef;

pub const CSV_HEADER: [&str; 4] = ["bbox", "text", "confidence", "image"];

/// Export errors
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Render the active regions of one image as CSV
pub fn to_csv(image_ref: &ImageRef, regions: &[DetectedRegion]) -> String {
    let mut out = String::new();
    push_row(&mut out, CSV_HEADER.iter().map(|s| s.to_string()));

    for region in regions.iter().filter(|r| r.is_active()) {
        let b = region.bbox;
        push_row(
            &mut out,
            [
                format!("[{}, {}, {}, {}]", b.x1(), b.y1(), b.x2(), b.y2()),
                region.text.clone(),
                format_percent(region.confidence),
                image_ref.to_string(),
            ],
        );
    }
    out
}

/// Bundle one CSV per image into a ZIP archive
pub fn to_zip<'a, I>(entries: I) -> Result<Vec<u8>, ExportError>
where
    I: IntoIterator<Item = (&'a ImageRef, &'a [DetectedRegion])>,
{
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (image_ref, regions) in entries {
        writer.start_file(format!("{}.csv", image_ref), options)?;
        writer.write_all(to_csv(image_ref, regions).as_bytes())?;
    }

    Ok(writer.finish()?.into_inner())
}

fn push_row<I>(out: &mut String, fields: I)
where
    I: IntoIterator<Item = String>,
{
    let row: Vec<String> = fields.into_iter().map(|f| escape(&f)).collect();
    out.push_str(&row.join(","));
    out.push_str("\r\n");
}

/// Quote a field when it contains a delimiter, quote or line break
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

use crate::domain::model::FileKind;
use crate::utils::error::Result;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub const DEFAULT_DELIMITER: u8 = b',';

// 優先順序：tab > 分號 > 逗號
const DELIMITER_PRIORITY: [u8; 3] = [b'\t', b';', b','];

/// Decides the file kind from the extension alone. Anything but `.csv` is TSV.
pub fn detect_file_format(file_name: &str) -> FileKind {
    let is_csv = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        FileKind::Csv
    } else {
        FileKind::Tsv
    }
}

pub fn delimiter_in_line(line: &[u8]) -> Option<u8> {
    DELIMITER_PRIORITY
        .iter()
        .copied()
        .find(|candidate| line.contains(candidate))
}

/// Looks at the first line only. Falls back to a comma when no known separator shows up.
pub fn detect_delimiter(path: &Path) -> Result<u8> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut first_line = Vec::new();
    reader.read_until(b'\n', &mut first_line)?;

    match delimiter_in_line(&first_line) {
        Some(delimiter) => {
            tracing::debug!(
                "Detected delimiter {:?} for {}",
                delimiter as char,
                path.display()
            );
            Ok(delimiter)
        }
        None => {
            tracing::warn!(
                "⚠️ No known delimiter on the first line of {}, defaulting to ','",
                path.display()
            );
            Ok(DEFAULT_DELIMITER)
        }
    }
}

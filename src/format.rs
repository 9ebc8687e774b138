//! Accepted Word input formats.
//!
//! Uploads are classified by the extension of their original filename only.
//! The bytes are never sniffed: a mislabelled file is passed to the converter
//! and fails there.

use crate::error::ConvertError;

/// A Word document format the service accepts as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Office Open XML package (`.docx`). Converted directly.
    Docx,
    /// Word 97–2003 binary (`.doc`). Normalised to `.docx` first.
    Doc,
}

impl InputFormat {
    /// Classify an uploaded filename. The comparison ignores ASCII case.
    pub fn from_filename(filename: &str) -> Result<Self, ConvertError> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".docx") {
            Ok(InputFormat::Docx)
        } else if lower.ends_with(".doc") {
            Ok(InputFormat::Doc)
        } else {
            Err(ConvertError::UnsupportedInputFormat {
                filename: filename.to_string(),
            })
        }
    }

    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            InputFormat::Docx => "docx",
            InputFormat::Doc => "doc",
        }
    }

    /// Name the upload is stored under inside the workspace.
    pub fn workspace_file_name(self) -> &'static str {
        match self {
            InputFormat::Docx => "input.docx",
            InputFormat::Doc => "input.doc",
        }
    }

    /// `true` if the format must go through the legacy pre-converter.
    pub fn is_legacy(self) -> bool {
        matches!(self, InputFormat::Doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_filename() {
        assert_eq!(InputFormat::from_filename("report.docx").unwrap(), InputFormat::Docx);
        assert_eq!(InputFormat::from_filename("report.doc").unwrap(), InputFormat::Doc);
        assert_eq!(InputFormat::from_filename("REPORT.DOCX").unwrap(), InputFormat::Docx);
        assert_eq!(InputFormat::from_filename("my.notes.Doc").unwrap(), InputFormat::Doc);
    }

    #[test]
    fn test_rejects_other_extensions() {
        for name in ["notes.txt", "report.docx.txt", "report.pdf", "docx", ""] {
            let err = InputFormat::from_filename(name).unwrap_err();
            assert!(
                matches!(err, ConvertError::UnsupportedInputFormat { .. }),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_workspace_names() {
        assert_eq!(InputFormat::Docx.workspace_file_name(), "input.docx");
        assert_eq!(InputFormat::Doc.workspace_file_name(), "input.doc");
        assert!(InputFormat::Doc.is_legacy());
        assert!(!InputFormat::Docx.is_legacy());
        assert_eq!(InputFormat::Doc.extension(), "doc");
    }
}

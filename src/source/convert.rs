//! Input format routing and the office-to-PDF converter seam.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by an office-to-PDF converter.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Converter backend failed to produce PDF bytes.
    #[error("Conversion failed: {0}")]
    Failed(String),
}

/// Recognized input document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Already a PDF; processed directly.
    Pdf,
    /// Word document; converted to PDF first.
    Docx,
    /// Spreadsheet; converted to PDF first.
    Xlsx,
    /// Presentation; converted to PDF first.
    Pptx,
}

impl SourceFormat {
    /// Determine the format from a file name's extension.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "xlsx" => Some(Self::Xlsx),
            "pptx" => Some(Self::Pptx),
            _ => None,
        }
    }

    /// Whether the format must be routed through the converter collaborator.
    pub fn needs_conversion(self) -> bool {
        !matches!(self, Self::Pdf)
    }
}

/// External collaborator turning office documents into PDF bytes.
#[async_trait]
pub trait OfficeConverter: Send + Sync {
    /// Convert the document bytes to PDF.
    async fn convert_to_pdf(
        &self,
        bytes: &[u8],
        format: SourceFormat,
    ) -> Result<Vec<u8>, ConvertError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_known_extensions() {
        assert_eq!(SourceFormat::from_file_name("a.pdf"), Some(SourceFormat::Pdf));
        assert_eq!(
            SourceFormat::from_file_name("Report.DOCX"),
            Some(SourceFormat::Docx)
        );
        assert_eq!(
            SourceFormat::from_file_name("deck.pptx"),
            Some(SourceFormat::Pptx)
        );
        assert_eq!(
            SourceFormat::from_file_name("sheet.xlsx"),
            Some(SourceFormat::Xlsx)
        );
    }

    #[test]
    fn rejects_unknown_extensions() {
        assert_eq!(SourceFormat::from_file_name("notes.txt"), None);
        assert_eq!(SourceFormat::from_file_name("no-extension"), None);
    }

    #[test]
    fn only_pdf_skips_conversion() {
        assert!(!SourceFormat::Pdf.needs_conversion());
        assert!(SourceFormat::Docx.needs_conversion());
        assert!(SourceFormat::Xlsx.needs_conversion());
        assert!(SourceFormat::Pptx.needs_conversion());
    }
}

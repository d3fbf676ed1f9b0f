//! Pre-upload checks on candidate files.

use bytes::Bytes;
use thiserror::Error;

/// The only content type accepted for asset documents.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Reasons a candidate file is rejected. `Display` is user-facing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Declared content type is not PDF.
    #[error("Only PDF files are allowed (got '{content_type}')")]
    InvalidContentType {
        /// The declared content type.
        content_type: String,
    },

    /// File exceeds the size limit.
    #[error("File is too large: {size} bytes exceeds the {max} byte limit")]
    FileTooLarge {
        /// Actual file size.
        size: u64,
        /// Maximum allowed size.
        max: u64,
    },
}

/// A file picked for upload.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    /// Name supplied by the client. Never used in the storage path.
    pub file_name: String,
    /// Declared content type.
    pub content_type: String,
    /// File contents.
    pub data: Bytes,
}

impl CandidateFile {
    /// Create a candidate file.
    #[must_use]
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Content-type and size policy for documents.
#[derive(Debug, Clone, Copy)]
pub struct DocumentValidator {
    max_size: u64,
}

impl DocumentValidator {
    /// Create a validator with the given size limit in bytes.
    #[must_use]
    pub const fn new(max_size: u64) -> Self {
        Self { max_size }
    }

    /// Size limit in bytes.
    #[must_use]
    pub const fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Check `file` against the policy.
    ///
    /// A file of exactly the limit is accepted.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn validate(&self, file: &CandidateFile) -> Result<(), ValidationError> {
        if file.content_type != PDF_CONTENT_TYPE {
            return Err(ValidationError::InvalidContentType {
                content_type: file.content_type.clone(),
            });
        }

        let size = file.size();
        if size > self.max_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_size,
            });
        }

        Ok(())
    }
}

impl Default for DocumentValidator {
    fn default() -> Self {
        Self::new(assetdoc_shared::DocumentSettings::DEFAULT_MAX_FILE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const MIB: usize = 1024 * 1024;

    fn pdf(size: usize) -> CandidateFile {
        CandidateFile::new("doc.pdf", PDF_CONTENT_TYPE, vec![0u8; size])
    }

    #[test]
    fn test_accepts_exact_limit() {
        let validator = DocumentValidator::default();
        assert!(validator.validate(&pdf(10 * MIB)).is_ok());
    }

    #[test]
    fn test_rejects_one_byte_over() {
        let validator = DocumentValidator::default();
        let err = validator.validate(&pdf(10 * MIB + 1)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::FileTooLarge {
                size: 10_485_761,
                max: 10_485_760,
            }
        );
    }

    #[test]
    fn test_rejects_twelve_mib() {
        let err = DocumentValidator::default()
            .validate(&pdf(12 * MIB))
            .unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[rstest]
    #[case("image/png")]
    #[case("application/PDF")]
    #[case("application/pdf; charset=binary")]
    #[case("")]
    fn test_rejects_content_type(#[case] content_type: &str) {
        let file = CandidateFile::new("doc.pdf", content_type, vec![0u8; 16]);
        assert!(matches!(
            DocumentValidator::default().validate(&file),
            Err(ValidationError::InvalidContentType { .. })
        ));
    }

    #[test]
    fn test_empty_pdf_is_accepted() {
        assert!(DocumentValidator::default().validate(&pdf(0)).is_ok());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_size_limit(max in 1usize..4096, size in 0usize..8192) {
            let validator = DocumentValidator::new(max as u64);
            let file = CandidateFile::new("f.pdf", PDF_CONTENT_TYPE, vec![0u8; size]);
            let result = validator.validate(&file);

            if size <= max {
                prop_assert!(result.is_ok());
            } else {
                let is_too_large = matches!(result, Err(ValidationError::FileTooLarge { .. }));
                prop_assert!(is_too_large, "Expected FileTooLarge error");
            }
        }
    }

    proptest! {
        #[test]
        fn prop_only_pdf_content_type(content_type in "[a-z]+/[a-z0-9.+-]+") {
            let file = CandidateFile::new("f.pdf", content_type.clone(), vec![0u8; 8]);
            let result = DocumentValidator::default().validate(&file);
            prop_assert_eq!(result.is_ok(), content_type == PDF_CONTENT_TYPE);
        }
    }
}

//! Document folders, asset ids and storage paths.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::StorageError;

/// File extension every stored document carries.
pub const DOCUMENT_EXTENSION: &str = ".pdf";

/// Maximum length of an asset id.
pub const MAX_ASSET_ID_LEN: usize = 128;

/// Folder a document is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFolder {
    /// Insurance policies.
    Insurance,
    /// Warranty certificates.
    Warranty,
    /// Everything else.
    Documents,
}

impl DocumentFolder {
    /// All folders.
    pub const ALL: [Self; 3] = [Self::Insurance, Self::Warranty, Self::Documents];

    /// Path segment for this folder.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insurance => "insurance",
            Self::Warranty => "warranty",
            Self::Documents => "documents",
        }
    }

    /// Parse from a path segment.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "insurance" => Some(Self::Insurance),
            "warranty" => Some(Self::Warranty),
            "documents" => Some(Self::Documents),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of the physical asset owning a document.
///
/// Non-empty, at most [`MAX_ASSET_ID_LEN`] characters of ASCII alphanumerics,
/// `-` and `_`. The restriction keeps the id safe as a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId(String);

impl AssetId {
    /// Validate and wrap an asset id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] for an empty, overlong or
    /// non-conforming id.
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        if s.is_empty() {
            return Err(StorageError::invalid_key("asset id is empty"));
        }
        if s.len() > MAX_ASSET_ID_LEN {
            return Err(StorageError::invalid_key(format!(
                "asset id longer than {MAX_ASSET_ID_LEN} characters"
            )));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(StorageError::invalid_key(format!(
                "asset id '{s}' contains unsupported characters"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AssetId {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AssetId> for String {
    fn from(value: AssetId) -> Self {
        value.0
    }
}

/// Location of a stored document: `{folder}/{asset_id}/{uuid}.pdf`.
///
/// A fresh v4 UUID is generated per upload, so paths never collide and are
/// never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoragePath {
    folder: DocumentFolder,
    asset_id: AssetId,
    id: Uuid,
    path: String,
}

impl StoragePath {
    /// Generate a new path for a document of `asset_id` in `folder`.
    #[must_use]
    pub fn generate(folder: DocumentFolder, asset_id: &AssetId) -> Self {
        Self::from_parts(folder, asset_id.clone(), Uuid::new_v4())
    }

    fn from_parts(folder: DocumentFolder, asset_id: AssetId, id: Uuid) -> Self {
        let path = format!("{folder}/{asset_id}/{id}{DOCUMENT_EXTENSION}");
        Self {
            folder,
            asset_id,
            id,
            path,
        }
    }

    /// Parse a path produced by [`StoragePath::generate`].
    ///
    /// Anything else, including traversal segments and foreign prefixes, is
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] when `s` does not have the
    /// `{folder}/{asset_id}/{uuid}.pdf` shape.
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        let invalid = || StorageError::invalid_key(format!("'{s}' is not a document path"));

        let mut segments = s.split('/');
        let (Some(folder), Some(asset_id), Some(file), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(invalid());
        };

        let folder = DocumentFolder::parse(folder).ok_or_else(invalid)?;
        let asset_id = AssetId::parse(asset_id).map_err(|_| invalid())?;
        let stem = file.strip_suffix(DOCUMENT_EXTENSION).ok_or_else(invalid)?;
        let id = Uuid::try_parse(stem).map_err(|_| invalid())?;

        // Only the canonical lowercase hyphenated form is ever generated.
        if id.to_string() != stem {
            return Err(invalid());
        }

        Ok(Self::from_parts(folder, asset_id, id))
    }

    /// The full path string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Folder segment.
    #[must_use]
    pub fn folder(&self) -> DocumentFolder {
        self.folder
    }

    /// Owning asset.
    #[must_use]
    pub fn asset_id(&self) -> &AssetId {
        &self.asset_id
    }

    /// Random document id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl TryFrom<String> for StoragePath {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StoragePath> for String {
    fn from(value: StoragePath) -> Self {
        value.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn asset(s: &str) -> AssetId {
        AssetId::parse(s).expect("valid asset id")
    }

    #[test]
    fn test_folder_round_trip() {
        for folder in DocumentFolder::ALL {
            assert_eq!(DocumentFolder::parse(folder.as_str()), Some(folder));
        }
        assert_eq!(DocumentFolder::parse("Insurance"), None);
        assert_eq!(DocumentFolder::parse("photos"), None);
    }

    #[rstest]
    #[case("A1")]
    #[case("pump-7")]
    #[case("site_3-unit_12")]
    fn test_asset_id_accepts(#[case] input: &str) {
        assert_eq!(asset(input).as_str(), input);
    }

    #[rstest]
    #[case("")]
    #[case("..")]
    #[case("a/b")]
    #[case("a b")]
    #[case("résumé")]
    fn test_asset_id_rejects(#[case] input: &str) {
        assert!(matches!(
            AssetId::parse(input),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_asset_id_length_limit() {
        assert!(AssetId::parse(&"a".repeat(MAX_ASSET_ID_LEN)).is_ok());
        assert!(AssetId::parse(&"a".repeat(MAX_ASSET_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_generate_format() {
        let path = StoragePath::generate(DocumentFolder::Documents, &asset("A1"));
        let s = path.as_str();
        assert!(s.starts_with("documents/A1/"));
        assert!(s.ends_with(".pdf"));
        assert_eq!(path.folder(), DocumentFolder::Documents);
        assert_eq!(path.asset_id().as_str(), "A1");
    }

    #[test]
    fn test_generate_is_unique() {
        let a = asset("A1");
        let first = StoragePath::generate(DocumentFolder::Warranty, &a);
        let second = StoragePath::generate(DocumentFolder::Warranty, &a);
        assert_ne!(first, second);
    }

    #[test]
    fn test_parse_accepts_generated() {
        let path = StoragePath::generate(DocumentFolder::Insurance, &asset("A1"));
        let parsed = StoragePath::parse(path.as_str()).expect("generated path parses");
        assert_eq!(parsed, path);
    }

    #[rstest]
    #[case("")]
    #[case("documents/A1")]
    #[case("documents/A1/notes.pdf")]
    #[case("photos/A1/550e8400-e29b-41d4-a716-446655440000.pdf")]
    #[case("documents/../550e8400-e29b-41d4-a716-446655440000.pdf")]
    #[case("documents/A1/550e8400-e29b-41d4-a716-446655440000.PDF")]
    #[case("documents/A1/550E8400-E29B-41D4-A716-446655440000.pdf")]
    #[case("documents/A1/550e8400-e29b-41d4-a716-446655440000.pdf/x")]
    #[case("/documents/A1/550e8400-e29b-41d4-a716-446655440000.pdf")]
    fn test_parse_rejects(#[case] input: &str) {
        assert!(matches!(
            StoragePath::parse(input),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_serde_as_string() {
        let path = StoragePath::parse("warranty/A1/550e8400-e29b-41d4-a716-446655440000.pdf")
            .expect("valid path");
        let json = serde_json::to_string(&path).expect("serialize");
        assert_eq!(
            json,
            "\"warranty/A1/550e8400-e29b-41d4-a716-446655440000.pdf\""
        );
        let back: StoragePath = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, path);
    }
}

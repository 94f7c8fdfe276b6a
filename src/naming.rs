//! Centralized filename convention for source assets and derived files.
//!
//! Every stored asset is addressed by a `/`-separated key such as
//! `profile_photos/2025/08/4f1c9e.png`. The file stem (`4f1c9e`) is the
//! asset's identity and is carried into every derived file:
//!
//! - `{stem}.jpg`: normalized original
//! - `{stem}__{label}.jpg`: raster variant
//! - `{stem}__{label}.avif`: secondary variant
//!
//! Derived files live next to the source (same directory / key prefix).
//! A stem containing the `__` separator is always a derived file and never a
//! processing source.

use crate::imaging::{OutputFormat, VariantLabel};

/// Separator between the asset stem and the variant label.
pub const VARIANT_SEPARATOR: &str = "__";

/// Result of parsing a storage key like `uploads/2025/abc.png`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetKey {
    /// Directory prefix without trailing slash. Empty for top-level keys.
    pub dir: String,
    /// File name without extension.
    pub stem: String,
    /// Extension without the dot, as written. Empty if none.
    pub ext: String,
}

impl AssetKey {
    /// Parse a storage key. Backslashes are treated as separators so keys
    /// built from Windows paths still split correctly.
    pub fn parse(key: &str) -> Self {
        let key = key.replace('\\', "/");
        let (dir, file) = match key.rfind('/') {
            Some(pos) => (&key[..pos], &key[pos + 1..]),
            None => ("", key.as_str()),
        };
        let (stem, ext) = match file.rfind('.') {
            Some(pos) if pos > 0 => (&file[..pos], &file[pos + 1..]),
            _ => (file, ""),
        };
        Self {
            dir: dir.to_string(),
            stem: stem.to_string(),
            ext: ext.to_string(),
        }
    }

    /// Key of a file with the given name in the same directory.
    pub fn sibling(&self, file_name: &str) -> String {
        if self.dir.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.dir, file_name)
        }
    }

    /// Entity identity: directory plus stem, extension dropped. Stable across
    /// normalization (`abc.png` and `abc.jpg` share an id).
    pub fn id(&self) -> String {
        self.sibling(&self.stem)
    }

    /// Whether this key names a derived file rather than a source.
    pub fn is_derived(&self) -> bool {
        self.stem.contains(VARIANT_SEPARATOR)
    }
}

/// File name of the normalized original for `stem`.
pub fn normalized_name(stem: &str) -> String {
    format!("{}.{}", stem, OutputFormat::Jpeg.extension())
}

/// File name of one variant/format pair for `stem`.
pub fn variant_name(stem: &str, label: VariantLabel, format: OutputFormat) -> String {
    format!(
        "{}{}{}.{}",
        stem,
        VARIANT_SEPARATOR,
        label,
        format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_nested_key() {
        let k = AssetKey::parse("profile_photos/2025/08/abc123.png");
        assert_eq!(k.dir, "profile_photos/2025/08");
        assert_eq!(k.stem, "abc123");
        assert_eq!(k.ext, "png");
    }

    #[test]
    fn parse_top_level_key() {
        let k = AssetKey::parse("abc.jpeg");
        assert_eq!(k.dir, "");
        assert_eq!(k.stem, "abc");
        assert_eq!(k.ext, "jpeg");
    }

    #[test]
    fn parse_without_extension() {
        let k = AssetKey::parse("blog/cover");
        assert_eq!(k.stem, "cover");
        assert_eq!(k.ext, "");
    }

    #[test]
    fn parse_dotfile_keeps_name_as_stem() {
        let k = AssetKey::parse("dir/.hidden");
        assert_eq!(k.stem, ".hidden");
        assert_eq!(k.ext, "");
    }

    #[test]
    fn parse_multiple_dots_splits_on_last() {
        let k = AssetKey::parse("gallery/img.v2.webp");
        assert_eq!(k.stem, "img.v2");
        assert_eq!(k.ext, "webp");
    }

    #[test]
    fn parse_backslash_separators() {
        let k = AssetKey::parse(r"gallery\2024\pic.jpg");
        assert_eq!(k.dir, "gallery/2024");
        assert_eq!(k.stem, "pic");
    }

    #[test]
    fn sibling_in_same_directory() {
        let k = AssetKey::parse("gallery/7/pic.png");
        assert_eq!(k.sibling("pic.jpg"), "gallery/7/pic.jpg");
        assert_eq!(AssetKey::parse("pic.png").sibling("pic.jpg"), "pic.jpg");
    }

    #[test]
    fn id_drops_extension() {
        assert_eq!(AssetKey::parse("gallery/7/pic.png").id(), "gallery/7/pic");
        assert_eq!(
            AssetKey::parse("gallery/7/pic.png").id(),
            AssetKey::parse("gallery/7/pic.jpg").id()
        );
    }

    #[test]
    fn derived_files_are_detected() {
        assert!(AssetKey::parse("g/pic__thumb.jpg").is_derived());
        assert!(AssetKey::parse("g/pic__xlarge.avif").is_derived());
        assert!(!AssetKey::parse("g/pic_thumb.jpg").is_derived());
    }

    #[test]
    fn derived_names() {
        assert_eq!(normalized_name("abc"), "abc.jpg");
        assert_eq!(
            variant_name("abc", VariantLabel::Thumb, OutputFormat::Jpeg),
            "abc__thumb.jpg"
        );
        assert_eq!(
            variant_name("abc", VariantLabel::Xlarge, OutputFormat::Avif),
            "abc__xlarge.avif"
        );
    }
}

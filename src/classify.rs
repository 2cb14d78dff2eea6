//! File type classification from file names and MIME types.

use crate::record::FileType;

const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "ico"];
const VIDEO_EXTENSIONS: [&str; 8] = ["mp4", "avi", "mov", "wmv", "flv", "mkv", "webm", "m4v"];
const AUDIO_EXTENSIONS: [&str; 7] = ["mp3", "wav", "flac", "aac", "ogg", "m4a", "wma"];
const DOCUMENT_EXTENSIONS: [&str; 9] = [
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "rtf",
];

/// Maps a file name and optional MIME type to a [`FileType`].
///
/// Categories are checked in the order image, video, audio, document; each
/// matches on its extension set or its MIME rule. Anything else is
/// [`FileType::File`].
#[must_use]
pub fn classify(filename: &str, mime_type: Option<&str>) -> FileType {
    let ext = extension_of(filename);
    let mime = mime_type.unwrap_or_default();

    if IMAGE_EXTENSIONS.contains(&ext.as_str()) || mime.starts_with("image/") {
        return FileType::Image;
    }
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) || mime.starts_with("video/") {
        return FileType::Video;
    }
    if AUDIO_EXTENSIONS.contains(&ext.as_str()) || mime.starts_with("audio/") {
        return FileType::Audio;
    }
    if DOCUMENT_EXTENSIONS.contains(&ext.as_str())
        || mime.contains("document")
        || mime.contains("pdf")
    {
        return FileType::Document;
    }
    FileType::File
}

/// Lower-cased text after the last dot (the whole name when there is none).
fn extension_of(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_extension_is_case_insensitive() {
        assert_eq!(classify("Photo.JPG", None), FileType::Image);
        assert_eq!(classify("clip.MkV", None), FileType::Video);
        assert_eq!(classify("song.flac", None), FileType::Audio);
        assert_eq!(classify("sheet.xlsx", None), FileType::Document);
    }

    #[test]
    fn test_classify_falls_back_to_mime() {
        assert_eq!(classify("blob", Some("image/avif")), FileType::Image);
        assert_eq!(classify("stream", Some("video/mp2t")), FileType::Video);
        assert_eq!(classify("track", Some("audio/opus")), FileType::Audio);
        assert_eq!(
            classify(
                "export",
                Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
            ),
            FileType::Document
        );
        assert_eq!(classify("scan", Some("application/pdf")), FileType::Document);
    }

    #[test]
    fn test_classify_category_order_wins_over_later_mime() {
        // Image extension beats a document MIME.
        assert_eq!(classify("cover.png", Some("application/pdf")), FileType::Image);
    }

    #[test]
    fn test_classify_unknown_is_generic_file() {
        assert_eq!(classify("archive.zip", Some("application/zip")), FileType::File);
        assert_eq!(classify("", None), FileType::File);
    }

    #[test]
    fn test_classify_name_without_dot_uses_whole_name() {
        assert_eq!(classify("pdf", None), FileType::Document);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_classify_is_idempotent(name in ".{0,40}", mime in proptest::option::of("[a-z]{1,8}/[a-z0-9.+-]{1,12}")) {
                let first = classify(&name, mime.as_deref());
                let second = classify(&name, mime.as_deref());
                prop_assert_eq!(first, second);
            }
        }
    }
}

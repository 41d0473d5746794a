//! Output naming constants.

/// Extension of every exported file.
pub const OUTPUT_EXTENSION: &str = ".mp4";

/// Name used when the user leaves the output name blank.
pub const DEFAULT_OUTPUT_NAME: &str = "Untitled music video";

/// Appended to the audio file stem to build the suggested output name.
pub const SUGGESTED_NAME_SUFFIX: &str = " music video";

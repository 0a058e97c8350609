//! The fixed set of plugins exercised by the regression run.

use core::fmt;

/// Video plugins under test, in the order they are run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VideoPlugin {
    GlN64,
    Glide64,
    RiceVideo,
}

impl VideoPlugin {
    pub const ALL: [Self; 3] = [Self::GlN64, Self::Glide64, Self::RiceVideo];

    /// Shared library file name inside the `plugins/` build directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::GlN64 => "glN64.so",
            Self::Glide64 => "glide64.so",
            Self::RiceVideo => "ricevideo.so",
        }
    }

    /// Directory name used under `current/`, `reference/` and the archive.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::GlN64 => "glN64",
            Self::Glide64 => "glide64",
            Self::RiceVideo => "ricevideo",
        }
    }

    /// Whether any of the (lower-cased) skip tags is a substring of the file name.
    #[must_use]
    pub fn is_skipped_by(self, skip_tags: &[String]) -> bool {
        let file_name = self.file_name().to_lowercase();
        skip_tags
            .iter()
            .any(|tag| file_name.contains(tag.to_lowercase().as_str()))
    }
}

impl fmt::Display for VideoPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Audio plugin loaded for every test run.
pub const AUDIO_PLUGIN: &str = "dummyaudio.so";
/// Input plugin loaded for every test run.
pub const INPUT_PLUGIN: &str = "blight_input.so";
/// RSP plugin loaded for every test run.
pub const RSP_PLUGIN: &str = "mupen64_hle_rsp_azimer.so";

/// Emulator executable produced in the root of the source tree.
pub const EMULATOR_BIN: &str = "mupen64plus";

/// Every library the video build must leave in `plugins/`.
pub const REQUIRED_LIBS: [&str; 8] = [
    INPUT_PLUGIN,
    AUDIO_PLUGIN,
    "dummyvideo.so",
    "glN64.so",
    "glide64.so",
    "ricevideo.so",
    RSP_PLUGIN,
    "jttl_audio.so",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_name_is_file_stem() {
        for plugin in VideoPlugin::ALL {
            let stem = plugin.file_name().split('.').next().unwrap_or_default();
            assert_eq!(stem, plugin.dir_name());
            assert!(REQUIRED_LIBS.contains(&plugin.file_name()));
        }
    }

    #[test]
    fn skip_tags_match_case_insensitively() {
        let tags = vec!["RiceVideo".to_owned()];
        assert!(VideoPlugin::RiceVideo.is_skipped_by(&tags));
        assert!(!VideoPlugin::GlN64.is_skipped_by(&tags));

        let partial = vec!["glide".to_owned()];
        assert!(VideoPlugin::Glide64.is_skipped_by(&partial));
        assert!(!VideoPlugin::Glide64.is_skipped_by(&[]));
    }
}

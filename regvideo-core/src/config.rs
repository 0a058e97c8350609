//! Regression test configuration.
//!
//! The config file is a flat list of `key = value` lines. Keys before the
//! first `[RomFile.z64]` header belong to the general section, keys after a
//! header belong to that game. Parsing never fails on content: malformed
//! lines and duplicates become report warnings. Only a missing file or a
//! missing `rompath` is fatal.

use crate::report::Report;
use core::fmt;
use std::path::{Path, PathBuf};

/// Default config file name, looked up relative to the test root.
pub const DEFAULT_CONFIG_FILE: &str = "daily-tests.cfg";

/// Repository checked out when `svnrepo` is not configured.
pub const DEFAULT_SVN_REPO: &str = "svn://fascination.homelinux.net:7684/mupen64plus/trunk";

/// Recipients shorter than this are treated as "no email configured".
const MIN_EMAIL_LEN: usize = 5;

#[derive(Debug)]
pub enum Error {
    Io { path: PathBuf, source: std::io::Error },
    /// The recipient is kept so the failure can still be mailed.
    MissingRomPath { send_email: Option<String> },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read '{}': {source}", path.display()),
            Self::MissingRomPath { .. } => write!(f, "rompath is not given in config file"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::MissingRomPath { .. } => None,
        }
    }
}

impl Error {
    /// Report recipient configured in a file that failed validation.
    #[must_use]
    pub fn recipient(&self) -> Option<&str> {
        match self {
            Self::MissingRomPath { send_email } => send_email.as_deref(),
            Self::Io { .. } => None,
        }
    }
}

/// Ordered key/value pairs of one config scope. Keys are lower-case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    entries: Vec<(String, String)>,
}

impl Section {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Inserts a pair unless the key already exists. Returns whether it was inserted.
    pub fn insert(&mut self, key: String, value: String) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.entries.push((key, value));
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of the line-oriented parse, before schema validation.
#[derive(Debug, Clone, Default)]
pub struct RawConfig {
    pub general: Section,
    /// Game sections in file order.
    pub games: Vec<(String, Section)>,
}

impl RawConfig {
    #[must_use]
    pub fn game(&self, name: &str) -> Option<&Section> {
        self.games.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }
}

/// Parses config text. `source` only appears in warnings.
pub fn parse(text: &str, source: &str, report: &mut Report) -> RawConfig {
    #[derive(Clone, Copy)]
    enum Scope {
        General,
        Game(usize),
        // Keys under a repeated header have nowhere to go.
        Discarded,
    }

    let mut raw = RawConfig::default();
    let mut scope = Scope::General;

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            if raw.games.iter().any(|(n, _)| n == name) {
                report.warning(format_args!(
                    "Config file '{source}' contains duplicate game entry '{name}'"
                ));
                scope = Scope::Discarded;
            } else {
                raw.games.push((name.to_owned(), Section::default()));
                scope = Scope::Game(raw.games.len() - 1);
            }
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            report.warning(format_args!(
                "Config file '{source}' contains unrecognized line: '{line}'"
            ));
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim().to_owned();

        let (owner, section) = match scope {
            Scope::General => ("general section".to_owned(), &mut raw.general),
            Scope::Game(index) => {
                let (name, section) = &mut raw.games[index];
                (format!("Game '{name}'"), section)
            }
            Scope::Discarded => continue,
        };
        if !section.insert(key.clone(), value) {
            report.warning(format_args!("{owner} contains duplicate key '{key}'"));
        }
    }

    raw
}

/// Frame numbers at which the emulator takes screenshots for one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShotList {
    /// No `screenshots` key for the game.
    Missing,
    /// The list contains an entry that is not a non-negative integer.
    Invalid(String),
    Frames(Vec<u32>),
}

impl ShotList {
    fn parse(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::Missing;
        };
        value
            .split(',')
            .map(|frame| frame.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_or_else(|_| Self::Invalid(value.to_owned()), Self::Frames)
    }

    /// Frames to capture, or `None` when the list is unusable (empty or just `0`).
    #[must_use]
    pub fn usable_frames(&self) -> Option<&[u32]> {
        match self {
            Self::Frames(frames) if !frames.is_empty() && frames.as_slice() != [0] => {
                Some(frames)
            }
            _ => None,
        }
    }
}

/// A named `make` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    pub name: String,
    pub params: String,
}

/// Validated general section.
#[derive(Debug, Clone)]
pub struct GeneralConfig {
    pub rom_path: PathBuf,
    pub test_builds: Vec<BuildSpec>,
    pub video_build: BuildSpec,
    pub send_email: Option<String>,
    pub svn_repo: String,
    /// Every general key as written, including the ones above.
    pub params: Section,
}

/// Validated game section.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// ROM file name, relative to `rompath`.
    pub rom: String,
    pub shots: ShotList,
    /// Lower-cased plugin name fragments to skip.
    pub skip_video: Vec<String>,
    pub params: Section,
}

/// The whole validated configuration.
#[derive(Debug, Clone)]
pub struct TestPlan {
    pub general: GeneralConfig,
    pub games: Vec<GameConfig>,
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| v.split(',').map(|item| item.trim().to_owned()).collect())
        .unwrap_or_default()
}

fn recipient(general: &Section) -> Option<String> {
    general
        .get("sendemail")
        .filter(|addr| addr.len() >= MIN_EMAIL_LEN)
        .map(str::to_owned)
}

impl GeneralConfig {
    /// Whether `testbuilds` and `testbuildparams` name the same number of builds.
    ///
    /// Extra entries of the longer list are not in `test_builds`.
    #[must_use]
    pub fn test_build_lists_match(&self) -> bool {
        split_list(self.params.get("testbuilds")).len()
            == split_list(self.params.get("testbuildparams")).len()
    }
}

impl TestPlan {
    /// Validates a parsed config against the known schema.
    pub fn from_raw(raw: RawConfig, report: &mut Report) -> Result<Self, Error> {
        let general = &raw.general;

        let send_email = recipient(general);
        let Some(rom_path) = general.get("rompath") else {
            let err = Error::MissingRomPath { send_email };
            report.error(&err);
            return Err(err);
        };

        let names = split_list(general.get("testbuilds"));
        let params = split_list(general.get("testbuildparams"));
        let test_builds = names
            .into_iter()
            .zip(params)
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, params)| BuildSpec { name, params })
            .collect();

        let video_build = BuildSpec {
            name: general.get("videobuild").unwrap_or("default").to_owned(),
            params: general.get("videobuildparams").unwrap_or_default().to_owned(),
        };

        let general_config = GeneralConfig {
            rom_path: PathBuf::from(rom_path),
            test_builds,
            video_build,
            send_email,
            svn_repo: general.get("svnrepo").unwrap_or(DEFAULT_SVN_REPO).to_owned(),
            params: raw.general.clone(),
        };

        let games = raw
            .games
            .into_iter()
            .map(|(rom, params)| GameConfig {
                shots: ShotList::parse(params.get("screenshots")),
                skip_video: split_list(params.get("skipvideo"))
                    .into_iter()
                    .filter(|tag| !tag.is_empty())
                    .map(|tag| tag.to_lowercase())
                    .collect(),
                rom,
                params,
            })
            .collect();

        Ok(Self {
            general: general_config,
            games,
        })
    }

    #[must_use]
    pub fn game(&self, rom: &str) -> Option<&GameConfig> {
        self.games.iter().find(|game| game.rom == rom)
    }
}

/// Reads, parses and validates the config file at `path`.
pub fn load(path: &Path, report: &mut Report) -> Result<TestPlan, Error> {
    report.blank();
    report.line("Loading regression test configuration.");

    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(source) => {
            report.failure(format!("Error in LoadConfig(): {source}"));
            return Err(Error::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let source = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    let raw = parse(&text, &source, report);
    let plan = TestPlan::from_raw(raw, report)?;
    tracing::debug!(
        games = plan.games.len(),
        test_builds = plan.general.test_builds.len(),
        "config loaded"
    );
    Ok(plan)
}

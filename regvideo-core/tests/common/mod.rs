//! Fakes shared by the integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use regvideo_core::{compare::SimilarityTool, mail::MailTransport};
use std::{
    cell::RefCell,
    io,
    path::{Path, PathBuf},
};

/// Scores byte-identical images as `inf` and anything else as 12.5 dB.
///
/// Like ImageMagick, always leaves a difference image behind.
pub struct ByteCompare;

impl SimilarityTool for ByteCompare {
    fn psnr(&self, reference: &Path, current: &Path, diff: &Path) -> io::Result<String> {
        std::fs::write(diff, b"diff")?;
        if std::fs::read(reference)? == std::fs::read(current)? {
            Ok("inf".to_owned())
        } else {
            Ok("12.5".to_owned())
        }
    }
}

/// Returns the same text for every comparison.
pub struct FixedScore(pub &'static str);

impl SimilarityTool for FixedScore {
    fn psnr(&self, _reference: &Path, _current: &Path, diff: &Path) -> io::Result<String> {
        std::fs::write(diff, b"diff")?;
        Ok(self.0.to_owned())
    }
}

#[derive(Default)]
pub struct Outbox {
    pub sent: RefCell<Vec<String>>,
}

impl MailTransport for Outbox {
    fn send(&self, message: &str) -> io::Result<()> {
        self.sent.borrow_mut().push(message.to_owned());
        Ok(())
    }
}

#[must_use]
pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()
}

/// Writes `files` into `dir`, creating it first.
pub fn write_files(dir: &Path, files: &[(&str, &[u8])]) {
    std::fs::create_dir_all(dir).unwrap();
    for (name, contents) in files {
        std::fs::write(dir.join(name), contents).unwrap();
    }
}

#[must_use]
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Writes an executable shell script.
#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Stand-in emulator: writes `<rom stem>-<frame>.png` into `--sshotdir` for
/// every frame in `--testshots`, and records its arguments in `calls.log`.
pub const FAKE_EMULATOR: &str = r#"
log="$(dirname "$0")/calls.log"
echo "$*" >> "$log"
shots=""
dir=""
rom=""
while [ $# -gt 0 ]; do
    case "$1" in
        --nogui|--noosd|--noask) shift ;;
        --testshots) shots="$2"; shift 2 ;;
        --sshotdir) dir="$2"; shift 2 ;;
        --*) shift 2 ;;
        *) rom="$1"; shift ;;
    esac
done
name=$(basename "$rom" .z64)
for frame in $(echo "$shots" | tr ',' ' '); do
    printf '%s frame %s\n' "$name" "$frame" > "$dir/$name-$frame.png"
done
"#;

/// Stand-in emulator that never finishes on its own.
pub const HANGING_EMULATOR: &str = r#"
echo "$*" >> "$(dirname "$0")/calls.log"
exec sleep 30
"#;

/// Creates a test root with a ROM directory and the given emulator script.
/// Returns the ROM directory.
#[cfg(unix)]
pub fn prepare_root(root: &Path, emulator: &str) -> PathBuf {
    write_script(&root.join("source/mupen64plus"), emulator);
    let roms = root.join("roms");
    write_files(&roms, &[("foo.z64", b"rom")]);
    roms
}

/// Emulator invocations recorded by the fake emulators.
#[must_use]
pub fn emulator_calls(root: &Path) -> Vec<String> {
    std::fs::read_to_string(root.join("source/calls.log"))
        .map(|log| log.lines().map(String::from).collect())
        .unwrap_or_default()
}

//! Reference screenshot handling of the image comparator.

mod common;

use common::{ByteCompare, FixedScore, file_names, write_files};
use regvideo_core::{
    Report, VideoPlugin,
    compare::{CompareSummary, ImageComparator, SimilarityTool, Verdict},
};
use std::path::Path;

fn compare(root: &Path, tool: impl SimilarityTool, report: &mut Report) -> CompareSummary {
    let reference = root.join("reference");
    let current = root.join("current");
    ImageComparator::new(&reference, &current, tool)
        .compare(&VideoPlugin::ALL, report)
        .unwrap()
}

#[test]
fn identical_tree_has_no_findings() {
    let root = tempfile::tempdir().unwrap();
    for plugin in VideoPlugin::ALL {
        let files: &[(&str, &[u8])] = &[("foo-10.png", b"a"), ("foo-20.png", b"b")];
        write_files(&root.path().join("reference").join(plugin.dir_name()), files);
        write_files(&root.path().join("current").join(plugin.dir_name()), files);
    }

    let mut report = Report::new();
    let summary = compare(root.path(), ByteCompare, &mut report);

    assert_eq!(summary.errors, 0);
    assert_eq!(summary.warnings, 0);
    assert_eq!(summary.comparisons.len(), 6);
    assert_eq!(report.count_containing("0 errors. 0 warnings."), 1);
    // Matching comparisons leave no difference image behind.
    assert_eq!(
        file_names(&root.path().join("current/glN64")),
        ["foo-10.png", "foo-20.png"]
    );
}

#[test]
fn missing_reference_is_seeded_once() {
    let root = tempfile::tempdir().unwrap();
    write_files(&root.path().join("current/glide64"), &[("foo-10.png", b"shot")]);

    let mut report = Report::new();
    let first = compare(root.path(), ByteCompare, &mut report);
    assert_eq!(first.seeded, 1);
    assert_eq!(first.warnings, 1);
    assert!(first.comparisons.is_empty());
    assert_eq!(
        report.count_containing(
            "reference screenshot 'glide64/foo-10.png' missing. Copying from current test run"
        ),
        1
    );
    assert_eq!(
        std::fs::read(root.path().join("reference/glide64/foo-10.png")).unwrap(),
        b"shot"
    );

    let mut again = Report::new();
    let second = compare(root.path(), ByteCompare, &mut again);
    assert_eq!(second.seeded, 0);
    assert_eq!(second.warnings, 0);
    assert_eq!(second.comparisons.len(), 1);
    assert_eq!(again.count_containing("Copying from current test run"), 0);
}

#[test]
fn missing_current_screenshot_is_one_error_and_reference_kept() {
    let root = tempfile::tempdir().unwrap();
    write_files(&root.path().join("reference/ricevideo"), &[("bar-5.png", b"ref")]);

    let mut report = Report::new();
    let summary = compare(root.path(), ByteCompare, &mut report);

    assert_eq!(summary.errors, 1);
    assert_eq!(summary.missing, 1);
    assert_eq!(
        report.count_containing("Error: Test screenshot 'ricevideo/bar-5.png' missing."),
        1
    );
    assert!(root.path().join("reference/ricevideo/bar-5.png").is_file());
}

#[test]
fn mismatch_keeps_difference_image() {
    let root = tempfile::tempdir().unwrap();
    write_files(&root.path().join("reference/glN64"), &[("foo-10.png", b"old")]);
    write_files(&root.path().join("current/glN64"), &[("foo-10.png", b"new")]);

    let mut report = Report::new();
    let summary = compare(root.path(), ByteCompare, &mut report);

    assert_eq!(summary.warnings, 1);
    assert_eq!(summary.mismatches(), 1);
    assert_eq!(
        report.count_containing(
            "Warning: test image 'glN64/foo-10.png' does not match reference.  PSNR = 12.5"
        ),
        1
    );
    assert!(root.path().join("current/glN64/foo-10_DIFF.png").is_file());

    // The difference image is not mistaken for a new screenshot next time.
    let mut again = Report::new();
    let second = compare(root.path(), ByteCompare, &mut again);
    assert_eq!(second.seeded, 0);
    assert!(!root.path().join("reference/glN64/foo-10_DIFF.png").exists());
}

#[test]
fn threshold_boundary_is_a_mismatch() {
    for (raw, verdict) in [("60", Verdict::Mismatch), ("60.0001", Verdict::Match)] {
        let root = tempfile::tempdir().unwrap();
        write_files(&root.path().join("reference/glN64"), &[("a.png", b"x")]);
        write_files(&root.path().join("current/glN64"), &[("a.png", b"x")]);

        let mut report = Report::new();
        let summary = compare(root.path(), FixedScore(raw), &mut report);
        assert_eq!(summary.comparisons[0].verdict, verdict, "PSNR {raw}");
        assert_eq!(
            root.path().join("current/glN64/a_DIFF.png").exists(),
            verdict == Verdict::Mismatch
        );
    }
}

#[test]
fn unparsable_score_is_zero_and_a_warning() {
    let root = tempfile::tempdir().unwrap();
    write_files(&root.path().join("reference/glide64"), &[("a.png", b"x")]);
    write_files(&root.path().join("current/glide64"), &[("a.png", b"x")]);

    let mut report = Report::new();
    let summary = compare(
        root.path(),
        FixedScore("compare: image widths or heights differ"),
        &mut report,
    );

    let comparison = &summary.comparisons[0];
    assert!(comparison.score.abs() < f64::EPSILON);
    assert_eq!(comparison.verdict, Verdict::Mismatch);
    assert_eq!(
        report.count_containing("PSNR = compare: image widths or heights differ"),
        1
    );
}

#[test]
fn absent_directories_are_created_empty() {
    let root = tempfile::tempdir().unwrap();

    let mut report = Report::new();
    let summary = compare(root.path(), ByteCompare, &mut report);

    assert_eq!(summary, CompareSummary::default());
    for plugin in VideoPlugin::ALL {
        assert!(root.path().join("reference").join(plugin.dir_name()).is_dir());
        assert!(root.path().join("current").join(plugin.dir_name()).is_dir());
    }
}

/// Reports a perfect match without writing a difference image.
struct AlwaysIdentical;

impl SimilarityTool for AlwaysIdentical {
    fn psnr(&self, _reference: &Path, _current: &Path, _diff: &Path) -> std::io::Result<String> {
        Ok("inf".to_owned())
    }
}

#[test]
fn failure_on_one_image_does_not_stop_the_others() {
    let root = tempfile::tempdir().unwrap();
    let files: &[(&str, &[u8])] = &[("a.png", b"a"), ("b.png", b"b")];
    write_files(&root.path().join("reference/glN64"), files);
    write_files(&root.path().join("current/glN64"), files);
    // Neither the seed target nor the difference image can be a plain file.
    write_files(&root.path().join("current/ricevideo"), &[("new.png", b"n")]);
    std::fs::create_dir_all(root.path().join("reference/ricevideo/new.png")).unwrap();
    std::fs::create_dir_all(root.path().join("current/glN64/a_DIFF.png")).unwrap();

    let mut report = Report::new();
    let summary = compare(root.path(), AlwaysIdentical, &mut report);

    assert_eq!(summary.comparisons.len(), 2);
    assert!(summary.comparisons.iter().all(|c| c.verdict == Verdict::Match));
    assert_eq!(summary.seeded, 0);
    assert_eq!(summary.errors, 2);
    assert_eq!(report.count_containing("cannot copy 'ricevideo/new.png' to reference set"), 1);
    assert_eq!(report.count_containing("cannot remove difference image"), 1);
    assert_eq!(report.count_containing("2 errors. 1 warnings."), 1);
}

#[path = "common/mod.rs"]
mod common;

use authorprep::{discover_author_dumps, dump_stem, plan_jobs, take_colliding_jobs, AuthorPrep, IntegrityMode};
use common::*;
use std::fs;

#[test]
fn dump_stem_recognizes_raw_dumps_only() {
    assert_eq!(dump_stem("RA_78M.csv.zst").as_deref(), Some("RA_78M"));
    assert_eq!(dump_stem("RA_small.csv").as_deref(), Some("RA_small"));
    assert_eq!(dump_stem("RA_78M_processed.csv.zst"), None);
    assert_eq!(dump_stem("RA_78M_rejects.txt.zst"), None);
    assert_eq!(dump_stem("RC_2006-01.zst"), None);
    assert_eq!(dump_stem("notes.txt"), None);
}

#[test]
fn plan_names_outputs_after_the_dump() {
    let base = scratch_dir();
    let input = base.join("Authors").join("RA_78M.csv.zst");
    let jobs = plan_jobs(&base, &[input.clone()], None);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].output, base.join("Authors").join("RA_78M_processed.csv.zst"));
    assert_eq!(jobs[0].rejects, base.join("Authors").join("RA_78M_rejects.txt.zst"));

    let out = base.join("staged");
    let jobs = plan_jobs(&base, &[input], Some(&out));
    assert_eq!(jobs[0].output, out.join("Authors").join("RA_78M_processed.csv.zst"));
    assert_eq!(jobs[0].rejects, out.join("Authors").join("RA_78M_rejects.txt.zst"));
}

#[test]
fn same_named_dumps_in_different_dirs_get_distinct_outputs() {
    let base = scratch_dir();
    let a = base.join("2019").join("RA_x.csv.zst");
    let b = base.join("2020").join("RA_x.csv.zst");
    write_zst_lines(&a, &sample_author_lines());
    write_zst_lines(&b, &sample_author_lines()[..1]);
    let out = base.join("staged");

    let report = AuthorPrep::new().progress(false).run_batch(&base, Some(&out)).unwrap();
    assert!(report.failed.is_empty());
    assert_eq!(report.files.len(), 2);
    assert_eq!(decompress_zst_lines(&out.join("2019").join("RA_x_processed.csv.zst")), sample_expected_rows());
    assert_eq!(
        decompress_zst_lines(&out.join("2020").join("RA_x_processed.csv.zst")),
        sample_expected_rows()[..1].to_vec()
    );
}

/// `RA_x.csv` and `RA_x.csv.zst` side by side would both write `RA_x_processed.csv.zst`;
/// neither runs and both are reported, while unrelated dumps still go through.
#[test]
fn colliding_outputs_fail_both_inputs() {
    let base = scratch_dir();
    write_plain_lines(&base.join("RA_x.csv"), &sample_author_lines());
    write_zst_lines(&base.join("RA_x.csv.zst"), &sample_author_lines()[..1]);
    write_zst_lines(&base.join("RA_y.csv.zst"), &sample_author_lines());

    let report = AuthorPrep::new().progress(false).file_concurrency(2).run_batch(&base, None).unwrap();
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].input.as_deref(), Some(base.join("RA_y.csv.zst").as_path()));
    let failed: Vec<_> = report.failed.iter().map(|f| f.input.clone()).collect();
    assert_eq!(failed, vec![base.join("RA_x.csv"), base.join("RA_x.csv.zst")]);
    assert!(report.failed[0].error.contains("also planned for"));
    assert!(!base.join("RA_x_processed.csv.zst").exists());
}

#[test]
fn take_colliding_jobs_keeps_unique_outputs() {
    let base = scratch_dir();
    let inputs = vec![base.join("RA_a.csv"), base.join("RA_a.csv.zst"), base.join("RA_b.csv")];
    let mut jobs = plan_jobs(&base, &inputs, None);
    let failed = take_colliding_jobs(&mut jobs);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].input, base.join("RA_b.csv"));
    assert_eq!(failed.len(), 2);
}

/// Discovery walks subdirectories, ignores unrelated files and our own outputs, and
/// returns paths sorted.
#[test]
fn discovery_skips_outputs_and_unrelated_files() {
    let base = scratch_dir();
    write_zst_lines(&base.join("Authors").join("RA_b.csv.zst"), &sample_author_lines());
    write_plain_lines(&base.join("Authors").join("RA_a.csv"), &sample_author_lines());
    write_zst_lines(&base.join("Authors").join("RA_old_processed.csv.zst"), &sample_expected_rows());
    write_plain_lines(&base.join("notes.txt"), &["hello".to_string()]);

    let found = discover_author_dumps(&base);
    assert_eq!(
        found,
        vec![base.join("Authors").join("RA_a.csv"), base.join("Authors").join("RA_b.csv.zst")]
    );
}

#[test]
fn batch_processes_every_dump_and_is_rerunnable() {
    let base = scratch_dir();
    let authors = base.join("Authors");
    write_zst_lines(&authors.join("RA_one.csv.zst"), &sample_author_lines());
    write_plain_lines(&authors.join("RA_two.csv"), &sample_author_lines()[..2]);

    let prep = AuthorPrep::new().progress(false).file_concurrency(2);
    let report = prep.run_batch(&base, None).unwrap();

    assert!(report.failed.is_empty());
    assert_eq!(report.files.len(), 2);
    assert_eq!(report.totals.lines, 6);
    assert_eq!(report.totals.emitted, 5);
    assert_eq!(report.totals.rejected, 1);
    // Reports keep discovery order regardless of which worker finished first.
    assert_eq!(report.files[0].input.as_deref(), Some(authors.join("RA_one.csv.zst").as_path()));

    assert_eq!(decompress_zst_lines(&authors.join("RA_one_processed.csv.zst")), sample_expected_rows());
    assert_eq!(decompress_zst_lines(&authors.join("RA_two_processed.csv.zst")), sample_expected_rows()[..2].to_vec());
    assert_eq!(
        decompress_zst_bytes(&authors.join("RA_one_rejects.txt.zst")),
        b"not a valid line at all\n".to_vec()
    );

    // Outputs are not picked up as inputs on a second pass.
    let again = prep.run_batch(&base, None).unwrap();
    assert_eq!(again.files.len(), 2);
}

#[test]
fn batch_records_corrupt_dump_and_continues() {
    let base = scratch_dir();
    write_zst_lines(&base.join("RA_good.csv.zst"), &sample_author_lines());
    write_corrupt_zst(&base.join("RA_bad.csv.zst"));
    let out = base.join("out");

    let report = AuthorPrep::new().progress(false).run_batch(&base, Some(&out)).unwrap();
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].input, base.join("RA_bad.csv.zst"));
    assert!(out.join("RA_good_processed.csv.zst").exists());
    assert!(!out.join("RA_bad_processed.csv.zst").exists());
}

#[test]
fn batch_verify_skips_corrupt_dump_up_front() {
    let base = scratch_dir();
    write_zst_lines(&base.join("RA_good.csv.zst"), &sample_author_lines());
    write_corrupt_zst(&base.join("RA_bad.csv.zst"));

    let report = AuthorPrep::new()
        .progress(false)
        .verify(Some(IntegrityMode::Quick { sample_bytes: 64 * 1024 }))
        .run_batch(&base, None)
        .unwrap();
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert!(!base.join("RA_bad_processed.csv.zst").exists());
    assert!(!base.join("RA_bad_processed.csv.zst.tmp").exists());
    assert!(fs::metadata(base.join("RA_good_processed.csv.zst")).is_ok());
}

#[test]
fn batch_on_missing_dir_is_an_error() {
    let base = scratch_dir();
    assert!(AuthorPrep::new().progress(false).run_batch(&base.join("nope"), None).is_err());
}

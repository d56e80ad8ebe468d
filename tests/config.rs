use authorprep::{AuthorPrep, PrepOptions, UsernamePolicy};

#[test]
fn defaults_follow_reddit_account_rules() {
    let opts = PrepOptions::default();
    assert_eq!(opts.username_policy, UsernamePolicy { min_len: 3, max_len: 20 });
    assert_eq!(opts.zstd_level, 3);
    assert_eq!(opts.file_concurrency, 1);
    assert!(opts.verify.is_none());
}

#[test]
fn builders_clamp_out_of_range_values() {
    let opts = PrepOptions::default()
        .with_zstd_level(99)
        .with_file_concurrency(0)
        .with_io_read_buffer(1)
        .with_io_write_buffer(1);
    assert_eq!(opts.zstd_level, 22);
    assert_eq!(opts.file_concurrency, 1);
    assert_eq!(opts.read_buffer_bytes, 8 * 1024);
    assert_eq!(opts.write_buffer_bytes, 8 * 1024);

    assert_eq!(UsernamePolicy::new(0, 0), UsernamePolicy { min_len: 1, max_len: 1 });
    assert_eq!(UsernamePolicy::new(5, 2), UsernamePolicy { min_len: 5, max_len: 5 });
}

/// Env overrides apply when parsable and are skipped otherwise. This is the only test
/// that touches AUTHORPREP_* variables.
#[test]
fn env_overrides() {
    std::env::set_var("AUTHORPREP_ZSTD_LEVEL", "7");
    std::env::set_var("AUTHORPREP_READ_BUFFER", "not-a-number");
    std::env::set_var("AUTHORPREP_FILE_CONCURRENCY", " 4 ");
    let opts = PrepOptions::default().apply_env();
    std::env::remove_var("AUTHORPREP_ZSTD_LEVEL");
    std::env::remove_var("AUTHORPREP_READ_BUFFER");
    std::env::remove_var("AUTHORPREP_FILE_CONCURRENCY");

    assert_eq!(opts.zstd_level, 7);
    assert_eq!(opts.read_buffer_bytes, PrepOptions::default().read_buffer_bytes);
    assert_eq!(opts.file_concurrency, 4);
}

#[test]
fn normalizer_is_built_from_the_options() {
    let prep = AuthorPrep::new().username_policy(UsernamePolicy::new(2, 3));
    let n = prep.normalizer();
    assert!(n.is_valid_username("ab"));
    assert!(!n.is_valid_username("abcd"));
    assert_eq!(prep.options().username_policy, n.policy());
}

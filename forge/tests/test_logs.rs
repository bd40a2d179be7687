//! Logging setup

use relforge::logs::{init_logging, LogLevel, LogOptions};

#[test]
fn log_level_parses_common_spellings() {
    assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
    assert_eq!("TRACE".parse::<LogLevel>().unwrap(), LogLevel::Trace);
    assert!("loud".parse::<LogLevel>().is_err());
}

// single init test per binary, the subscriber is process-global
#[test]
fn file_logging_hands_back_a_writer_guard() {
    let dir = std::env::temp_dir().join("relforge_test_logs");
    let options = LogOptions {
        log_level: LogLevel::Debug,
        stdout: false,
        log_dir: Some(dir),
        json_format: false,
    };

    let guard = init_logging(options).unwrap();
    assert!(guard.is_some());
}

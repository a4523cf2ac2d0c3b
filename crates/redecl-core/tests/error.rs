//! Tests for error handling

use std::io;

use redecl_core::error::{RedeclError, Result};

#[test]
fn test_redecl_error_display()
{
    let error = RedeclError::MalformedReference { offset: 0x2a };
    assert_eq!(format!("{}", error), "Malformed reference in entry at 0x2a");

    let error = RedeclError::UnknownAccess(9);
    assert!(format!("{}", error).contains('9'));

    let error = RedeclError::Object("not an ELF file".to_string());
    assert!(format!("{}", error).contains("not an ELF file"));
}

#[test]
fn test_io_error_conversion()
{
    let io_err = io::Error::new(io::ErrorKind::NotFound, "no such binary");
    let error: RedeclError = io_err.into();

    match error {
        RedeclError::Io(_) => {}
        other => panic!("Expected Io variant, got {other:?}"),
    }
}

#[test]
fn test_decode_errors_are_not_unit_fatal()
{
    assert!(!RedeclError::UnknownAccess(4).is_unit_fatal());
    assert!(!RedeclError::UnknownVirtuality(3).is_unit_fatal());
    assert!(!RedeclError::InvalidArgument("x".to_string()).is_unit_fatal());
}

#[test]
fn test_reader_errors_are_unit_fatal()
{
    assert!(RedeclError::MalformedReference { offset: 0 }.is_unit_fatal());
    assert!(RedeclError::Object("bad".to_string()).is_unit_fatal());
    assert!(RedeclError::Io(io::Error::other("read failed")).is_unit_fatal());
}

#[test]
fn test_result_type_alias()
{
    fn lookup(found: bool) -> Result<u64>
    {
        if found {
            Ok(7)
        } else {
            Err(RedeclError::InvalidArgument("missing".to_string()))
        }
    }

    assert_eq!(lookup(true).unwrap(), 7);
    assert!(lookup(false).is_err());
}

#[test]
fn test_load_missing_file_is_io_error()
{
    let error = redecl_core::loader::load_file("/nonexistent/redecl/binary").unwrap_err();
    assert!(matches!(error, RedeclError::Io(_)));
}

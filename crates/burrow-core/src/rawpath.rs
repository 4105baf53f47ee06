//! Conversions between wire bytes and filesystem paths
//!
//! Paths travel as raw bytes. On Unix they map onto `OsStr` without any
//! encoding step; elsewhere they are decoded lossily.

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::ffi::{OsStrExt, OsStringExt};

/// Build a path from wire bytes
#[cfg(unix)]
pub fn to_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(OsStr::from_bytes(bytes))
}

/// Build a path from wire bytes
#[cfg(not(unix))]
pub fn to_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

/// Build an owned OS string from wire bytes
#[cfg(unix)]
pub fn to_os_string(bytes: &[u8]) -> OsString {
    OsString::from_vec(bytes.to_vec())
}

/// Build an owned OS string from wire bytes
#[cfg(not(unix))]
pub fn to_os_string(bytes: &[u8]) -> OsString {
    OsString::from(String::from_utf8_lossy(bytes).into_owned())
}

/// Wire bytes of an OS string
#[cfg(unix)]
pub fn os_bytes(s: &OsStr) -> Cow<'_, [u8]> {
    Cow::Borrowed(s.as_bytes())
}

/// Wire bytes of an OS string
#[cfg(not(unix))]
pub fn os_bytes(s: &OsStr) -> Cow<'_, [u8]> {
    match s.to_string_lossy() {
        Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
        Cow::Owned(s) => Cow::Owned(s.into_bytes()),
    }
}

/// Wire bytes of a path
pub fn path_bytes(path: &Path) -> Cow<'_, [u8]> {
    os_bytes(path.as_os_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_round_trip() {
        let path = to_path(b"/home/alice/notes.txt");
        assert_eq!(path, PathBuf::from("/home/alice/notes.txt"));
        assert_eq!(&*path_bytes(&path), b"/home/alice/notes.txt");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_bytes_preserved() {
        let raw = b"/tmp/\xff\xfe.bin";
        let path = to_path(raw);
        assert_eq!(&*path_bytes(&path), raw);
        assert_eq!(&*os_bytes(&to_os_string(raw)), raw);
    }
}

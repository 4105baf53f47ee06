//! Path resolution for client-supplied paths
//!
//! Rules applied by [`PathResolver::resolve`]:
//!
//! 1. A path not starting with `~` is returned unchanged. Relative paths stay
//!    relative and are resolved by the filesystem against the server's
//!    working directory.
//! 2. `~` and `~/...` expand to the home directory of the session's username
//!    hint, falling back to `$HOME` and finally to `/root`.
//! 3. `~name` and `~name/...` expand to the home directory of `name`. If
//!    `name` is unknown the input is returned unchanged.
//!
//! Resolution never fails. Lookup failures degrade to the original path and
//! the filesystem call that follows reports the real error.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use burrow_core::rawpath;
use burrow_core::{Error, Result};
use tracing::debug;

use crate::fs::Filesystem;
use crate::identity::{Environment, IdentityResolver, ProcessEnvironment, SystemIdentity};

/// Longest username hint kept by a session; longer hints are truncated
pub const MAX_USERNAME_LEN: usize = 256;

/// Home directory used when neither the hint nor `$HOME` yields one
pub const FALLBACK_HOME: &str = "/root";

/// Unauthenticated, client-supplied username used only for `~` expansion
#[derive(Clone, Default, PartialEq, Eq)]
pub struct UsernameHint(Vec<u8>);

impl UsernameHint {
    /// Build a hint from wire bytes, truncating to [`MAX_USERNAME_LEN`]
    pub fn from_wire(bytes: &[u8]) -> Self {
        let len = bytes.len().min(MAX_USERNAME_LEN);
        Self(bytes[..len].to_vec())
    }

    /// Raw hint bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The hint as a username, if it is valid UTF-8 and non-empty
    pub fn as_username(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok().filter(|s| !s.is_empty())
    }
}

impl fmt::Display for UsernameHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for UsernameHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UsernameHint({self})")
    }
}

/// Expands `~` in client paths
#[derive(Clone)]
pub struct PathResolver {
    identity: Arc<dyn IdentityResolver>,
    env: Arc<dyn Environment>,
}

impl PathResolver {
    /// Create a resolver over the given collaborators
    pub fn new(identity: Arc<dyn IdentityResolver>, env: Arc<dyn Environment>) -> Self {
        Self { identity, env }
    }

    /// Resolver backed by the password database and the process environment
    pub fn system() -> Self {
        Self::new(Arc::new(SystemIdentity), Arc::new(ProcessEnvironment))
    }

    /// Resolve a raw client path against the session's username hint
    pub fn resolve(&self, raw: &[u8], hint: &UsernameHint) -> PathBuf {
        let Some(rest) = raw.strip_prefix(b"~") else {
            return rawpath::to_path(raw);
        };

        if rest.is_empty() || rest.starts_with(b"/") {
            return concat(self.own_home(hint), rest);
        }

        let (name, tail) = match rest.iter().position(|&b| b == b'/') {
            Some(slash) => rest.split_at(slash),
            None => (rest, &[][..]),
        };

        let home = std::str::from_utf8(name)
            .ok()
            .and_then(|name| self.identity.home_dir(name));
        match home {
            Some(home) => concat(home, tail),
            None => {
                debug!(
                    user = %String::from_utf8_lossy(name),
                    "Unknown user in tilde path, leaving path unexpanded"
                );
                rawpath::to_path(raw)
            }
        }
    }

    /// [`resolve`](Self::resolve) with account lookups moved to the blocking pool
    ///
    /// Tilde paths may consult the password database, which can block on a
    /// slow NSS backend. Plain paths are resolved inline.
    pub async fn resolve_blocking_safe(
        &self,
        raw: &[u8],
        hint: &UsernameHint,
    ) -> Result<PathBuf> {
        if !raw.starts_with(b"~") {
            return Ok(rawpath::to_path(raw));
        }

        let resolver = self.clone();
        let raw = raw.to_vec();
        let hint = hint.clone();
        tokio::task::spawn_blocking(move || resolver.resolve(&raw, &hint))
            .await
            .map_err(|e| Error::Internal(format!("Path resolution task failed: {e}")))
    }

    /// Home directory for a bare `~`
    fn own_home(&self, hint: &UsernameHint) -> PathBuf {
        if let Some(home) = hint
            .as_username()
            .and_then(|user| self.identity.home_dir(user))
        {
            return home;
        }
        match self.env.var("HOME").filter(|home| !home.is_empty()) {
            Some(home) => PathBuf::from(home),
            None => PathBuf::from(FALLBACK_HOME),
        }
    }
}

impl fmt::Debug for PathResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathResolver").finish_non_exhaustive()
    }
}

/// Append the raw remainder of a tilde path to a home directory
///
/// This is string concatenation, not `Path::join`: the remainder keeps its
/// leading slash.
fn concat(home: PathBuf, tail: &[u8]) -> PathBuf {
    let mut joined = home.into_os_string();
    joined.push(rawpath::to_os_string(tail));
    PathBuf::from(joined)
}

/// Final component of a path: everything after the last `/`
pub fn basename(path: &[u8]) -> &[u8] {
    match path.iter().rposition(|&b| b == b'/') {
        Some(slash) => &path[slash + 1..],
        None => path,
    }
}

/// Create every ancestor directory of `path`, from the root down
///
/// Ancestors that already exist are skipped. Any other failure is fatal for
/// the calling operation.
pub async fn ensure_parent_directories(fs: &dyn Filesystem, path: &Path) -> Result<()> {
    let bytes = rawpath::path_bytes(path);

    for (idx, _) in bytes.iter().enumerate().filter(|&(_, &b)| b == b'/') {
        if idx == 0 {
            continue;
        }
        let ancestor = rawpath::to_path(&bytes[..idx]);
        match fs.create_dir(&ancestor).await {
            Ok(()) => debug!(directory = ?ancestor, "Created directory"),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(Error::Internal(format!(
                    "Failed to create directory {}: {e}",
                    ancestor.display()
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFilesystem;
    use crate::identity::{StaticEnvironment, StaticIdentity};
    use tempfile::TempDir;

    fn resolver(env: StaticEnvironment) -> PathResolver {
        let identity = StaticIdentity::new()
            .with_user("alice", "/home/alice")
            .with_user("bob", "/srv/bob");
        PathResolver::new(Arc::new(identity), Arc::new(env))
    }

    fn hint(name: &str) -> UsernameHint {
        UsernameHint::from_wire(name.as_bytes())
    }

    #[test]
    fn test_plain_paths_unchanged() {
        let r = resolver(StaticEnvironment::new());
        assert_eq!(r.resolve(b"/abs/path", &hint("alice")), PathBuf::from("/abs/path"));
        assert_eq!(r.resolve(b"rel/file", &hint("alice")), PathBuf::from("rel/file"));
        assert_eq!(r.resolve(b"a~b", &hint("alice")), PathBuf::from("a~b"));
    }

    #[test]
    fn test_own_home_expansion() {
        let r = resolver(StaticEnvironment::new());
        assert_eq!(r.resolve(b"~/x", &hint("alice")), PathBuf::from("/home/alice/x"));
        assert_eq!(r.resolve(b"~", &hint("alice")), PathBuf::from("/home/alice"));
    }

    #[test]
    fn test_named_home_ignores_session_hint() {
        let r = resolver(StaticEnvironment::new());
        assert_eq!(r.resolve(b"~bob/y", &hint("alice")), PathBuf::from("/srv/bob/y"));
        assert_eq!(r.resolve(b"~bob", &hint("alice")), PathBuf::from("/srv/bob"));
    }

    #[test]
    fn test_unknown_named_user_left_unchanged() {
        let r = resolver(StaticEnvironment::new().with_var("HOME", "/var/empty"));
        assert_eq!(r.resolve(b"~carol/z", &hint("alice")), PathBuf::from("~carol/z"));
        assert_eq!(r.resolve(b"~carol", &hint("alice")), PathBuf::from("~carol"));
    }

    #[test]
    fn test_fallback_to_home_env() {
        let r = resolver(StaticEnvironment::new().with_var("HOME", "/var/lib/burrow"));
        assert_eq!(
            r.resolve(b"~/drop", &hint("mallory")),
            PathBuf::from("/var/lib/burrow/drop")
        );
        assert_eq!(
            r.resolve(b"~/drop", &UsernameHint::default()),
            PathBuf::from("/var/lib/burrow/drop")
        );
    }

    #[test]
    fn test_fallback_to_root() {
        let r = resolver(StaticEnvironment::new());
        assert_eq!(r.resolve(b"~/x", &hint("mallory")), PathBuf::from("/root/x"));

        let r = resolver(StaticEnvironment::new().with_var("HOME", ""));
        assert_eq!(r.resolve(b"~", &UsernameHint::default()), PathBuf::from("/root"));
    }

    #[tokio::test]
    async fn test_tilde_lookup_runs_off_the_session_thread() {
        struct RecordingIdentity(std::sync::Mutex<Vec<std::thread::ThreadId>>);

        impl IdentityResolver for RecordingIdentity {
            fn home_dir(&self, _username: &str) -> Option<PathBuf> {
                self.0.lock().unwrap().push(std::thread::current().id());
                Some(PathBuf::from("/home/alice"))
            }
        }

        let identity = Arc::new(RecordingIdentity(std::sync::Mutex::new(Vec::new())));
        let r = PathResolver::new(identity.clone(), Arc::new(StaticEnvironment::new()));

        let resolved = r.resolve_blocking_safe(b"~/x", &hint("alice")).await.unwrap();
        assert_eq!(resolved, PathBuf::from("/home/alice/x"));

        let plain = r.resolve_blocking_safe(b"/abs", &hint("alice")).await.unwrap();
        assert_eq!(plain, PathBuf::from("/abs"));

        let seen = identity.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_ne!(seen[0], std::thread::current().id());
    }

    #[test]
    fn test_hint_truncated() {
        let long = vec![b'a'; MAX_USERNAME_LEN + 40];
        let hint = UsernameHint::from_wire(&long);
        assert_eq!(hint.as_bytes().len(), MAX_USERNAME_LEN);
        assert!(UsernameHint::from_wire(b"").as_username().is_none());
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename(b"/home/alice/report.pdf"), b"report.pdf");
        assert_eq!(basename(b"report.pdf"), b"report.pdf");
        assert_eq!(basename(b"dir/"), b"");
    }

    #[tokio::test]
    async fn test_ensure_parent_directories_creates_ancestors() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a/b/c/file.txt");

        ensure_parent_directories(&LocalFilesystem, &target).await.unwrap();

        assert!(dir.path().join("a/b/c").is_dir());
        assert!(!target.exists());

        // Running again over existing ancestors is not an error.
        ensure_parent_directories(&LocalFilesystem, &target).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_parent_directories_blocked_by_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("plain"), b"").unwrap();
        let target = dir.path().join("plain/sub/file.txt");

        let err = ensure_parent_directories(&LocalFilesystem, &target)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}

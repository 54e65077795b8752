//! Resolves protocol paths into [`Resource`]s and decides what the caller may do with them.
//!
//! Every authenticated user sees the same namespace shape:
//!
//! ```text
//! /                 Index, virtual, lists exactly {<user>, shares}
//! /<user>/...       UserFolder, backed by users/<user>/... on disk
//! /shares           SharesRoot, virtual and empty
//! /shares/<s>/...   ShareFolder, backed by shares/<s>/... when the share hook allows it
//! ```
//!
//! Anything else, including another user's folder, resolves to [`Resource::Invalid`].

use homedav_core::{auth::User, storage::Partition};
use std::{
    fmt::Debug,
    path::PathBuf,
};

/// Name of the top-level segment under which shared folders live.
pub const SHARES: &str = "shares";

/// Decides whether a user may enter a shared folder.
pub trait ShareAccess: Send + Sync + Debug {
    /// Returns true if `user` may access the share called `share`.
    fn may_access(&self, user: &User, share: &str) -> bool;
}

/// The [`ShareAccess`] hook that ships with homedav. Shared folders are not implemented yet, so
/// nobody gets in.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoShares;

impl ShareAccess for NoShares {
    fn may_access(&self, _user: &User, _share: &str) -> bool {
        false
    }
}

/// Where inside a physical partition a resource lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    /// The top-level folder: the caller's own name for a user folder, the share name for a share.
    pub owner: String,
    /// The `/` separated path below the owner's folder. Empty for the folder itself.
    pub relative: String,
}

impl Location {
    fn new(owner: &str, rest: &[&str]) -> Location {
        Location {
            owner: owner.to_string(),
            relative: rest.join("/"),
        }
    }

    /// True if this is the owner's folder itself rather than something inside it.
    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }

    fn physical_path(&self, partition: Partition) -> PathBuf {
        let folder = partition.folder(&self.owner);
        if self.is_root() { folder } else { folder.join(&self.relative) }
    }
}

/// What a requested path denotes for a particular caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resource {
    /// Outside the caller's namespace.
    Invalid,
    /// The namespace root `/`.
    Index,
    /// The shared folders area `/shares`.
    SharesRoot,
    /// Something in the caller's own folder.
    UserFolder(Location),
    /// Something in a shared folder the caller may access.
    ShareFolder(Location),
}

impl Resource {
    /// Whether the resource may be looked at: stat, listing and reading.
    pub fn can_open(&self) -> bool {
        matches!(self, Resource::UserFolder(_) | Resource::ShareFolder(_))
    }

    /// Whether the resource may be changed: mkdir, remove, rename and writing. The top-level
    /// folders themselves can never be changed.
    pub fn can_modify(&self) -> bool {
        match self {
            Resource::UserFolder(location) | Resource::ShareFolder(location) => !location.is_root(),
            _ => false,
        }
    }

    /// The path of the resource relative to the storage root, e.g. `users/alice/docs/a.txt`.
    ///
    /// # Panics
    ///
    /// Panics for resources without physical backing ([`Index`](Resource::Index),
    /// [`SharesRoot`](Resource::SharesRoot) and [`Invalid`](Resource::Invalid)). Callers must
    /// check [`can_open`](Resource::can_open) first.
    pub fn physical_path(&self) -> PathBuf {
        match self {
            Resource::UserFolder(location) => location.physical_path(Partition::Users),
            Resource::ShareFolder(location) => location.physical_path(Partition::Shares),
            other => panic!("{other:?} has no physical path"),
        }
    }
}

/// Lexically cleans a `/` separated path: repeated separators, `.` and `..` segments are
/// collapsed and trailing separators dropped. `..` never climbs above the root of a rooted path.
/// An empty result is `.`. Applying it twice gives the same result as applying it once.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(last) if *last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            segment => segments.push(segment),
        }
    }
    let joined = segments.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Resolves `path` for `user` with the default share hook, which denies everything.
pub fn resolve(user: &User, path: &str) -> Resource {
    resolve_with(user, path, &NoShares)
}

/// Resolves `path` for `user`, asking `shares` whether shared folders may be entered.
///
/// Resolution never fails. Paths outside the caller's namespace come back as
/// [`Resource::Invalid`] which the caller turns into a permission error.
pub fn resolve_with(user: &User, path: &str, shares: &dyn ShareAccess) -> Resource {
    if path.is_empty() || !path.starts_with('/') {
        return Resource::Invalid;
    }
    let cleaned = normalize(path);
    let segments: Vec<&str> = cleaned.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [] => Resource::Index,
        [SHARES] => Resource::SharesRoot,
        [SHARES, share, rest @ ..] => {
            if shares.may_access(user, share) {
                Resource::ShareFolder(Location::new(share, rest))
            } else {
                Resource::Invalid
            }
        }
        [owner, rest @ ..] if *owner == user.username() => Resource::UserFolder(Location::new(owner, rest)),
        _ => Resource::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[derive(Debug)]
    struct OnlyTeam;

    impl ShareAccess for OnlyTeam {
        fn may_access(&self, _user: &User, share: &str) -> bool {
            share == "team"
        }
    }

    fn alice() -> User {
        User::new("alice")
    }

    fn folder(owner: &str, relative: &str) -> Resource {
        Resource::UserFolder(Location {
            owner: owner.to_string(),
            relative: relative.to_string(),
        })
    }

    #[rstest]
    #[case("", ".")]
    #[case("/", "/")]
    #[case("//", "/")]
    #[case("/alice/", "/alice")]
    #[case("/alice//docs/./a.txt", "/alice/docs/a.txt")]
    #[case("/alice/docs/..", "/alice")]
    #[case("/..", "/")]
    #[case("/../../alice", "/alice")]
    #[case("/bob/../alice/x", "/alice/x")]
    #[case("alice/../..", "..")]
    #[case("./alice", "alice")]
    #[case("a/./b/../c", "a/c")]
    fn normalizes_like_a_lexical_clean(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(input), expected);
    }

    #[rstest]
    #[case("/", Resource::Index)]
    #[case("/shares", Resource::SharesRoot)]
    #[case("/shares/", Resource::SharesRoot)]
    #[case("/alice", folder("alice", ""))]
    #[case("/alice/", folder("alice", ""))]
    #[case("/alice/docs/a.txt", folder("alice", "docs/a.txt"))]
    #[case("/alice/docs/../b.txt", folder("alice", "b.txt"))]
    #[case("/bob", Resource::Invalid)]
    #[case("/bob/a.txt", Resource::Invalid)]
    #[case("/alice/../bob", Resource::Invalid)]
    #[case("/../bob", Resource::Invalid)]
    #[case("/../alice", folder("alice", ""))]
    #[case("/shares/team", Resource::Invalid)]
    #[case("/alicex", Resource::Invalid)]
    #[case("/Alice", Resource::Invalid)]
    #[case("", Resource::Invalid)]
    #[case("alice", Resource::Invalid)]
    #[case("alice/docs", Resource::Invalid)]
    fn resolves_for_alice(#[case] path: &str, #[case] expected: Resource) {
        assert_eq!(resolve(&alice(), path), expected);
    }

    #[test]
    fn share_hook_decides_over_share_folders() {
        let user = alice();
        assert_eq!(
            resolve_with(&user, "/shares/team/plan.md", &OnlyTeam),
            Resource::ShareFolder(Location {
                owner: "team".to_string(),
                relative: "plan.md".to_string(),
            })
        );
        assert_eq!(resolve_with(&user, "/shares/secret/plan.md", &OnlyTeam), Resource::Invalid);
        assert_eq!(resolve_with(&user, "/shares", &OnlyTeam), Resource::SharesRoot);
    }

    #[test]
    fn never_resolves_into_another_tenant() {
        let paths = [
            "/bob", "/bob/", "/bob/x", "//bob//x", "/./bob", "/alice/../bob/x", "/alice/../../bob", "/x/../bob",
        ];
        for path in paths {
            let resource = resolve(&alice(), path);
            assert!(
                !matches!(&resource, Resource::UserFolder(location) if location.owner != "alice"),
                "{path} resolved to {resource:?}"
            );
            assert_eq!(resource, Resource::Invalid, "{path}");
        }
    }

    #[test]
    fn resolution_is_invariant_under_normalization() {
        let paths = [
            "/", "//", "/.", "/..", "/alice", "/alice/", "/alice/./x", "/alice/x/../y", "/shares", "/shares/../alice",
            "/bob/../alice/z", "/a/b/c/../../..", "alice", "", ".", "../alice",
        ];
        let user = alice();
        for path in paths {
            let once = normalize(path);
            assert_eq!(normalize(&once), once, "normalize is idempotent for {path:?}");
            assert_eq!(resolve(&user, path), resolve(&user, &once), "{path:?}");
        }
    }

    #[test]
    fn own_folder_can_be_opened_but_not_modified() {
        let user = alice();
        let home = resolve(&user, "/alice");
        assert!(home.can_open());
        assert!(!home.can_modify());

        let inside = resolve(&user, "/alice/x");
        assert!(inside.can_open());
        assert!(inside.can_modify());
    }

    #[test]
    fn virtual_and_invalid_resources_are_closed() {
        for resource in [Resource::Index, Resource::SharesRoot, Resource::Invalid] {
            assert!(!resource.can_open(), "{resource:?}");
            assert!(!resource.can_modify(), "{resource:?}");
        }
    }

    #[test]
    fn share_folder_roots_are_not_modifiable() {
        let share = resolve_with(&alice(), "/shares/team", &OnlyTeam);
        assert!(share.can_open());
        assert!(!share.can_modify());
        assert!(resolve_with(&alice(), "/shares/team/a", &OnlyTeam).can_modify());
    }

    #[test]
    fn maps_to_the_physical_partitions() {
        let user = alice();
        assert_eq!(resolve(&user, "/alice").physical_path(), PathBuf::from("users/alice"));
        assert_eq!(resolve(&user, "/alice/docs/a.txt").physical_path(), PathBuf::from("users/alice/docs/a.txt"));
        assert_eq!(
            resolve_with(&user, "/shares/team/x", &OnlyTeam).physical_path(),
            PathBuf::from("shares/team/x")
        );
    }

    #[rstest]
    #[case(Resource::Index)]
    #[case(Resource::SharesRoot)]
    #[case(Resource::Invalid)]
    #[should_panic(expected = "has no physical path")]
    fn physical_path_of_non_physical_resource_panics(#[case] resource: Resource) {
        resource.physical_path();
    }
}

use std::fmt::{self, Display, Formatter};

/// The identity of an authenticated caller.
///
/// A `User` is only ever constructed after the credentials were verified against a
/// [`UserStore`](super::UserStore). Everything downstream of the authentication gate trusts it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct User {
    username: String,
}

impl User {
    /// Creates the identity for the given (already authenticated) user name.
    pub fn new<S: Into<String>>(username: S) -> Self {
        User { username: username.into() }
    }

    /// The user name, which is also the name of the user's top-level folder.
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl Display for User {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

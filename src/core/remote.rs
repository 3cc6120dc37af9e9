//! Remote classification
//!
//! Derives the hosting provider and the authentication mode of a remote from
//! its URL. Both HTTPS and SSH shapes are understood:
//! - `https://github.com/owner/repo.git`
//! - `ssh://git@github.com/owner/repo.git`
//! - `git@github.com:owner/repo.git`
//!
//! Classification never fails; anything unrecognised is `Unknown`.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// scp-like SSH address: `user@host:path`
static SCP_LIKE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<user>[A-Za-z0-9._~-]+)@(?P<host>[A-Za-z0-9.-]+):(?P<path>[^/].*)$")
        .expect("Invalid regex pattern for scp-like remote detection")
});

/// Hosting service behind a remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Provider {
    #[default]
    Unknown,
    GitHub,
    Bitbucket,
    GitLab,
}

impl Provider {
    /// Host the user uploads public keys to
    pub fn host_url(&self) -> Option<&'static str> {
        match self {
            Provider::GitHub => Some("github.com"),
            Provider::Bitbucket => Some("bitbucket.org"),
            Provider::GitLab => Some("gitlab.com"),
            Provider::Unknown => None,
        }
    }

    /// Match a host (or, as a fallback, a whole URL) against provider fragments.
    /// First match wins.
    fn from_fragment(s: &str) -> Self {
        if s.contains("github") {
            Provider::GitHub
        } else if s.contains("bitbucket") {
            Provider::Bitbucket
        } else if s.contains("gitlab") {
            Provider::GitLab
        } else {
            Provider::Unknown
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::GitHub => "GitHub",
            Provider::Bitbucket => "Bitbucket",
            Provider::GitLab => "GitLab",
            Provider::Unknown => "unknown provider",
        };
        f.write_str(name)
    }
}

/// How a remote authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Unknown,
    Http,
    Ssh,
}

/// A named remote repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    /// Remote name, e.g. "origin"
    pub name: String,
    /// Fetch URL
    pub url: String,
}

impl Remote {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Hosting provider, judged by the URL host
    pub fn provider(&self) -> Provider {
        match parse_remote_url(&self.url) {
            Some(parsed) => Provider::from_fragment(&parsed.host),
            None => Provider::from_fragment(&self.url),
        }
    }

    /// Authentication mode, judged by the URL scheme
    pub fn auth_mode(&self) -> AuthMode {
        match parse_remote_url(&self.url) {
            Some(parsed) => parsed.transport,
            None => {
                if self.url.contains("http") {
                    AuthMode::Http
                } else if self.url.contains("git@") {
                    AuthMode::Ssh
                } else {
                    AuthMode::Unknown
                }
            }
        }
    }
}

/// Structured view of a remote URL
#[derive(Debug, PartialEq, Eq)]
struct ParsedRemoteUrl {
    transport: AuthMode,
    host: String,
}

/// Parse a remote URL into transport and host.
///
/// Returns None when the URL has no recognisable structure; callers then fall
/// back to substring matching.
fn parse_remote_url(url: &str) -> Option<ParsedRemoteUrl> {
    if let Some(caps) = SCP_LIKE_PATTERN.captures(url) {
        return Some(ParsedRemoteUrl {
            transport: AuthMode::Ssh,
            host: caps["host"].to_string(),
        });
    }

    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_string();
    let transport = match parsed.scheme() {
        "http" | "https" => AuthMode::Http,
        "ssh" | "git+ssh" | "ssh+git" => AuthMode::Ssh,
        _ => AuthMode::Unknown,
    };

    Some(ParsedRemoteUrl { transport, host })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(url: &str) -> Remote {
        Remote::new("origin", url)
    }

    #[test]
    fn test_provider_from_documented_hosts() {
        for url in [
            "https://github.com/user/repo.git",
            "git@github.com:user/repo.git",
            "ssh://git@github.com/user/repo.git",
        ] {
            assert_eq!(remote(url).provider(), Provider::GitHub, "{url}");
        }
        assert_eq!(
            remote("https://bitbucket.org/user/repo.git").provider(),
            Provider::Bitbucket
        );
        assert_eq!(
            remote("git@bitbucket.org:user/repo.git").provider(),
            Provider::Bitbucket
        );
        assert_eq!(
            remote("https://gitlab.com/user/repo.git").provider(),
            Provider::GitLab
        );
        assert_eq!(
            remote("git@gitlab.com:user/repo.git").provider(),
            Provider::GitLab
        );
    }

    #[test]
    fn test_provider_unknown_host() {
        assert_eq!(
            remote("https://example.com/user/repo.git").provider(),
            Provider::Unknown
        );
        assert_eq!(remote("/srv/git/repo.git").provider(), Provider::Unknown);
        assert_eq!(remote("").provider(), Provider::Unknown);
    }

    #[test]
    fn test_provider_ignores_path_fragments() {
        assert_eq!(
            remote("https://gitlab.com/github-fan/repo.git").provider(),
            Provider::GitLab
        );
        assert_eq!(
            remote("git@bitbucket.org:gitlab-mirror/repo.git").provider(),
            Provider::Bitbucket
        );
    }

    #[test]
    fn test_provider_self_hosted_instance() {
        assert_eq!(
            remote("https://gitlab.example.com/team/repo.git").provider(),
            Provider::GitLab
        );
        assert_eq!(
            remote("git@github.example.com:team/repo.git").provider(),
            Provider::GitHub
        );
    }

    #[test]
    fn test_auth_mode_http() {
        assert_eq!(
            remote("https://github.com/user/repo.git").auth_mode(),
            AuthMode::Http
        );
        assert_eq!(
            remote("http://gitlab.com/user/repo.git").auth_mode(),
            AuthMode::Http
        );
    }

    #[test]
    fn test_auth_mode_ssh() {
        assert_eq!(
            remote("git@github.com:user/repo.git").auth_mode(),
            AuthMode::Ssh
        );
        assert_eq!(
            remote("ssh://git@bitbucket.org/user/repo.git").auth_mode(),
            AuthMode::Ssh
        );
        // an "http" fragment in the path does not make it an HTTP remote
        assert_eq!(
            remote("git@github.com:user/http-client.git").auth_mode(),
            AuthMode::Ssh
        );
    }

    #[test]
    fn test_auth_mode_unknown() {
        assert_eq!(remote("/srv/git/repo.git").auth_mode(), AuthMode::Unknown);
        assert_eq!(
            remote("file:///srv/git/repo.git").auth_mode(),
            AuthMode::Unknown
        );
        assert_eq!(
            remote("git://github.com/user/repo.git").auth_mode(),
            AuthMode::Unknown
        );
    }

    #[test]
    fn test_http_and_ssh_never_both() {
        for url in [
            "https://github.com/user/repo.git",
            "git@github.com:user/repo.git",
            "ssh://git@gitlab.com/user/repo.git",
        ] {
            let mode = remote(url).auth_mode();
            assert!(mode == AuthMode::Http || mode == AuthMode::Ssh);
        }
    }

    #[test]
    fn test_host_urls() {
        assert_eq!(Provider::GitHub.host_url(), Some("github.com"));
        assert_eq!(Provider::Bitbucket.host_url(), Some("bitbucket.org"));
        assert_eq!(Provider::GitLab.host_url(), Some("gitlab.com"));
        assert_eq!(Provider::Unknown.host_url(), None);
    }
}

//! Wildcard matching for `nick!user@host` principals.
//!
//! Both principals and masks are split into up to three parts. Each part of
//! the principal is matched against the corresponding mask part with
//! shell-style wildcards (`*`, `?`, `[...]`). A part the mask leaves out
//! matches anything.

use glob::{MatchOptions, Pattern};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A principal or mask broken into its identity, local and host parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskParts<'a> {
    pub nick: &'a str,
    pub user: Option<&'a str>,
    pub host: Option<&'a str>,
}

impl<'a> MaskParts<'a> {
    /// Split `nick[!user[@host]]`. A `nick!host` form without `@` puts the
    /// remainder in the host slot.
    pub fn split(input: &'a str) -> Self {
        match input.split_once('!') {
            None => Self { nick: input, user: None, host: None },
            Some((nick, rest)) => match rest.split_once('@') {
                None => Self { nick, user: None, host: Some(rest) },
                Some((user, host)) => Self { nick, user: Some(user), host: Some(host) },
            },
        }
    }
}

/// Returns just the nickname portion of a principal.
pub fn nick_of(principal: &str) -> &str {
    MaskParts::split(principal).nick
}

/// Shell-style match of a single part. Malformed patterns degrade to a
/// literal comparison.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    // glob gives `**` a recursive meaning; a run of stars is a single star here
    let mut collapsed = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c == '*' && collapsed.ends_with('*') {
            continue;
        }
        collapsed.push(c);
    }

    match Pattern::new(&collapsed) {
        Ok(p) => p.matches_with(text, MATCH_OPTIONS),
        Err(_) => pattern == text,
    }
}

/// True iff every part present in `principal` matches the corresponding
/// part of `mask`.
pub fn mask_matches(mask: &str, principal: &str) -> bool {
    let m = MaskParts::split(mask);
    let p = MaskParts::split(principal);

    if !wildcard_match(m.nick, p.nick) {
        return false;
    }
    part_matches(m.user, p.user) && part_matches(m.host, p.host)
}

fn part_matches(mask: Option<&str>, principal: Option<&str>) -> bool {
    match (mask, principal) {
        (None, _) => true,
        (Some(_), None) => true,
        (Some(m), Some(p)) => wildcard_match(m, p),
    }
}

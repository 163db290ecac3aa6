//! # Pattern Matcher
//!
//! Decides which paths are in scope by reading `.gitattributes`-style rules.
//!
//! ## Rules
//!
//! Each non-blank, non-comment line is `pattern attr1 attr2 ...`, where an attribute is
//! `name` (set), `-name` (unset), `!name` (unspecified) or `name=value`. Only rules that
//! mention `filter` take part in the scope decision:
//!
//! ```text
//! *.secret        filter=git-safe diff=git-safe   # in scope
//! public.secret   -filter                         # out of scope again
//! *.txt           text                            # no opinion on scope
//! ```
//!
//! The **last** participating rule that matches a path decides, so later lines override
//! earlier ones the same way they do in git.
//!
//! ## Globs
//!
//! - `*` matches any run of characters except `/`; `?` matches exactly one non-`/`
//! - `[...]` character classes, with `!` or `^` for negation
//! - `**/` matches zero or more leading directories, a trailing `/**` matches everything
//!   inside a directory, and any other `**` is an ordinary `*`
//! - patterns without a `/` match the file name at any depth; patterns with a `/` (a
//!   leading `/` included) are anchored to the directory holding the attributes file
//!
//! Bad lines never stop the rest of the file from loading: they are skipped and reported as
//! [`GitSafeError::MalformedPatternLine`] warnings.
//!
//! Nothing here touches the filesystem.

use crate::error::GitSafeError;
use regex::Regex;
use std::path::{Component, Path};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrState {
    Set,
    Unset,
    Unspecified,
    Value(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub state: AttrState,
}

/// What a rule says about encryption scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Include,
    Exclude,
}

#[derive(Debug, Clone)]
pub struct PatternRule {
    pub pattern: String,
    /// Directory of the attributes file relative to the repository root; empty for the root.
    pub base: String,
    pub attributes: Vec<Attribute>,
    /// 1-based line number in the attributes file.
    pub line: usize,
    scope: Option<Scope>,
    matcher: Regex,
}

impl PatternRule {
    pub fn scope(&self) -> Option<Scope> {
        self.scope
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrState> {
        self.attributes
            .iter()
            .rev()
            .find(|a| a.name == name)
            .map(|a| &a.state)
    }

    /// Does the rule's glob match `path` (repository-relative, `/`-separated)?
    pub fn matches(&self, path: &str) -> bool {
        let relative = if self.base.is_empty() {
            path
        } else {
            match path
                .strip_prefix(self.base.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
            {
                Some(rest) => rest,
                None => return false,
            }
        };
        self.matcher.is_match(relative)
    }
}

/// Result of parsing one attributes file.
#[derive(Debug, Default)]
pub struct ParsedAttributes {
    pub rules: Vec<PatternRule>,
    /// One [`GitSafeError::MalformedPatternLine`] per skipped line.
    pub warnings: Vec<GitSafeError>,
}

impl ParsedAttributes {
    /// Append another file's rules; later files take precedence on overlap.
    pub fn extend(&mut self, other: ParsedAttributes) {
        self.rules.extend(other.rules);
        self.warnings.extend(other.warnings);
    }
}

/// Parse a root-level attributes file.
pub fn parse(text: &str, filter_name: &str) -> ParsedAttributes {
    parse_at(text, "", filter_name)
}

/// Parse an attributes file living in directory `base` (repository-relative).
pub fn parse_at(text: &str, base: &str, filter_name: &str) -> ParsedAttributes {
    let base = base.trim_matches('/').to_string();
    let mut parsed = ParsedAttributes::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        match parse_line(raw, &base, line, filter_name) {
            Ok(Some(rule)) => parsed.rules.push(rule),
            Ok(None) => {}
            Err(reason) => {
                tracing::warn!(line, base = %base, %reason, "skipping attributes line");
                parsed
                    .warnings
                    .push(GitSafeError::MalformedPatternLine { line, reason });
            }
        }
    }

    parsed
}

fn parse_line(
    raw: &str,
    base: &str,
    line: usize,
    filter_name: &str,
) -> Result<Option<PatternRule>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let (pattern, rest) = if trimmed.starts_with('"') {
        split_quoted(trimmed)?
    } else {
        match trimmed.find(char::is_whitespace) {
            Some(pos) => (trimmed[..pos].to_string(), &trimmed[pos..]),
            None => (trimmed.to_string(), ""),
        }
    };

    if pattern.starts_with("[attr]") {
        tracing::debug!(line, "ignoring attribute macro definition");
        return Ok(None);
    }
    if pattern.starts_with('!') {
        return Err(format!("negative pattern `{pattern}` is not allowed"));
    }
    if pattern.ends_with('/') {
        return Err(format!(
            "directory pattern `{pattern}` never matches files; use `{pattern}**`"
        ));
    }

    let attributes = rest
        .split_whitespace()
        .map(parse_attribute)
        .collect::<Result<Vec<_>, _>>()?;
    if attributes.is_empty() {
        return Err(format!("pattern `{pattern}` has no attributes"));
    }

    let regex = glob_to_regex(&pattern)?;
    let matcher = Regex::new(&regex).map_err(|e| format!("invalid pattern `{pattern}`: {e}"))?;

    let scope = attributes
        .iter()
        .rev()
        .find(|a| a.name == "filter")
        .map(|a| match &a.state {
            AttrState::Value(driver) if driver == filter_name => Scope::Include,
            _ => Scope::Exclude,
        });

    Ok(Some(PatternRule {
        pattern,
        base: base.to_string(),
        attributes,
        line,
        scope,
        matcher,
    }))
}

/// Split a `"quoted pattern" attrs...` line. Supports `\"`, `\\`, `\t` and `\n`.
fn split_quoted(line: &str) -> Result<(String, &str), String> {
    let mut pattern = String::new();
    let mut chars = line.char_indices().skip(1);
    while let Some((pos, c)) = chars.next() {
        match c {
            '"' => return Ok((pattern, &line[pos + 1..])),
            '\\' => match chars.next() {
                Some((_, 't')) => pattern.push('\t'),
                Some((_, 'n')) => pattern.push('\n'),
                // Keep the backslash for anything else so glob escapes survive
                Some((_, other @ ('"' | '\\'))) => pattern.push(other),
                Some((_, other)) => {
                    pattern.push('\\');
                    pattern.push(other);
                }
                None => break,
            },
            other => pattern.push(other),
        }
    }
    Err("unterminated quoted pattern".into())
}

fn parse_attribute(token: &str) -> Result<Attribute, String> {
    let (name, state) = if let Some(name) = token.strip_prefix('-') {
        (name, AttrState::Unset)
    } else if let Some(name) = token.strip_prefix('!') {
        (name, AttrState::Unspecified)
    } else if let Some((name, value)) = token.split_once('=') {
        (name, AttrState::Value(value.to_string()))
    } else {
        (token, AttrState::Set)
    };

    let valid = !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(format!("invalid attribute `{token}`"));
    }

    Ok(Attribute {
        name: name.to_string(),
        state,
    })
}

/// Translate a glob into an anchored regular expression.
pub fn glob_to_regex(pattern: &str) -> Result<String, String> {
    let (body, anchored) = match pattern.strip_prefix('/') {
        Some(stripped) => (stripped, true),
        None => (pattern, pattern.contains('/')),
    };
    if body.is_empty() {
        return Err("empty pattern".into());
    }

    let chars: Vec<char> = body.chars().collect();
    let mut out = String::from(if anchored { "^" } else { "^(?:.*/)?" });
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                let at_segment_start = i == 0 || chars[i - 1] == '/';
                let mut end = i + 2;
                // Collapse runs like `***`
                while chars.get(end) == Some(&'*') {
                    end += 1;
                }
                match chars.get(end) {
                    Some('/') if at_segment_start => {
                        out.push_str("(?:.*/)?");
                        i = end + 1;
                    }
                    None if at_segment_start => {
                        out.push_str(".*");
                        i = end;
                    }
                    // Inside a segment `**` is just `*`
                    _ => {
                        out.push_str("[^/]*");
                        i = end;
                    }
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            '[' => {
                let (class, next) = translate_class(&chars, i)?;
                out.push_str(&class);
                i = next;
            }
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| format!("trailing backslash in `{pattern}`"))?;
                out.push_str(&regex::escape(&escaped.to_string()));
                i += 2;
            }
            c => {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }

    out.push('$');
    Ok(out)
}

/// Translate the class starting at `chars[start] == '['`. Returns the regex and the index
/// just past the closing `]`.
fn translate_class(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let mut i = start + 1;
    let negated = matches!(chars.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }

    let mut members: Vec<char> = Vec::new();
    let mut first = true;
    loop {
        let c = *chars
            .get(i)
            .ok_or_else(|| "unterminated character class".to_string())?;
        if c == ']' && !first {
            i += 1;
            break;
        }
        if c == '\\' {
            let escaped = *chars
                .get(i + 1)
                .ok_or_else(|| "unterminated character class".to_string())?;
            members.push(escaped);
            i += 2;
        } else {
            members.push(c);
            i += 1;
        }
        first = false;
    }

    let mut class = String::from(if negated { "[^/" } else { "[" });
    for (idx, &c) in members.iter().enumerate() {
        let is_range = c == '-' && idx > 0 && idx + 1 < members.len();
        if is_range {
            class.push('-');
        } else if c.is_ascii_punctuation() {
            class.push('\\');
            class.push(c);
        } else {
            class.push(c);
        }
    }
    class.push(']');
    Ok((class, i))
}

/// Repository-relative, `/`-joined form of `path`. `None` for paths that escape the root.
pub fn normalize(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Scope decision for `path`: the last matching rule that has an opinion wins.
/// Paths no rule speaks for are out of scope.
pub fn is_in_scope(path: &Path, rules: &[PatternRule]) -> bool {
    let Some(path) = normalize(path) else {
        return false;
    };
    rules
        .iter()
        .rev()
        .filter(|rule| rule.scope.is_some())
        .find(|rule| rule.matches(&path))
        .map(|rule| rule.scope == Some(Scope::Include))
        .unwrap_or(false)
}

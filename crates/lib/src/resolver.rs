//! Project resolution: which tracker project receives a ticket.
//!
//! Fallback chain, first non-empty result wins:
//! 1. configured project
//! 2. recipient alias (`project@example.com` -> `project`)
//! 3. tag prefix of the subject (`[proj] - title`, `(proj) title`, `proj | title`, `proj - title`);
//!    the tag is removed from the title
//! 4. first word of the title (title kept as is)

use bitflags::bitflags;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::ticket::Ticket;

/// Project used when the title has no words at all.
pub const UNKNOWN_PROJECT: &str = "unknown bug title";

/// Characters removed from the front of the title after the subject tag.
const TAG_DELIMITERS: &[char] = &['|', '-', '(', ')', '[', ']', ' ', '\t'];

bitflags! {
    /// Sources the resolver may derive a project from when none is configured.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ResolutionStrategy: u8 {
        const RECIPIENT = 1 << 0;
        const SUBJECT = 1 << 1;
    }
}

impl Default for ResolutionStrategy {
    fn default() -> Self {
        Self::all()
    }
}

impl FromStr for ResolutionStrategy {
    type Err = String;

    /// Accepts "recipient", "subject", "all", "none" (case-insensitive), joined by `|` or `,`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = ResolutionStrategy::empty();
        for part in s.split(['|', ',']).map(str::trim).filter(|p| !p.is_empty()) {
            flags |= match part.to_ascii_lowercase().as_str() {
                "recipient" => ResolutionStrategy::RECIPIENT,
                "subject" => ResolutionStrategy::SUBJECT,
                "all" => ResolutionStrategy::all(),
                "none" | "unknown" => ResolutionStrategy::empty(),
                other => return Err(format!("unknown project source: {}", other)),
            };
        }
        Ok(flags)
    }
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            return f.write_str("all");
        }
        if self.is_empty() {
            return f.write_str("none");
        }
        if self.contains(ResolutionStrategy::RECIPIENT) {
            f.write_str("recipient")
        } else {
            f.write_str("subject")
        }
    }
}

impl Serialize for ResolutionStrategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResolutionStrategy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Static per-deployment resolution settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionConfig {
    /// Non-blank project that overrides every other source.
    pub explicit_project: Option<String>,
    pub strategy: ResolutionStrategy,
}

/// Where the resolved project came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectSource {
    /// The ticket already carried a project.
    Preset,
    Config,
    Recipient,
    Subject,
    TitleWord,
}

impl ProjectSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectSource::Preset => "preset",
            ProjectSource::Config => "config",
            ProjectSource::Recipient => "recipient",
            ProjectSource::Subject => "subject",
            ProjectSource::TitleWord => "title",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub project: String,
    pub source: ProjectSource,
}

/// `[tag]`, `(tag)`, `tag |`, `tag -`, lazily matched; leftmost alternative wins at a position.
fn subject_tag_re() -> &'static Regex {
    static RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(\[.+?\])|(\(.+?\))|(.+?)\||(.+?)-")
            .expect("failed to compile subject tag regex")
    });
    &RE
}

/// Resolve the project for `ticket`, store it in `ticket.attributes.project` and strip a
/// subject tag from the title when the project came from it.
pub fn resolve(ticket: &mut Ticket, config: &ResolutionConfig) -> Resolution {
    if let Some(project) = ticket.attributes.project.clone() {
        return Resolution {
            project,
            source: ProjectSource::Preset,
        };
    }
    let resolution = resolve_project(ticket, config);
    ticket.attributes.project = Some(resolution.project.clone());
    resolution
}

fn resolve_project(ticket: &mut Ticket, config: &ResolutionConfig) -> Resolution {
    if let Some(project) = config
        .explicit_project
        .as_deref()
        .filter(|p| !p.trim().is_empty())
    {
        return Resolution {
            project: project.to_string(),
            source: ProjectSource::Config,
        };
    }

    if config.strategy.contains(ResolutionStrategy::RECIPIENT) {
        if let Some(project) = ticket
            .attributes
            .recipient
            .as_deref()
            .map(recipient_alias)
            .filter(|p| !p.is_empty())
        {
            return Resolution {
                project: project.to_string(),
                source: ProjectSource::Recipient,
            };
        }
    }

    if config.strategy.contains(ResolutionStrategy::SUBJECT) {
        if let Some((project, title)) = split_subject_tag(&ticket.title) {
            ticket.title = title;
            return Resolution {
                project,
                source: ProjectSource::Subject,
            };
        }
    }

    let project = ticket
        .title
        .split_whitespace()
        .next()
        .unwrap_or(UNKNOWN_PROJECT)
        .to_string();
    Resolution {
        project,
        source: ProjectSource::TitleWord,
    }
}

/// Part of the address before the first `@`, or the whole string.
fn recipient_alias(recipient: &str) -> &str {
    recipient.split('@').next().unwrap_or(recipient)
}

/// Find a project tag in `title`. Returns the project and the title with the tag removed.
///
/// The longest trimmed capture is the candidate (first group wins ties). Exactly as many
/// characters as the candidate has are cut from the front of the title, then any leading
/// delimiters. A cut that would leave nothing keeps the original title.
fn split_subject_tag(title: &str) -> Option<(String, String)> {
    let caps = subject_tag_re().captures(title)?;
    let mut candidate = "";
    for group in caps.iter().skip(1).flatten() {
        let value = group.as_str().trim();
        if value.chars().count() > candidate.chars().count() {
            candidate = value;
        }
    }

    let project = candidate
        .trim_start_matches(['(', '['])
        .trim_end_matches([']', ')']);
    if project.is_empty() {
        return None;
    }

    let rest: String = title.chars().skip(candidate.chars().count()).collect();
    let rest = rest.trim_start_matches(TAG_DELIMITERS);
    let title = if rest.is_empty() { title } else { rest };
    Some((project.to_string(), title.to_string()))
}

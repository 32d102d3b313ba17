//! Fragment classification.
//!
//! Each identity is classified exactly once, by walking [`PRECEDENCE`] and
//! taking the first rule that matches.

use std::fmt;

use super::FragmentFlags;

/// Sub-flags of a client-side fragment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AsyncFlags {
    pub force: bool,
    pub critical: bool,
    pub on_demand: bool,
    pub decentralized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Governs page status, headers and cookies. Waits.
    Primary,
    /// Inlined at compile time.
    Static,
    /// Resolved before the first byte is sent.
    Waited,
    /// Streamed into its container after the first flush.
    Chunked,
    /// Left for the browser to fetch.
    ClientAsync(AsyncFlags),
}

impl Classification {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Static => "static",
            Self::Waited => "waited",
            Self::Chunked => "chunked",
            Self::ClientAsync(_) => "client-async",
        }
    }

    /// Resolved in the replace-waited step.
    pub fn waits(&self) -> bool {
        matches!(self, Self::Primary | Self::Waited)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything classification looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct Signals {
    pub flags: FragmentFlags,
    /// Some occurrence sits inside `<head>`.
    pub in_head: bool,
    /// Upstream marks the fragment static.
    pub upstream_static: bool,
}

type Rule = fn(&Signals) -> Option<Classification>;

/// Classification rules, highest priority first.
pub const PRECEDENCE: [(&str, Rule); 5] = [
    ("client-async", |s| {
        s.flags.client_async.then_some(Classification::ClientAsync(AsyncFlags {
            force: s.flags.client_async_force,
            critical: s.flags.critical,
            on_demand: s.flags.on_demand,
            decentralized: s.flags.decentralized,
        }))
    }),
    ("primary", |s| s.flags.primary.then_some(Classification::Primary)),
    ("upstream static", |s| s.upstream_static.then_some(Classification::Static)),
    ("head or should-wait", |s| {
        (s.in_head || s.flags.should_wait).then_some(Classification::Waited)
    }),
    ("default", |_| Some(Classification::Chunked)),
];

pub fn classify(signals: &Signals) -> Classification {
    PRECEDENCE
        .iter()
        .find_map(|(_, rule)| rule(signals))
        .unwrap_or(Classification::Chunked)
}

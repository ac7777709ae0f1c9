//! Routing Directive Wire Protocol for Berth
//!
//! A launch request addressed to a pre-declared placeholder must smuggle the
//! *real* target through the one auxiliary field the OS carries verbatim: an
//! ordered list of text tokens. This crate defines that wire form and the
//! codec over it.
//!
//! It is the **single source of truth** for the tag prefixes. Old and new
//! host builds coexist across an upgrade window, so the prefixes must never
//! change once deployed.
//!
//! # Tag Table
//!
//! | Prefix       | Field                          | Default when absent/unparsable |
//! |--------------|--------------------------------|--------------------------------|
//! | `plugin:`    | target plugin name             | empty string                   |
//! | `activity:`  | target screen class name       | empty string                   |
//! | `process:`   | process selector (decimal i32) | auto                           |
//! | `container:` | placeholder identity           | empty string                   |
//! | `counter:`   | generation counter (decimal)   | 0                              |
//!
//! Tokens carrying none of these prefixes are foreign and ignored. Decoding
//! never fails: a malformed integer falls back to the field default and is
//! reported as a [`Flaw`] so the host can log it. Refusing to open a screen
//! over a corrupted aux token would be worse than opening it degraded.
//!
//! # Round-trip law
//!
//! `decode(encode(d)) == d` for every directive `d`, field by field.

#![no_std]
extern crate alloc;

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use serde::{Deserialize, Serialize};

// =============================================================================
// Tag prefixes
// =============================================================================

/// Wire tag prefixes, each `<prefix><value>`.
pub mod tag {
    /// Target plugin name: `plugin:{name}`
    pub const PLUGIN: &str = "plugin:";
    /// Target screen class name: `activity:{class}`
    pub const SCREEN: &str = "activity:";
    /// Process selector: `process:{i32}`
    pub const PROCESS: &str = "process:";
    /// Placeholder identity the target was mapped to: `container:{pit}`
    pub const CONTAINER: &str = "container:";
    /// Generation counter: `counter:{u64}`
    pub const COUNTER: &str = "counter:";
}

// =============================================================================
// Process selector
// =============================================================================

/// Raw value reserved for "host picks the process".
pub const PROCESS_AUTO: i32 = i32::MIN;
/// Raw value for the UI process.
pub const PROCESS_UI: i32 = -1;
/// Raw value for the coordinator (persistent) process.
pub const PROCESS_COORDINATOR: i32 = -2;

/// Which OS process the target screen should run in.
///
/// Carried on the wire as a decimal `i32`. Custom plugin processes are
/// numbered from zero; the negative range is reserved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessSelector {
    /// Host auto-selects a process for the plugin.
    Auto,
    /// The UI process.
    Ui,
    /// The coordinator (persistent) process.
    Coordinator,
    /// A numbered custom plugin process (>= 0).
    Index(i32),
}

impl ProcessSelector {
    /// Convert from the raw wire integer.
    ///
    /// Unknown reserved values collapse to [`ProcessSelector::Auto`]; the
    /// selector is routing advice, not an authority check.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            PROCESS_AUTO => ProcessSelector::Auto,
            PROCESS_UI => ProcessSelector::Ui,
            PROCESS_COORDINATOR => ProcessSelector::Coordinator,
            n if n >= 0 => ProcessSelector::Index(n),
            _ => ProcessSelector::Auto,
        }
    }

    /// The raw wire integer for this selector.
    pub fn to_raw(self) -> i32 {
        match self {
            ProcessSelector::Auto => PROCESS_AUTO,
            ProcessSelector::Ui => PROCESS_UI,
            ProcessSelector::Coordinator => PROCESS_COORDINATOR,
            ProcessSelector::Index(n) => n,
        }
    }

    /// Human-readable display name.
    pub fn name(&self) -> &'static str {
        match self {
            ProcessSelector::Auto => "auto",
            ProcessSelector::Ui => "ui",
            ProcessSelector::Coordinator => "coordinator",
            ProcessSelector::Index(_) => "custom",
        }
    }
}

impl Default for ProcessSelector {
    fn default() -> Self {
        ProcessSelector::Auto
    }
}

impl fmt::Display for ProcessSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessSelector::Index(n) => write!(f, "custom({})", n),
            other => f.write_str(other.name()),
        }
    }
}

// =============================================================================
// Directive
// =============================================================================

/// The decoded form of a placeholder launch request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    /// Target plugin name.
    pub plugin: String,
    /// Target screen class name inside the plugin.
    pub screen: String,
    /// Desired process.
    pub process: ProcessSelector,
    /// Placeholder identity the target was mapped to.
    pub container: String,
    /// Generation counter of the placeholder binding.
    pub counter: u64,
}

/// Which integer field a malformed token was aimed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlawField {
    Process,
    Counter,
}

impl FlawField {
    pub fn name(&self) -> &'static str {
        match self {
            FlawField::Process => "process",
            FlawField::Counter => "counter",
        }
    }
}

/// A non-fatal decode defect: a known tag carried an unparsable value.
///
/// The field already holds its default by the time the flaw is reported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flaw {
    pub field: FlawField,
    /// The raw value after the prefix, as received.
    pub raw: String,
}

impl fmt::Display for Flaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tag unparsable: {:?}", self.field.name(), self.raw)
    }
}

impl Directive {
    /// Encode into the ordered wire tokens.
    ///
    /// All five tags are always emitted, in fixed order, so the output is
    /// deterministic and the round-trip law holds field by field.
    pub fn encode(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(5);
        out.push(concat_tag(tag::PLUGIN, &self.plugin));
        out.push(concat_tag(tag::SCREEN, &self.screen));
        out.push(concat_tag(tag::PROCESS, &self.process.to_raw().to_string()));
        out.push(concat_tag(tag::CONTAINER, &self.container));
        out.push(concat_tag(tag::COUNTER, &self.counter.to_string()));
        out
    }

    /// Decode from wire tokens, discarding flaw reports.
    pub fn decode<'a, I>(tokens: I) -> Directive
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::decode_reported(tokens).0
    }

    /// Decode from wire tokens.
    ///
    /// For each known tag the first matching token wins; later duplicates and
    /// foreign tokens are ignored. Absent or unparsable fields take their
    /// documented defaults. Never fails.
    pub fn decode_reported<'a, I>(tokens: I) -> (Directive, Vec<Flaw>)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut directive = Directive::default();
        let mut flaws = Vec::new();

        let mut seen_plugin = false;
        let mut seen_screen = false;
        let mut seen_process = false;
        let mut seen_container = false;
        let mut seen_counter = false;

        for token in tokens {
            if let Some(v) = strip_tag(token, tag::PLUGIN) {
                if !seen_plugin {
                    seen_plugin = true;
                    directive.plugin = v.to_string();
                }
            } else if let Some(v) = strip_tag(token, tag::SCREEN) {
                if !seen_screen {
                    seen_screen = true;
                    directive.screen = v.to_string();
                }
            } else if let Some(v) = strip_tag(token, tag::PROCESS) {
                if !seen_process {
                    seen_process = true;
                    match v.parse::<i32>() {
                        Ok(raw) => directive.process = ProcessSelector::from_raw(raw),
                        Err(_) => flaws.push(Flaw {
                            field: FlawField::Process,
                            raw: v.to_string(),
                        }),
                    }
                }
            } else if let Some(v) = strip_tag(token, tag::CONTAINER) {
                if !seen_container {
                    seen_container = true;
                    directive.container = v.to_string();
                }
            } else if let Some(v) = strip_tag(token, tag::COUNTER) {
                if !seen_counter {
                    seen_counter = true;
                    match v.parse::<u64>() {
                        Ok(counter) => directive.counter = counter,
                        Err(_) => flaws.push(Flaw {
                            field: FlawField::Counter,
                            raw: v.to_string(),
                        }),
                    }
                }
            }
            // Foreign token: ignored by design, not an error.
        }

        (directive, flaws)
    }
}

fn concat_tag(prefix: &str, value: &str) -> String {
    let mut s = String::with_capacity(prefix.len() + value.len());
    s.push_str(prefix);
    s.push_str(value);
    s
}

fn strip_tag<'a>(token: &'a str, prefix: &str) -> Option<&'a str> {
    token.strip_prefix(prefix)
}

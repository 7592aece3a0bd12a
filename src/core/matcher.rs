//! The reachability decision procedure.
//!
//! Matching runs in two passes. The strict pass only flags calls whose
//! member (or bare name) is one of the advisory's symbols. If the advisory
//! named symbols but none of them is called, a conservative pass flags every
//! call that can reach the package at all, and the outcome is marked
//! [`MatchConfidence::PackageWide`] so it can be routed to manual review
//! instead of being dropped.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::calls::CallSite;
use super::imports::{BindingKind, ImportBinding};
use super::resolver::Ecosystem;
use super::symbols::SymbolSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchConfidence {
    /// A call matched one of the advisory's symbols.
    Direct,
    /// The package is reachable but the vulnerable symbol is unconfirmed.
    PackageWide,
}

/// A call site judged vulnerable for one advisory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VulnerableCall {
    pub call: String,
    pub advisory_id: String,
    pub confidence: MatchConfidence,
    pub line: usize,
}

/// Result of matching one file against one (package, symbol set) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub calls: Vec<CallSite>,
    pub confidence: MatchConfidence,
}

impl MatchOutcome {
    fn empty(confidence: MatchConfidence) -> Self {
        Self {
            calls: Vec::new(),
            confidence,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn call_texts(&self) -> Vec<String> {
        self.calls.iter().map(CallSite::text).collect()
    }

    pub fn into_vulnerable_calls(self, advisory_id: &str) -> Vec<VulnerableCall> {
        let confidence = self.confidence;
        self.calls
            .into_iter()
            .map(|call| VulnerableCall {
                call: call.text(),
                advisory_id: advisory_id.to_string(),
                confidence,
                line: call.line,
            })
            .collect()
    }
}

/// A file's bindings for one target package, partitioned by kind.
/// Aliases are case-folded.
#[derive(Debug, Clone, Default)]
pub struct PackageBindings {
    object_aliases: HashSet<String>,
    symbol_aliases: HashSet<String>,
    tainted: bool,
}

impl PackageBindings {
    pub fn collect(bindings: &[ImportBinding], target: &str, ecosystem: Ecosystem) -> Self {
        let mut partition = Self::default();

        for binding in bindings
            .iter()
            .filter(|binding| binding.matches_package(target, ecosystem))
        {
            let aliases = binding.local_aliases.iter().map(|alias| alias.to_lowercase());
            match binding.kind() {
                BindingKind::ObjectLike => partition.object_aliases.extend(aliases),
                BindingKind::SymbolLike => partition.symbol_aliases.extend(aliases),
                BindingKind::TaintMarker => partition.tainted = true,
                BindingKind::Dropped => {}
            }
        }

        partition
    }

    /// No binding in the file can make a call reach the package.
    pub fn is_empty(&self) -> bool {
        self.object_aliases.is_empty() && self.symbol_aliases.is_empty() && !self.tainted
    }

    pub fn is_tainted(&self) -> bool {
        self.tainted
    }

    fn reaches(&self, call: &CallSite) -> bool {
        match &call.object {
            Some(object) => self.object_aliases.contains(&object.to_lowercase()),
            None => self.tainted || self.symbol_aliases.contains(&call.member.to_lowercase()),
        }
    }
}

/// Finds the calls in one file that can invoke `symbols` of `target`.
///
/// An empty `symbols` set means the affected symbols are unknown and every
/// call reaching the package is reported package-wide. Output preserves the
/// order of `calls` and contains each call text at most once.
pub fn find_vulnerable_calls(
    bindings: &[ImportBinding],
    calls: &[CallSite],
    target: &str,
    ecosystem: Ecosystem,
    symbols: &SymbolSet,
) -> MatchOutcome {
    let package_bindings = PackageBindings::collect(bindings, target, ecosystem);
    if package_bindings.is_empty() {
        let confidence = if symbols.is_empty() {
            MatchConfidence::PackageWide
        } else {
            MatchConfidence::Direct
        };
        return MatchOutcome::empty(confidence);
    }

    if !symbols.is_empty() {
        let strict = match_pass(&package_bindings, calls, Some(symbols));
        if !strict.is_empty() {
            return MatchOutcome {
                calls: strict,
                confidence: MatchConfidence::Direct,
            };
        }
    }

    MatchOutcome {
        calls: match_pass(&package_bindings, calls, None),
        confidence: MatchConfidence::PackageWide,
    }
}

fn match_pass(
    bindings: &PackageBindings,
    calls: &[CallSite],
    symbols: Option<&SymbolSet>,
) -> Vec<CallSite> {
    let mut seen = HashSet::new();
    calls
        .iter()
        .filter(|call| bindings.reaches(call))
        .filter(|call| symbols.map_or(true, |symbols| symbols.contains(&call.member)))
        .filter(|call| seen.insert(call.text()))
        .cloned()
        .collect()
}

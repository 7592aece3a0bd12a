pub mod advisory;
pub mod analyzer;
pub mod calls;
pub mod imports;
pub mod manifest;
pub mod matcher;
pub mod resolver;
pub mod scanner;
pub mod symbols;

pub use advisory::{Advisory, AdvisorySource, OsvClient, OsvClientSettings, StaticAdvisorySource};
pub use analyzer::{
    AnalyzerOptions, DiscoveredDependency, FileReport, PackageFinding, ReachabilityAnalyzer,
    ScanReport,
};
pub use calls::CallSite;
pub use imports::{BindingKind, ImportBinding, ImportForm};
pub use manifest::{ManifestIndex, VersionSpec};
pub use matcher::{find_vulnerable_calls, MatchConfidence, MatchOutcome, VulnerableCall};
pub use resolver::{hierarchical_paths, CandidatePaths, Ecosystem};
pub use scanner::{FileScanner, ScanOptions};
pub use symbols::{extract_possible_symbols, SymbolProvenance, SymbolSet};

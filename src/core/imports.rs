use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::resolver::Ecosystem;

/// Call shape an import binding makes reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingKind {
    /// Whole-module, namespace or aliased module import: needs `alias.symbol()`.
    ObjectLike,
    /// Named or destructured import: needs a bare `symbol()`.
    SymbolLike,
    /// Wildcard or dot import: any bare call in the file may come from the package.
    TaintMarker,
    /// Side-effect only import, never matchable.
    Dropped,
}

/// Every import form the parsers recognise, per language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportForm {
    /// `import x from "p"`
    EsDefault,
    /// `import * as x from "p"`
    EsNamespace,
    /// `import { a, b as c } from "p"`
    EsNamed,
    /// `import "p"`
    EsSideEffect,
    /// `const x = require("p")`
    RequireBinding,
    /// `const { a, b: c } = require("p")`
    RequireDestructured,
    /// `import x = require("p")` (TypeScript)
    TsImportRequire,
    /// `import a.b.c`
    PyImport,
    /// `import a.b.c as x`
    PyImportAs,
    /// `from a.b import c`
    PyFromImport,
    /// `from a.b import c as x`
    PyFromImportAs,
    /// `from a.b import *`
    PyWildcard,
    /// `import "path"`
    GoImport,
    /// `import alias "path"`
    GoAliased,
    /// `import . "path"`
    GoDot,
    /// `import _ "path"`
    GoBlank,
}

impl ImportForm {
    pub fn kind(self) -> BindingKind {
        match self {
            ImportForm::EsDefault
            | ImportForm::EsNamespace
            | ImportForm::RequireBinding
            | ImportForm::TsImportRequire
            | ImportForm::PyImport
            | ImportForm::PyImportAs
            | ImportForm::GoImport
            | ImportForm::GoAliased => BindingKind::ObjectLike,
            ImportForm::EsNamed | ImportForm::RequireDestructured => BindingKind::SymbolLike,
            ImportForm::PyFromImport | ImportForm::PyFromImportAs => BindingKind::SymbolLike,
            ImportForm::PyWildcard | ImportForm::GoDot => BindingKind::TaintMarker,
            ImportForm::EsSideEffect | ImportForm::GoBlank => BindingKind::Dropped,
        }
    }
}

/// Association between one import and the local names it introduces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportBinding {
    /// Package or module path exactly as written in the source.
    pub package_name: String,
    /// Identifiers usable at call sites. Empty for taint markers and
    /// dropped imports.
    pub local_aliases: Vec<String>,
    pub form: ImportForm,
    pub file: PathBuf,
}

impl ImportBinding {
    pub fn new(
        package_name: impl Into<String>,
        local_aliases: Vec<String>,
        form: ImportForm,
        file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            local_aliases,
            form,
            file: file.into(),
        }
    }

    pub fn kind(&self) -> BindingKind {
        self.form.kind()
    }

    pub fn is_matchable(&self) -> bool {
        self.kind() != BindingKind::Dropped
    }

    pub fn matches_package(&self, target: &str, ecosystem: Ecosystem) -> bool {
        binding_matches_package(&self.package_name, target, ecosystem)
    }
}

/// Whether an import of `imported` refers to the `target` package.
///
/// Case-insensitive exact match, or `imported` is a sub-module of `target`
/// under the ecosystem's separator (`golang.org/x/text/language` belongs to
/// `golang.org/x/text`, `requests.adapters` to `requests`).
pub fn binding_matches_package(imported: &str, target: &str, ecosystem: Ecosystem) -> bool {
    if target.is_empty() {
        return false;
    }
    if imported.eq_ignore_ascii_case(target) {
        return true;
    }

    let imported = imported.to_lowercase();
    let mut prefix = target.to_lowercase();
    prefix.push(ecosystem.separator());
    imported.starts_with(&prefix)
}

/// Drops exact duplicates while keeping source order.
pub fn dedup_bindings(bindings: Vec<ImportBinding>) -> Vec<ImportBinding> {
    let mut seen = std::collections::HashSet::with_capacity(bindings.len());
    bindings
        .into_iter()
        .filter(|binding| {
            seen.insert((
                binding.package_name.clone(),
                binding.local_aliases.clone(),
                binding.form,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_FORMS: &[ImportForm] = &[
        ImportForm::EsDefault,
        ImportForm::EsNamespace,
        ImportForm::EsNamed,
        ImportForm::EsSideEffect,
        ImportForm::RequireBinding,
        ImportForm::RequireDestructured,
        ImportForm::TsImportRequire,
        ImportForm::PyImport,
        ImportForm::PyImportAs,
        ImportForm::PyFromImport,
        ImportForm::PyFromImportAs,
        ImportForm::PyWildcard,
        ImportForm::GoImport,
        ImportForm::GoAliased,
        ImportForm::GoDot,
        ImportForm::GoBlank,
    ];

    #[test]
    fn object_and_symbol_forms_are_disjoint() {
        let objects: Vec<_> = ALL_FORMS
            .iter()
            .filter(|f| f.kind() == BindingKind::ObjectLike)
            .collect();
        let symbols: Vec<_> = ALL_FORMS
            .iter()
            .filter(|f| f.kind() == BindingKind::SymbolLike)
            .collect();
        assert!(objects.iter().all(|f| !symbols.contains(f)));
        assert_eq!(ImportForm::PyWildcard.kind(), BindingKind::TaintMarker);
        assert_eq!(ImportForm::GoDot.kind(), BindingKind::TaintMarker);
        assert_eq!(ImportForm::GoBlank.kind(), BindingKind::Dropped);
    }

    #[test]
    fn package_matching_uses_ecosystem_separator() {
        assert!(binding_matches_package("Lodash", "lodash", Ecosystem::Npm));
        assert!(binding_matches_package("lodash/merge", "lodash", Ecosystem::Npm));
        assert!(binding_matches_package(
            "golang.org/x/text/language",
            "golang.org/x/text",
            Ecosystem::Go
        ));
        assert!(binding_matches_package("requests.adapters", "requests", Ecosystem::PyPI));

        assert!(!binding_matches_package("requests_oauth", "requests", Ecosystem::PyPI));
        assert!(!binding_matches_package("lodash.merge", "lodash", Ecosystem::Npm));
        assert!(!binding_matches_package("golang.org/x/textual", "golang.org/x/text", Ecosystem::Go));
        assert!(!binding_matches_package("anything", "", Ecosystem::Go));
    }
}

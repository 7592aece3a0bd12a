use reachscan::core::{
    extract_possible_symbols, find_vulnerable_calls, hierarchical_paths, Ecosystem,
    MatchConfidence, SymbolSet,
};
use reachscan::parsers::{extract_source, FileExtraction, Language};
use std::path::Path;

fn extract(name: &str, language: Language, code: &str) -> FileExtraction {
    extract_source(Path::new(name), language, code).unwrap()
}

fn symbols(names: &[&str]) -> SymbolSet {
    names.iter().copied().collect()
}

#[test]
fn direct_match_on_default_import() {
    let file = extract(
        "app.js",
        Language::JavaScript,
        "import _ from \"lodash\";\n_.merge(a, b);\n",
    );

    let outcome = find_vulnerable_calls(
        &file.imports,
        &file.calls,
        "lodash",
        Ecosystem::Npm,
        &symbols(&["merge"]),
    );
    assert_eq!(outcome.call_texts(), vec!["_.merge"]);
    assert_eq!(outcome.confidence, MatchConfidence::Direct);
}

#[test]
fn unmatched_symbols_fall_back_to_package_wide() {
    let file = extract(
        "app.js",
        Language::JavaScript,
        "import _ from \"lodash\";\n_.merge(a, b);\n",
    );

    let outcome = find_vulnerable_calls(
        &file.imports,
        &file.calls,
        "lodash",
        Ecosystem::Npm,
        &symbols(&["template"]),
    );
    assert_eq!(outcome.call_texts(), vec!["_.merge"]);
    assert_eq!(outcome.confidence, MatchConfidence::PackageWide);
}

#[test]
fn wildcard_import_taints_bare_calls() {
    let file = extract(
        "app.py",
        Language::Python,
        "from pkg import *\nhelper()\n",
    );

    let outcome = find_vulnerable_calls(
        &file.imports,
        &file.calls,
        "pkg",
        Ecosystem::PyPI,
        &symbols(&["helper"]),
    );
    assert_eq!(outcome.call_texts(), vec!["helper"]);
    assert_eq!(outcome.confidence, MatchConfidence::Direct);
}

#[test]
fn submodule_import_matches_parent_package() {
    let file = extract(
        "main.go",
        Language::Go,
        r#"
package main

import "golang.org/x/text/language"

func main() {
    language.ParseAcceptLanguage(header)
}
"#,
    );

    let outcome = find_vulnerable_calls(
        &file.imports,
        &file.calls,
        "golang.org/x/text",
        Ecosystem::Go,
        &symbols(&["ParseAcceptLanguage"]),
    );
    assert_eq!(outcome.call_texts(), vec!["language.ParseAcceptLanguage"]);
}

#[test]
fn unrelated_package_matches_nothing() {
    let file = extract(
        "app.js",
        Language::JavaScript,
        "import _ from \"underscore\";\n_.merge(a, b);\n",
    );

    let outcome = find_vulnerable_calls(
        &file.imports,
        &file.calls,
        "lodash",
        Ecosystem::Npm,
        &symbols(&["merge"]),
    );
    assert!(outcome.is_empty());
}

#[test]
fn matcher_is_idempotent_and_round_trips_call_text() {
    let file = extract(
        "app.js",
        Language::JavaScript,
        r#"
const _ = require("lodash");
const { template } = require("lodash");
_.merge(a, b);
template(x);
_.merge(c, d);
_.pick(o, "k");
other();
"#,
    );
    let set = SymbolSet::new();

    let first = find_vulnerable_calls(&file.imports, &file.calls, "lodash", Ecosystem::Npm, &set);
    let second = find_vulnerable_calls(&file.imports, &file.calls, "lodash", Ecosystem::Npm, &set);
    assert_eq!(first, second);
    assert_eq!(first.call_texts(), vec!["_.merge", "template", "_.pick"]);
    assert_eq!(first.confidence, MatchConfidence::PackageWide);

    let extracted: Vec<String> = file.calls.iter().map(|call| call.text()).collect();
    for text in first.call_texts() {
        assert!(extracted.contains(&text));
    }
}

#[test]
fn hierarchical_paths_are_most_specific_first() {
    let paths = hierarchical_paths("golang.org/x/text/language", Ecosystem::Go);
    assert_eq!(
        paths.paths(),
        [
            "golang.org/x/text/language",
            "golang.org/x/text",
            "golang.org/x",
            "golang.org",
        ]
    );

    for (name, ecosystem) in [
        ("lodash", Ecosystem::Npm),
        ("@babel/core", Ecosystem::Npm),
        ("requests.adapters", Ecosystem::PyPI),
    ] {
        let paths = hierarchical_paths(name, ecosystem);
        assert!(!paths.is_empty());
        assert_eq!(paths.paths()[0], name);
    }
}

#[test]
fn mined_symbols_exclude_the_package_name() {
    let mined = extract_possible_symbols("lodash", "calls the `merge()` function", "");
    assert!(mined.contains(&"merge".to_string()));
    assert!(!mined.iter().any(|symbol| symbol.eq_ignore_ascii_case("lodash")));
}

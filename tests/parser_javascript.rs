use reachscan::core::{BindingKind, ImportForm};
use reachscan::parsers::{extract_file, extract_source, FileExtraction, Language};
use std::fs;
use std::path::Path;

fn extract(code: &str) -> FileExtraction {
    extract_source(Path::new("app.js"), Language::JavaScript, code).unwrap()
}

fn aliases_for(extraction: &FileExtraction, package: &str) -> Vec<(ImportForm, Vec<String>)> {
    extraction
        .imports
        .iter()
        .filter(|binding| binding.package_name == package)
        .map(|binding| (binding.form, binding.local_aliases.clone()))
        .collect()
}

#[test]
fn es_import_forms_map_to_bindings() {
    let extraction = extract(
        r#"
import _ from "lodash";
import * as path from "path-browserify";
import { merge, template as tpl } from "lodash-es";
import "polyfill";
"#,
    );

    assert_eq!(
        aliases_for(&extraction, "lodash"),
        vec![(ImportForm::EsDefault, vec!["_".to_string()])]
    );
    assert_eq!(
        aliases_for(&extraction, "path-browserify"),
        vec![(ImportForm::EsNamespace, vec!["path".to_string()])]
    );
    assert_eq!(
        aliases_for(&extraction, "lodash-es"),
        vec![(ImportForm::EsNamed, vec!["merge".to_string(), "tpl".to_string()])]
    );

    let side_effect = &aliases_for(&extraction, "polyfill")[0];
    assert_eq!(side_effect.0, ImportForm::EsSideEffect);
    assert!(side_effect.1.is_empty());
    assert_eq!(side_effect.0.kind(), BindingKind::Dropped);
}

#[test]
fn default_and_named_in_one_statement_give_two_bindings() {
    let extraction = extract(r#"import React, { useState } from "react";"#);

    let bindings = aliases_for(&extraction, "react");
    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings[0], (ImportForm::EsDefault, vec!["React".to_string()]));
    assert_eq!(bindings[1], (ImportForm::EsNamed, vec!["useState".to_string()]));
}

#[test]
fn require_forms() {
    let extraction = extract(
        r#"
const express = require("express");
const { exec, spawn: run } = require("child-proc");
var merge = require('lodash').merge;
"#,
    );

    assert_eq!(
        aliases_for(&extraction, "express"),
        vec![(ImportForm::RequireBinding, vec!["express".to_string()])]
    );
    assert_eq!(
        aliases_for(&extraction, "child-proc"),
        vec![(
            ImportForm::RequireDestructured,
            vec!["exec".to_string(), "run".to_string()]
        )]
    );
    assert_eq!(
        aliases_for(&extraction, "lodash"),
        vec![(ImportForm::RequireDestructured, vec!["merge".to_string()])]
    );
}

#[test]
fn calls_are_canonicalised_and_deduplicated() {
    let extraction = extract(
        r#"
import _ from "lodash";
_.merge(a, b);
helper();
_.merge(c, d);
app.router.use(fn);
getThing()();
"#,
    );

    let texts: Vec<String> = extraction.calls.iter().map(|call| call.text()).collect();
    assert_eq!(texts, vec!["_.merge", "helper", "app.use", "getThing"]);
    assert_eq!(extraction.calls[0].line, 3);
    assert!(!extraction.via_fallback);
}

#[test]
fn every_binding_has_exactly_one_kind() {
    let extraction = extract(
        r#"
import a from "p1";
import * as b from "p2";
import { c } from "p3";
import "p4";
const d = require("p5");
const { e } = require("p6");
"#,
    );

    assert_eq!(extraction.imports.len(), 6);
    for binding in &extraction.imports {
        let kind = binding.kind();
        let object_like = kind == BindingKind::ObjectLike;
        let symbol_like = kind == BindingKind::SymbolLike;
        assert!(!(object_like && symbol_like));
    }
}

#[test]
fn broken_file_is_a_parse_error_unless_fallback_is_enabled() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join("broken.js");
    fs::write(
        &file,
        "const _ = require(\"lodash\");\n_.merge(a, b);\nfunction (( {\n",
    )
    .unwrap();

    assert!(extract_file(&file, false).is_err());

    let extraction = extract_file(&file, true).unwrap();
    assert!(extraction.via_fallback);
    assert_eq!(
        aliases_for(&extraction, "lodash"),
        vec![(ImportForm::RequireBinding, vec!["_".to_string()])]
    );
    assert!(extraction.calls.iter().any(|call| call.text() == "_.merge"));
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join("notes.txt");
    fs::write(&file, "hello").unwrap();

    let err = extract_file(&file, false).unwrap_err();
    assert!(err.is_file_level());
}

#[test]
fn awaited_and_parenthesised_callees_keep_their_member_form() {
    let extraction = extract(
        r#"
import axios from "axios";
import _ from "lodash";

async function sync(url, a, b) {
    const res = await axios.get(url);
    return (_.merge)(a, res.data);
}
"#,
    );

    let calls: Vec<(String, usize)> = extraction
        .calls
        .iter()
        .map(|call| (call.text(), call.line))
        .collect();
    assert!(calls.contains(&("axios.get".to_string(), 6)));
    assert!(calls.contains(&("_.merge".to_string(), 7)));
}

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reachscan::core::{
    find_vulnerable_calls, hierarchical_paths, Advisory, AnalyzerOptions, Ecosystem,
    ReachabilityAnalyzer, StaticAdvisorySource, SymbolSet,
};
use reachscan::parsers::{extract_source, Language};
use std::path::Path;

fn sample_module(i: usize) -> String {
    format!(
        r#"
import _ from "lodash";
import {{ sanitize }} from "dompurify";
const express = require("express");

export class Service{i} {{
    constructor(options) {{
        this.options = _.merge({{}}, options);
    }}

    render(html) {{
        return sanitize(_.template(html)({{ id: {i} }}));
    }}

    route(app) {{
        app.use(express.static("public"));
        return _.pick(this.options, ["port", "host"]);
    }}
}}
"#
    )
}

fn benchmark_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extraction");
    let source = sample_module(0);

    group.bench_function("javascript_module", |b| {
        b.iter(|| {
            let extraction =
                extract_source(Path::new("service.js"), Language::JavaScript, black_box(&source));
            black_box(extraction)
        });
    });

    group.finish();
}

fn benchmark_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("matching");
    let extraction =
        extract_source(Path::new("service.js"), Language::JavaScript, &sample_module(0)).unwrap();
    let direct: SymbolSet = ["template"].into_iter().collect();
    let missing: SymbolSet = ["zipObjectDeep"].into_iter().collect();

    group.bench_function("direct_match", |b| {
        b.iter(|| {
            black_box(find_vulnerable_calls(
                &extraction.imports,
                &extraction.calls,
                black_box("lodash"),
                Ecosystem::Npm,
                &direct,
            ))
        });
    });

    group.bench_function("package_wide_fallback", |b| {
        b.iter(|| {
            black_box(find_vulnerable_calls(
                &extraction.imports,
                &extraction.calls,
                black_box("lodash"),
                Ecosystem::Npm,
                &missing,
            ))
        });
    });

    group.bench_function("hierarchical_paths", |b| {
        b.iter(|| black_box(hierarchical_paths(black_box("golang.org/x/text/language"), Ecosystem::Go)));
    });

    group.finish();
}

fn benchmark_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("repository_analysis");
    group.sample_size(20);

    let test_dir = tempfile::TempDir::new().unwrap();
    for i in 0..100 {
        std::fs::write(test_dir.path().join(format!("service_{i}.js")), sample_module(i)).unwrap();
    }
    std::fs::write(
        test_dir.path().join("package.json"),
        r#"{ "dependencies": { "lodash": "4.17.20", "express": "^4.18.0" } }"#,
    )
    .unwrap();

    let advisories: Vec<Advisory> = serde_json::from_str(
        r#"[{
            "id": "GHSA-35jh-r3h4-6jhm",
            "summary": "Command Injection in lodash",
            "details": "`template` is vulnerable to command injection.",
            "affected": [{ "package": { "name": "lodash", "ecosystem": "npm" } }]
        }]"#,
    )
    .unwrap();

    group.bench_function("hundred_files", |b| {
        b.iter(|| {
            let analyzer = ReachabilityAnalyzer::new(
                StaticAdvisorySource::new(advisories.clone()),
                AnalyzerOptions::default(),
            );
            black_box(analyzer.analyze(black_box(test_dir.path())))
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_extraction, benchmark_matching, benchmark_analysis);
criterion_main!(benches);

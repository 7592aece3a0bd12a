use reachscan::core::{BindingKind, ImportForm};
use reachscan::parsers::{extract_file, extract_source, Language};
use std::fs;
use std::path::Path;

#[test]
fn typescript_parser_extracts_imports_and_calls() {
    let code = r#"
import axios from "axios";
import { sanitize } from "dompurify";
import fs = require("fs-extra");

export async function load(url: string): Promise<string> {
    const response = await axios.get<string>(url);
    fs.writeFileSync("out.txt", sanitize(response.data));
    return response.data;
}
"#;

    let extraction = extract_source(Path::new("load.ts"), Language::TypeScript, code).unwrap();

    let axios = extraction
        .imports
        .iter()
        .find(|binding| binding.package_name == "axios")
        .unwrap();
    assert_eq!(axios.form, ImportForm::EsDefault);
    assert_eq!(axios.kind(), BindingKind::ObjectLike);

    let dompurify = extraction
        .imports
        .iter()
        .find(|binding| binding.package_name == "dompurify")
        .unwrap();
    assert_eq!(dompurify.local_aliases, vec!["sanitize"]);
    assert_eq!(dompurify.kind(), BindingKind::SymbolLike);

    let fs_extra = extraction
        .imports
        .iter()
        .find(|binding| binding.package_name == "fs-extra")
        .unwrap();
    assert_eq!(fs_extra.form, ImportForm::TsImportRequire);
    assert_eq!(fs_extra.local_aliases, vec!["fs"]);

    let texts: Vec<String> = extraction.calls.iter().map(|call| call.text()).collect();
    assert!(texts.contains(&"axios.get".to_string()));
    assert!(texts.contains(&"fs.writeFileSync".to_string()));
    assert!(texts.contains(&"sanitize".to_string()));
}

#[test]
fn tsx_files_use_the_tsx_grammar() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join("Widget.tsx");
    fs::write(
        &file,
        r#"
import marked from "marked";

export const Widget = ({ text }: { text: string }) => (
    <div dangerouslySetInnerHTML={{ __html: marked.parse(text) }} />
);
"#,
    )
    .unwrap();

    let extraction = extract_file(&file, false).unwrap();
    assert_eq!(extraction.language, Language::Tsx);
    assert_eq!(extraction.imports[0].package_name, "marked");
    assert!(extraction.calls.iter().any(|call| call.text() == "marked.parse"));
}

#[test]
fn require_inside_typescript_is_recognised() {
    let code = "const { exec } = require(\"shelljs\");\nexec(cmd);\n";
    let extraction = extract_source(Path::new("run.ts"), Language::TypeScript, code).unwrap();

    assert_eq!(extraction.imports.len(), 1);
    assert_eq!(extraction.imports[0].form, ImportForm::RequireDestructured);
    assert!(extraction.calls.iter().any(|call| call.text() == "exec"));
}

#[test]
fn generic_and_non_null_callees_render_as_member_calls() {
    let code = r#"
import axios from "axios";

export async function post(url: string, body: unknown, client?: typeof axios) {
    const first = await axios.get<string>(url);
    const second = await client!.post<string>(url, body);
    return [first, second];
}
"#;
    let extraction = extract_source(Path::new("post.ts"), Language::TypeScript, code).unwrap();

    let texts: Vec<String> = extraction.calls.iter().map(|call| call.text()).collect();
    assert!(texts.contains(&"axios.get".to_string()));
    assert!(texts.contains(&"client.post".to_string()));
    assert!(extraction
        .calls
        .iter()
        .any(|call| call.text() == "axios.get" && call.line == 5));
}

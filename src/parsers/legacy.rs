//! Regex extraction for ES-module sources the grammar rejects.
//!
//! Coarser than the tree-sitter path: it only sees top-level `require` /
//! `import` forms and `object.property(` call shapes, but it keeps a file
//! with a syntax error (or newer syntax than the grammar knows) in the scan.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::Path;

use super::{FileExtraction, Language};
use crate::core::calls::dedup_calls;
use crate::core::imports::dedup_bindings;
use crate::core::{CallSite, ImportBinding, ImportForm};

static BLOCK_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment pattern"));

/// `//` comments, except the `//` of a URL scheme.
static LINE_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(^|[^:])//.*$").expect("line comment pattern"));

static REQUIRE_BINDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*require\(\s*['"]([^'"]+)['"]\s*\)"#)
        .expect("require pattern")
});

static REQUIRE_DESTRUCTURED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:const|let|var)\s*\{([^}]*)\}\s*=\s*require\(\s*['"]([^'"]+)['"]\s*\)"#)
        .expect("destructured require pattern")
});

static IMPORT_DEFAULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s+([A-Za-z_$][\w$]*)\s*(?:,\s*\{[^}]*\}\s*)?from\s*['"]([^'"]+)['"]"#)
        .expect("default import pattern")
});

static IMPORT_NAMESPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s+\*\s+as\s+([A-Za-z_$][\w$]*)\s+from\s*['"]([^'"]+)['"]"#)
        .expect("namespace import pattern")
});

static IMPORT_NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s+(?:[A-Za-z_$][\w$]*\s*,\s*)?\{([^}]*)\}\s*from\s*['"]([^'"]+)['"]"#)
        .expect("named import pattern")
});

static MEMBER_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Za-z_$][\w$]*)\.([A-Za-z_$][\w$]*)\s*\(").expect("member call pattern")
});

/// Property names that are file extensions or TLDs rather than methods.
const NON_METHOD_SUFFIXES: &[&str] = &[
    "js", "mjs", "cjs", "ts", "tsx", "jsx", "json", "html", "css", "md", "com", "org", "net",
    "io", "dev",
];

pub fn extract(file_path: &Path, language: Language, source: &str) -> FileExtraction {
    let code = strip_comments(source);

    FileExtraction {
        path: file_path.to_path_buf(),
        language,
        imports: dedup_bindings(extract_imports(&code, file_path)),
        calls: dedup_calls(extract_calls(&code)),
        via_fallback: true,
    }
}

/// Blanks comments while keeping line numbering intact.
fn strip_comments(source: &str) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(source, |caps: &Captures| {
        "\n".repeat(caps[0].matches('\n').count())
    });
    LINE_COMMENT
        .replace_all(&without_blocks, "$1")
        .into_owned()
}

fn extract_imports(code: &str, file_path: &Path) -> Vec<ImportBinding> {
    let mut bindings = Vec::new();

    let single = [
        (&*REQUIRE_BINDING, ImportForm::RequireBinding),
        (&*IMPORT_DEFAULT, ImportForm::EsDefault),
        (&*IMPORT_NAMESPACE, ImportForm::EsNamespace),
    ];
    for (pattern, form) in single {
        for caps in pattern.captures_iter(code) {
            bindings.push(ImportBinding::new(
                &caps[2],
                vec![caps[1].to_string()],
                form,
                file_path,
            ));
        }
    }

    let grouped = [
        (&*REQUIRE_DESTRUCTURED, ImportForm::RequireDestructured, ':'),
        (&*IMPORT_NAMED, ImportForm::EsNamed, ' '),
    ];
    for (pattern, form, rename) in grouped {
        for caps in pattern.captures_iter(code) {
            let aliases = local_names(&caps[1], rename);
            if !aliases.is_empty() {
                bindings.push(ImportBinding::new(&caps[2], aliases, form, file_path));
            }
        }
    }

    bindings
}

/// Local names from `a, b: c, d = 1` (require) or `a, b as c` (import).
fn local_names(list: &str, rename: char) -> Vec<String> {
    list.split(',')
        .filter_map(|entry| {
            let entry = entry.split('=').next().unwrap_or_default().trim();
            let local = match rename {
                ':' => entry.rsplit(':').next(),
                _ => entry.split(" as ").last(),
            }?;
            let local = local.trim();
            (!local.is_empty() && !local.starts_with("...")).then(|| local.to_string())
        })
        .collect()
}

fn extract_calls(code: &str) -> Vec<CallSite> {
    MEMBER_CALL
        .captures_iter(code)
        .filter(|caps| !NON_METHOD_SUFFIXES.contains(&caps[2].to_ascii_lowercase().as_str()))
        .filter_map(|caps| {
            let start = caps.get(0)?.start();
            let line = code[..start].matches('\n').count() + 1;
            Some(CallSite::qualified(&caps[1], &caps[2], line))
        })
        .collect()
}

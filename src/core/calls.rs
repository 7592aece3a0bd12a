use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A call expression rendered in canonical form.
///
/// Either a bare `identifier` call or an `object.member` call, where
/// `object` is the left-most identifier of the callee chain and `member` is
/// the name actually invoked (`a.b.c()` renders as `a.c`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallSite {
    pub object: Option<String>,
    pub member: String,
    /// 1-based line of the first occurrence in the file.
    pub line: usize,
}

impl CallSite {
    pub fn bare(name: impl Into<String>, line: usize) -> Self {
        Self {
            object: None,
            member: name.into(),
            line,
        }
    }

    pub fn qualified(object: impl Into<String>, member: impl Into<String>, line: usize) -> Self {
        Self {
            object: Some(object.into()),
            member: member.into(),
            line,
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.object.is_some()
    }

    pub fn text(&self) -> String {
        match &self.object {
            Some(object) => format!("{}.{}", object, self.member),
            None => self.member.clone(),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.object {
            Some(object) => write!(f, "{}.{}", object, self.member),
            None => f.write_str(&self.member),
        }
    }
}

/// Collapses duplicate call texts, keeping the first occurrence.
pub fn dedup_calls(calls: Vec<CallSite>) -> Vec<CallSite> {
    let mut seen = HashSet::with_capacity(calls.len());
    calls
        .into_iter()
        .filter(|call| seen.insert(call.text()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_line() {
        let calls = vec![
            CallSite::qualified("_", "merge", 3),
            CallSite::bare("helper", 4),
            CallSite::qualified("_", "merge", 9),
        ];
        let deduped = dedup_calls(calls);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].text(), "_.merge");
        assert_eq!(deduped[0].line, 3);
        assert_eq!(deduped[1].to_string(), "helper");
    }
}

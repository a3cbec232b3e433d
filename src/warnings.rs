//! Warning catalog
//!
//! The catalog is closed and versioned with the crate: configuration entries
//! are validated against it, and an unknown name is rejected together with
//! the nearest known name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rule group a warning belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleGroup {
    /// Indentation and line layout
    Layout,
    /// Declaration placement and ordering
    Declarations,
    /// Comment hygiene
    Comments,
}

impl fmt::Display for RuleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleGroup::Layout => write!(f, "layout"),
            RuleGroup::Declarations => write!(f, "declarations"),
            RuleGroup::Comments => write!(f, "comments"),
        }
    }
}

/// One entry in the warning catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Warning {
    /// Unique short name, used in configuration and baselines
    pub id: &'static str,
    /// Group the warning belongs to
    pub group: RuleGroup,
    /// Message template; `{0}`, `{1}`, ... are filled by the emitting check
    pub message: &'static str,
    /// Whether the owning check can rewrite the tree to resolve it
    pub auto_fixable: bool,
}

impl Warning {
    /// Fill the message template with positional arguments
    pub fn format_message(&self, args: &[&str]) -> String {
        let mut out = self.message.to_string();
        for (i, arg) in args.iter().enumerate() {
            out = out.replace(&format!("{{{}}}", i), arg);
        }
        out
    }
}

pub const WRONG_INDENTATION: Warning = Warning {
    id: "wrong-indentation",
    group: RuleGroup::Layout,
    message: "expected an indentation of {0} but was {1}",
    auto_fixable: true,
};

pub const DECLARATION_FAR_FROM_USAGE: Warning = Warning {
    id: "declaration-far-from-usage",
    group: RuleGroup::Declarations,
    message: "variable '{0}' declared on line {1} but first used on line {2}",
    auto_fixable: false,
};

pub const COMMENTED_OUT_CODE: Warning = Warning {
    id: "commented-out-code",
    group: RuleGroup::Comments,
    message: "commented-out code should be removed: {0}",
    auto_fixable: false,
};

pub const TRAILING_WHITESPACE: Warning = Warning {
    id: "trailing-whitespace",
    group: RuleGroup::Layout,
    message: "trailing whitespace at end of line",
    auto_fixable: true,
};

/// Synthetic diagnostic id for files the parser rejects
pub const PARSE_ERROR_ID: &str = "parse-error";

/// The full, closed catalog
pub const CATALOG: &[Warning] = &[
    WRONG_INDENTATION,
    DECLARATION_FAR_FROM_USAGE,
    COMMENTED_OUT_CODE,
    TRAILING_WHITESPACE,
];

/// Look up a warning by id
pub fn find(id: &str) -> Option<&'static Warning> {
    CATALOG.iter().find(|w| w.id == id)
}

/// Nearest catalog name to an unknown configuration name, by edit distance
pub fn suggest_nearest(unknown: &str) -> Option<&'static str> {
    CATALOG
        .iter()
        .map(|w| (w.id, edit_distance(unknown, w.id)))
        .min_by_key(|&(_, d)| d)
        .map(|(id, _)| id)
}

/// Levenshtein distance over bytes
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<u8> = a.bytes().collect();
    let b: Vec<u8> = b.bytes().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_ids_unique() {
        for (i, a) in CATALOG.iter().enumerate() {
            for b in &CATALOG[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn test_find() {
        assert!(find("wrong-indentation").is_some());
        assert!(find("no-such-warning").is_none());
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("abc", "abc"), 0);
        assert_eq!(edit_distance("abc", "abd"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_suggest_nearest() {
        assert_eq!(
            suggest_nearest("wrong-indentatoin"),
            Some("wrong-indentation")
        );
        assert_eq!(
            suggest_nearest("comented-out-code"),
            Some("commented-out-code")
        );
    }

    #[test]
    fn test_message_template() {
        let msg = WRONG_INDENTATION.format_message(&["8", "4"]);
        assert_eq!(msg, "expected an indentation of 8 but was 4");
    }
}

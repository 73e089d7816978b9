//! Language strategies
//!
//! Resolves requested language ids and supplies per-language toolchain data.
//! The compiled languages share one pipeline runner; a `Toolchain` only
//! describes what differs between them: how source is prepared and named,
//! the compile and run command lines, and which build products to expect.
//! The script language runs in process and has no toolchain.

pub mod jvm;
pub mod native;
pub mod script;

use crate::config::types::{ExecError, Language, Result};
use crate::scratch::{ArtifactKind, Scratch};
use std::borrow::Cow;
use std::path::PathBuf;

/// Per-language data for the compile/run pipeline.
///
/// Implementations carry no state; every derivation is a pure function of
/// the submitted source and the request's scratch directory.
pub trait Toolchain {
    /// Canonical id used in logs and diagnostics
    fn language(&self) -> &'static str;

    /// Rewrite the submitted source before staging. The default stages it
    /// untouched.
    fn prepare_source<'a>(&self, source: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(source)
    }

    /// Name of the compiled unit derived from the source
    fn unit_name(&self, source: &str) -> String;

    /// File name the prepared source is staged under
    fn source_file_name(&self, unit: &str) -> String;

    /// Compiler invocation as an argv vector. Paths go in as plain
    /// arguments; nothing is shell-interpreted, so spaces need no quoting.
    fn compile_command(&self, scratch: &Scratch, unit: &str) -> Vec<String>;

    /// Run invocation as an argv vector
    fn run_command(&self, scratch: &Scratch, unit: &str) -> Vec<String>;

    /// Build products the compile stage is expected to leave behind,
    /// registered with the scratch directory for cleanup accounting
    fn build_products(&self, scratch: &Scratch, unit: &str) -> Vec<(PathBuf, ArtifactKind)>;
}

/// Resolve a requested language id through the alias vocabulary.
///
/// Ids are trimmed and matched case-insensitively. Anything outside the
/// vocabulary is rejected; nothing ever falls back to a default strategy.
pub fn resolve_language(id: &str) -> Result<Language> {
    match id.trim().to_ascii_lowercase().as_str() {
        "script" | "interpreted" => Ok(Language::Script),
        "jvm" | "java" => Ok(Language::Jvm),
        "native" | "cpp" | "c++" | "cxx" | "cc" => Ok(Language::Native),
        _ => Err(ExecError::UnsupportedLanguage(id.trim().to_string())),
    }
}

/// Toolchain for a compiled language; `None` for the in-process script
/// strategy.
pub fn toolchain_for(language: Language) -> Option<&'static dyn Toolchain> {
    match language {
        Language::Script => None,
        Language::Jvm => Some(&jvm::JvmToolchain),
        Language::Native => Some(&native::NativeToolchain),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_aliases() {
        for id in ["script", "interpreted"] {
            assert_eq!(resolve_language(id).unwrap(), Language::Script);
        }
        for id in ["jvm", "java"] {
            assert_eq!(resolve_language(id).unwrap(), Language::Jvm);
        }
        for id in ["native", "cpp", "c++", "cxx", "cc"] {
            assert_eq!(resolve_language(id).unwrap(), Language::Native);
        }
    }

    #[test]
    fn test_resolve_normalizes_case_and_whitespace() {
        assert_eq!(resolve_language("  Java ").unwrap(), Language::Jvm);
        assert_eq!(resolve_language("C++").unwrap(), Language::Native);
        assert_eq!(resolve_language("SCRIPT").unwrap(), Language::Script);
    }

    #[test]
    fn test_unknown_language_is_rejected() {
        let err = resolve_language("cobol").unwrap_err();
        match err {
            ExecError::UnsupportedLanguage(id) => assert_eq!(id, "cobol"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_script_has_no_toolchain() {
        assert!(toolchain_for(Language::Script).is_none());
        assert!(toolchain_for(Language::Jvm).is_some());
        assert!(toolchain_for(Language::Native).is_some());
    }
}

//! JVM language toolchain
//!
//! The compiled unit name is parsed from the source's `public class`
//! declaration because the JVM ties the class name to both the source file
//! name and the run invocation. Source without such a declaration is wrapped
//! in a minimal entry-point shell so bare statements still compile and run.

use crate::lang::Toolchain;
use crate::scratch::{ArtifactKind, Scratch};
use std::borrow::Cow;
use std::path::PathBuf;

/// Unit name used when the source declares no public class
const DEFAULT_UNIT: &str = "Main";

/// JVM toolchain data: `javac` to compile, `java` to run.
#[derive(Debug, Clone, Default)]
pub struct JvmToolchain;

impl Toolchain for JvmToolchain {
    fn language(&self) -> &'static str {
        "jvm"
    }

    fn prepare_source<'a>(&self, source: &'a str) -> Cow<'a, str> {
        if parse_public_class(source).is_some() {
            return Cow::Borrowed(source);
        }
        Cow::Owned(format!(
            "public class {DEFAULT_UNIT} {{\n    public static void main(String[] args) {{\n{source}\n    }}\n}}\n"
        ))
    }

    fn unit_name(&self, source: &str) -> String {
        parse_public_class(source).unwrap_or_else(|| DEFAULT_UNIT.to_string())
    }

    fn source_file_name(&self, unit: &str) -> String {
        format!("{unit}.java")
    }

    fn compile_command(&self, scratch: &Scratch, unit: &str) -> Vec<String> {
        let source = scratch.dir().join(self.source_file_name(unit));
        vec!["javac".to_string(), source.display().to_string()]
    }

    fn run_command(&self, scratch: &Scratch, unit: &str) -> Vec<String> {
        vec![
            "java".to_string(),
            "-cp".to_string(),
            scratch.dir().display().to_string(),
            unit.to_string(),
        ]
    }

    fn build_products(&self, scratch: &Scratch, unit: &str) -> Vec<(PathBuf, ArtifactKind)> {
        vec![(
            scratch.dir().join(format!("{unit}.class")),
            ArtifactKind::ClassFile,
        )]
    }
}

/// Find the identifier of the first `public class` declaration.
///
/// Matching works on whitespace-split words, so `public final class` does
/// not match and falls through to the wrapping path.
fn parse_public_class(source: &str) -> Option<String> {
    let mut words = source.split_whitespace().peekable();
    while let Some(word) = words.next() {
        if word != "public" || words.peek() != Some(&"class") {
            continue;
        }
        words.next();

        let name: String = words
            .next()?
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
            .collect();
        let starts_like_ident = name
            .chars()
            .next()
            .map_or(false, |c| !c.is_ascii_digit());
        if starts_like_ident {
            return Some(name);
        }
        return None;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch::ScratchRoot;

    #[test]
    fn test_parses_declared_class_name() {
        let source = "public class Solution { public static void main(String[] a) {} }";
        assert_eq!(parse_public_class(source), Some("Solution".to_string()));
        assert_eq!(JvmToolchain.unit_name(source), "Solution");
    }

    #[test]
    fn test_parses_name_with_attached_brace() {
        assert_eq!(
            parse_public_class("public class Foo{int x;}"),
            Some("Foo".to_string())
        );
    }

    #[test]
    fn test_parses_name_before_extends_clause() {
        assert_eq!(
            parse_public_class("public class Child extends Base {}"),
            Some("Child".to_string())
        );
    }

    #[test]
    fn test_no_declaration_falls_back_to_main() {
        assert_eq!(JvmToolchain.unit_name("System.out.println(1);"), "Main");
        assert_eq!(parse_public_class("class Hidden {}"), None);
    }

    #[test]
    fn test_bare_statements_are_wrapped() {
        let prepared = JvmToolchain.prepare_source("System.out.println(\"ok\");");
        assert!(prepared.contains("public class Main"));
        assert!(prepared.contains("public static void main(String[] args)"));
        assert!(prepared.contains("System.out.println(\"ok\");"));
    }

    #[test]
    fn test_declared_class_is_not_wrapped() {
        let source = "public class App { public static void main(String[] a) {} }";
        let prepared = JvmToolchain.prepare_source(source);
        assert_eq!(prepared.as_ref(), source);
    }

    #[test]
    fn test_commands_reference_the_scratch_unit() {
        let temp = tempfile::tempdir().unwrap();
        let root = ScratchRoot::new(temp.path().to_path_buf()).unwrap();
        let scratch = root.create_scratch().unwrap();

        let compile = JvmToolchain.compile_command(&scratch, "App");
        assert_eq!(compile[0], "javac");
        assert!(compile[1].ends_with("App.java"));

        let run = JvmToolchain.run_command(&scratch, "App");
        assert_eq!(run[0], "java");
        assert_eq!(run[1], "-cp");
        assert_eq!(run[2], scratch.dir().display().to_string());
        assert_eq!(run[3], "App");

        let products = JvmToolchain.build_products(&scratch, "App");
        assert_eq!(products.len(), 1);
        assert!(products[0].0.ends_with("App.class"));
        assert_eq!(products[0].1, ArtifactKind::ClassFile);
    }
}

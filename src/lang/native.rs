//! Native language toolchain
//!
//! Fixed unit naming: the source stages as `main.cpp` and compiles to `main`
//! plus the platform executable suffix. The run stage invokes the produced
//! binary by absolute path with the scratch directory as its working
//! directory.

use crate::lang::Toolchain;
use crate::scratch::{ArtifactKind, Scratch};
use std::env::consts::EXE_SUFFIX;
use std::path::PathBuf;

/// Native toolchain data: `g++` to compile, the produced binary to run.
#[derive(Debug, Clone, Default)]
pub struct NativeToolchain;

impl NativeToolchain {
    fn exe_path(&self, scratch: &Scratch, unit: &str) -> PathBuf {
        scratch.dir().join(unit)
    }
}

impl Toolchain for NativeToolchain {
    fn language(&self) -> &'static str {
        "native"
    }

    fn unit_name(&self, _source: &str) -> String {
        format!("main{EXE_SUFFIX}")
    }

    fn source_file_name(&self, _unit: &str) -> String {
        "main.cpp".to_string()
    }

    fn compile_command(&self, scratch: &Scratch, unit: &str) -> Vec<String> {
        let source = scratch.dir().join(self.source_file_name(unit));
        let exe = self.exe_path(scratch, unit);
        vec![
            "g++".to_string(),
            source.display().to_string(),
            "-o".to_string(),
            exe.display().to_string(),
            "-std=c++17".to_string(),
            "-O2".to_string(),
        ]
    }

    fn run_command(&self, scratch: &Scratch, unit: &str) -> Vec<String> {
        vec![self.exe_path(scratch, unit).display().to_string()]
    }

    fn build_products(&self, scratch: &Scratch, unit: &str) -> Vec<(PathBuf, ArtifactKind)> {
        vec![(self.exe_path(scratch, unit), ArtifactKind::Executable)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch::ScratchRoot;

    #[test]
    fn test_unit_name_carries_platform_suffix() {
        let unit = NativeToolchain.unit_name("int main() { return 0; }");
        assert_eq!(unit, format!("main{EXE_SUFFIX}"));
        assert_eq!(NativeToolchain.source_file_name(&unit), "main.cpp");
    }

    #[test]
    fn test_compile_command_shape() {
        let temp = tempfile::tempdir().unwrap();
        let root = ScratchRoot::new(temp.path().to_path_buf()).unwrap();
        let scratch = root.create_scratch().unwrap();
        let unit = NativeToolchain.unit_name("");

        let compile = NativeToolchain.compile_command(&scratch, &unit);
        assert_eq!(compile[0], "g++");
        assert!(compile[1].ends_with("main.cpp"));
        assert_eq!(compile[2], "-o");
        assert!(compile[3].ends_with(&unit));
        assert!(compile.contains(&"-std=c++17".to_string()));
        assert!(compile.contains(&"-O2".to_string()));
    }

    #[test]
    fn test_run_command_uses_absolute_path() {
        let temp = tempfile::tempdir().unwrap();
        let root = ScratchRoot::new(temp.path().to_path_buf()).unwrap();
        let scratch = root.create_scratch().unwrap();
        let unit = NativeToolchain.unit_name("");

        let run = NativeToolchain.run_command(&scratch, &unit);
        assert_eq!(run.len(), 1);
        assert!(PathBuf::from(&run[0]).is_absolute());
        assert!(run[0].ends_with(&unit));
    }

    #[test]
    fn test_spaced_paths_stay_single_arguments() {
        let temp = tempfile::tempdir().unwrap();
        let spaced = temp.path().join("dir with spaces");
        let root = ScratchRoot::new(spaced).unwrap();
        let scratch = root.create_scratch().unwrap();
        let unit = NativeToolchain.unit_name("");

        // Each path is one argv element regardless of embedded spaces.
        let compile = NativeToolchain.compile_command(&scratch, &unit);
        assert!(compile[1].contains("dir with spaces"));
        assert_eq!(compile.len(), 6);

        let products = NativeToolchain.build_products(&scratch, &unit);
        assert_eq!(products[0].1, ArtifactKind::Executable);
    }
}

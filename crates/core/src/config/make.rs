use std::path::Path;

use crate::paths;

use super::{ConfigDescriptor, SearchPaths};

/// erlang.mk and hand-written Makefiles follow the same directory
/// conventions, so nothing is read from the Makefile itself.
pub(super) fn load(root: &Path, search_paths: &mut SearchPaths) -> ConfigDescriptor {
    search_paths.register(root.join("ebin"));
    search_paths.register_all(paths::wildcard(root, "deps/*/ebin"));
    search_paths.register_all(paths::wildcard(root, "lib/*/ebin"));

    ConfigDescriptor {
        options: Vec::new(),
        include_dirs: vec![root.join("include"), root.join("deps"), root.join("lib")],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_conventional_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("deps/cowlib/ebin")).unwrap();
        fs::create_dir_all(root.join("deps/ranch/ebin")).unwrap();
        fs::create_dir_all(root.join("lib/util/ebin")).unwrap();
        fs::create_dir_all(root.join("lib/docs")).unwrap();

        let mut search_paths = SearchPaths::new();
        let descriptor = load(root, &mut search_paths);

        assert_eq!(
            search_paths.paths(),
            &[
                root.join("ebin"),
                root.join("deps/cowlib/ebin"),
                root.join("deps/ranch/ebin"),
                root.join("lib/util/ebin"),
            ]
        );
        assert_eq!(
            descriptor.include_dirs,
            vec![root.join("include"), root.join("deps"), root.join("lib")]
        );

        let again = load(root, &mut search_paths);
        assert_eq!(again, descriptor);
        assert_eq!(search_paths.len(), 4);
    }
}

//! `.env` file loading.
//!
//! Parsing is delegated to `dotenvy`, which handles `export` prefixes,
//! quoting, escapes, multi-line quoted values and `${VAR}` references to
//! keys defined earlier in the same file.  Loading never touches the
//! process environment.

use std::path::Path;

use indexmap::IndexMap;

use crate::errors::RyeResult;

/// Variables from one `.env` file in file order; a repeated key keeps its
/// first position and its last value.
pub fn load_dotenv(path: &Path) -> RyeResult<IndexMap<String, String>> {
    let mut vars = IndexMap::new();
    for item in dotenvy::from_path_iter(path)? {
        let (key, value) = item?;
        vars.insert(key, value);
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_env(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".env");
        std::fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_load_forms() {
        let (_tmp, path) = write_env(
            "# comment\n\nA=1\nexport B='two words'\nC='single ${X}'\nD=\"line\\nnext\"\nE=value # trailing\n",
        );
        let vars = load_dotenv(&path).unwrap();
        assert_eq!(vars["A"], "1");
        assert_eq!(vars["B"], "two words");
        assert_eq!(vars["C"], "single ${X}");
        assert_eq!(vars["D"], "line\nnext");
        assert_eq!(vars["E"], "value");
        let keys: Vec<&String> = vars.keys().collect();
        assert_eq!(keys, ["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_references_and_multiline_values() {
        let (_tmp, path) = write_env(
            "RYE_DOTENV_TEST_BASE=/opt\nRYE_DOTENV_TEST_APP=${RYE_DOTENV_TEST_BASE}/app\nRYE_DOTENV_TEST_KEY=\"line1\nline2\"\nAFTER=ok\n",
        );
        let vars = load_dotenv(&path).unwrap();
        assert_eq!(vars["RYE_DOTENV_TEST_APP"], "/opt/app");
        assert_eq!(vars["RYE_DOTENV_TEST_KEY"], "line1\nline2");
        assert_eq!(vars["AFTER"], "ok");
        assert!(std::env::var("RYE_DOTENV_TEST_APP").is_err());
    }

    #[test]
    fn test_later_keys_override() {
        let (_tmp, path) = write_env("A=1\nA=2\n");
        assert_eq!(load_dotenv(&path).unwrap()["A"], "2");
    }

    #[test]
    fn test_malformed_line_errors() {
        let (_tmp, path) = write_env("A=1\nnot a pair\n");
        assert!(load_dotenv(&path).is_err());
    }

    #[test]
    fn test_load_missing_file_errors() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_dotenv(&tmp.path().join(".env")).is_err());
    }
}

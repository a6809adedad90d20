use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use glyph::{CompilationResult, CompileOptions};

const HEADER_DELIMITER: &str = "+++";
const FIXTURE_SUFFIX: &str = ".test.md";

#[derive(Debug, Default, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Path passed to the compiler (recorded as sourceFile, mixed into the id).
    #[serde(default)]
    pub file_path: Option<String>,

    /// Forced document id.
    #[serde(default)]
    pub document_id: Option<String>,

    /// Whether the result must (or must not) have errors.
    #[serde(default)]
    pub expect_errors: Option<bool>,

    /// Diagnostic codes, e.g. "UNRESOLVED_REFERENCE". Compared ignoring order.
    #[serde(default)]
    pub expect_codes: Option<Vec<String>>,

    /// Top-level block types, in order.
    #[serde(default)]
    pub expect_block_types: Option<Vec<String>>,

    /// Expected metadata title (after inference).
    #[serde(default)]
    pub expect_title: Option<String>,

    /// Expected document id.
    #[serde(default)]
    pub expect_id: Option<String>,
}

/// Parse a `.test.md` file into its TOML header and the Markdown under test.
///
/// The header sits between `+++` lines so the Markdown keeps its own `---`
/// frontmatter.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}'); // strip BOM

    if !content.starts_with(HEADER_DELIMITER) {
        return Err(format!("missing opening {} header delimiter", HEADER_DELIMITER));
    }

    let after_open = &content[HEADER_DELIMITER.len()..];
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let closing = format!("\n{}", HEADER_DELIMITER);
    let (close_pos, rest_start) = if after_open.starts_with(HEADER_DELIMITER) {
        (0, HEADER_DELIMITER.len())
    } else {
        let pos = after_open
            .find(&closing)
            .ok_or_else(|| format!("missing closing {} header delimiter", HEADER_DELIMITER))?;
        (pos, pos + closing.len())
    };

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let source = after_open[rest_start..]
        .strip_prefix("\r\n")
        .or_else(|| after_open[rest_start..].strip_prefix('\n'))
        .unwrap_or(&after_open[rest_start..]);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("cannot read file: {}", e)),
            };
        }
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => {
            return TestResult {
                path: path.to_path_buf(),
                description: None,
                outcome: TestOutcome::Fail(format!("header error: {}", e)),
            };
        }
    };

    let options = CompileOptions {
        file_path: config.file_path.clone(),
        document_id: config.document_id.clone(),
    };
    let result = glyph::compile(source, &options);

    TestResult {
        path: path.to_path_buf(),
        description: config.description.clone(),
        outcome: match check_expectations(&config, &result) {
            Some(reason) => TestOutcome::Fail(reason),
            None => TestOutcome::Pass,
        },
    }
}

/// Compare a compilation result against the header. Returns `Some(reason)` on mismatch.
fn check_expectations(config: &TestConfig, result: &CompilationResult) -> Option<String> {
    let mut problems = Vec::new();

    if let Some(expected) = config.expect_errors {
        if expected != result.has_errors {
            problems.push(format!(
                "expected has_errors = {}, got {}{}",
                expected,
                result.has_errors,
                diagnostic_listing(result)
            ));
        }
    }

    if let Some(expected) = &config.expect_codes {
        let mut expected: Vec<&str> = expected.iter().map(String::as_str).collect();
        let mut actual: Vec<&str> = result.diagnostics.iter().map(|d| d.code.as_str()).collect();
        expected.sort_unstable();
        actual.sort_unstable();
        if expected != actual {
            problems.push(format!(
                "diagnostic codes mismatch\n  expected: [{}]\n  actual:   [{}]",
                expected.join(", "),
                actual.join(", ")
            ));
        }
    }

    if let Some(expected) = &config.expect_block_types {
        let actual: Vec<&str> = result.ir.blocks.iter().map(|b| b.kind.as_str()).collect();
        if *expected != actual {
            problems.push(format!(
                "block types mismatch\n  expected: [{}]\n  actual:   [{}]",
                expected.join(", "),
                actual.join(", ")
            ));
        }
    }

    if let Some(expected) = &config.expect_title {
        let actual = result.ir.metadata.title.as_deref();
        if actual != Some(expected.as_str()) {
            problems.push(format!(
                "title mismatch\n  expected: {}\n  actual:   {}",
                expected,
                actual.unwrap_or("(none)")
            ));
        }
    }

    if let Some(expected) = &config.expect_id {
        if *expected != result.ir.id {
            problems.push(format!(
                "document id mismatch\n  expected: {}\n  actual:   {}",
                expected, result.ir.id
            ));
        }
    }

    if problems.is_empty() {
        None
    } else {
        Some(problems.join("\n"))
    }
}

fn diagnostic_listing(result: &CompilationResult) -> String {
    if result.diagnostics.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = result
        .diagnostics
        .iter()
        .map(|d| format!("\n    - {}", d))
        .collect();
    format!("\n  diagnostics:{}", lines.concat())
}

/// Find compile fixtures under `root`, keyed by the folder they sit in
/// (`references`, `containers/tabs`, ...). Fixtures at the top level are
/// keyed by "". Unreadable directories are skipped.
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut fixtures: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            debug!(dir = %dir.display(), "skipping unreadable fixture directory");
            continue;
        };
        for path in entries.flatten().map(|entry| entry.path()) {
            if path.is_dir() {
                pending.push(path);
            } else if is_fixture(&path) {
                fixtures.entry(category_of(&path, root)).or_default().push(path);
            }
        }
    }

    for files in fixtures.values_mut() {
        files.sort();
    }
    debug!(
        root = %root.display(),
        categories = fixtures.len(),
        fixtures = fixtures.values().map(Vec::len).sum::<usize>(),
        "discovered fixtures"
    );
    fixtures
}

fn is_fixture(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.ends_with(FIXTURE_SUFFIX))
}

/// Folder of `path` relative to `root`, with `/` separators.
fn category_of(path: &Path, root: &Path) -> String {
    path.parent()
        .and_then(|p| p.strip_prefix(root).ok())
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default()
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} fixtures)", category_label(category), files.len());
    }
}

/// ANSI styling for runner output, disabled by `--no-color`.
#[derive(Clone, Copy)]
struct Palette {
    color: bool,
}

impl Palette {
    fn paint(self, text: &str, code: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    fn green(self, text: &str) -> String {
        self.paint(text, "32")
    }

    fn red(self, text: &str) -> String {
        self.paint(text, "31")
    }

    fn bold(self, text: &str) -> String {
        self.paint(text, "1")
    }
}

fn test_label<'a>(result: &'a TestResult, path: &'a Path) -> &'a str {
    result
        .description
        .as_deref()
        .unwrap_or_else(|| path.file_stem().and_then(|s| s.to_str()).unwrap_or("?"))
}

/// Filter discovered categories down to the requested ones. A request matches
/// the category itself and everything below it.
fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }
    let mut filtered = BTreeMap::new();
    for requested in requested {
        let req = requested.trim_matches('/');
        let mut found = false;
        for (cat, files) in all {
            if cat == req || cat.starts_with(&format!("{}/", req)) {
                filtered.insert(cat.as_str(), files);
                found = true;
            }
        }
        if !found {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all.keys()
                    .map(|k| category_label(k))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    filtered
}

/// Compile every fixture under `path` (or the single fixture `path`) and
/// report PASS/FAIL per fixture. `categories` narrows a directory run.
/// Returns the process exit code: 0 when every fixture passes.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let palette = Palette { color: !no_color };
    let single = path.is_file();

    let selected: BTreeMap<String, Vec<PathBuf>> = if single {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
            return 1;
        }
        select_categories(&all, categories)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    };
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (category, files) in &selected {
        if !single {
            eprintln!();
            eprintln!("{}", palette.bold(category_label(category)));
        }
        for file in files {
            let result = run_single_test(file);
            let label = test_label(&result, file).to_string();
            if matches!(result.outcome, TestOutcome::Pass) {
                passed += 1;
                eprintln!("  {}  {}", palette.green("PASS"), label);
            } else {
                eprintln!("  {}  {}", palette.red("FAIL"), label);
                failures.push(result);
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let TestOutcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    let failed = failures.len();
    if failed == 0 {
        eprintln!("test result: {}. {} passed, 0 failed", palette.green("ok"), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            palette.red("FAILED"),
            passed,
            failed,
            passed + failed
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn header_and_markdown_are_split() {
        let (config, source) = parse_test_file(
            "+++\ndescription = \"scenario\"\nexpect_codes = [\"INVALID_REF\"]\n+++\n---\ntitle: T\n---\n# Body\n",
        )
        .unwrap();
        assert_eq!(config.description.as_deref(), Some("scenario"));
        assert_eq!(config.expect_codes, Some(vec!["INVALID_REF".to_string()]));
        assert_eq!(source, "---\ntitle: T\n---\n# Body\n");
    }

    #[test]
    fn empty_header_is_allowed() {
        let (config, source) = parse_test_file("+++\n+++\nText\n").unwrap();
        assert!(config.description.is_none());
        assert_eq!(source, "Text\n");
    }

    #[test]
    fn missing_delimiters_are_errors() {
        assert!(parse_test_file("# no header").is_err());
        assert!(parse_test_file("+++\ndescription = \"x\"\n").is_err());
        assert!(parse_test_file("+++\nnot toml\n+++\n").is_err());
    }

    #[test]
    fn expectations_compare_codes_as_a_multiset() {
        let result = glyph::compile(
            "[a](#glyph:nope) [b](other#glyph:x)\n",
            &CompileOptions::default(),
        );
        let config = TestConfig {
            expect_errors: Some(true),
            expect_codes: Some(vec![
                "CROSS_DOCUMENT_REFERENCE".into(),
                "UNRESOLVED_REFERENCE".into(),
            ]),
            expect_block_types: Some(vec!["paragraph".into()]),
            ..Default::default()
        };
        assert!(check_expectations(&config, &result).is_none());
    }

    #[test]
    fn mismatches_are_all_reported() {
        let result = glyph::compile("# Title\n", &CompileOptions::default().with_document_id("d"));
        let config = TestConfig {
            expect_errors: Some(true),
            expect_title: Some("Other".into()),
            expect_id: Some("e".into()),
            ..Default::default()
        };
        let reason = check_expectations(&config, &result).unwrap();
        assert!(reason.contains("has_errors"));
        assert!(reason.contains("title mismatch"));
        assert!(reason.contains("document id mismatch"));
    }

    #[test]
    fn fixtures_are_grouped_by_folder() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("refs")).unwrap();
        fs::write(dir.path().join("top.test.md"), "+++\n+++\n").unwrap();
        fs::write(dir.path().join("refs/a.test.md"), "+++\n+++\n").unwrap();
        fs::write(dir.path().join("refs/notes.md"), "ignored").unwrap();

        let categories = discover_categorized(dir.path());
        assert_eq!(categories.keys().collect::<Vec<_>>(), vec!["", "refs"]);
        assert_eq!(categories["refs"].len(), 1);

        let selected = select_categories(&categories, &["refs/".to_string()]);
        assert_eq!(selected.keys().copied().collect::<Vec<_>>(), vec!["refs"]);
        assert_eq!(run_tests(dir.path(), true, &[]), 0);
    }

    #[test]
    fn palette_only_paints_with_color() {
        assert_eq!(Palette { color: false }.red("FAIL"), "FAIL");
        assert_eq!(Palette { color: true }.green("ok"), "\x1b[32mok\x1b[0m");
    }

    #[test]
    fn failing_fixture_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(
            dir.path().join("a/b/broken.test.md"),
            "+++\nexpect_errors = true\n+++\n# Fine\n",
        )
        .unwrap();

        let categories = discover_categorized(dir.path());
        assert_eq!(categories.keys().collect::<Vec<_>>(), vec!["a/b"]);
        assert_eq!(run_tests(dir.path(), true, &["a".to_string()]), 1);
    }
}

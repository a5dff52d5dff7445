use crate::config::CheckConfig;
use crate::fix::apply_fixes;
use crate::model::ObjectTable;
use crate::report::{report, Diagnostic};
use crate::rules::factory::build_matchers;
use crate::rules::{CheckContext, Fix, Match, Matcher};
use crate::suppress::DirectiveScanner;
use crate::syntax::span::Position;
use crate::syntax::{ParseError, SourceUnit};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Rewrite-and-recheck rounds under `--fix`.
const MAX_FIX_PASSES: usize = 3;

/// Problems that stop the whole run before any file is analysed.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid glob pattern: {0}")]
    GlobParse(#[from] globset::Error),
    #[error("invalid suppression pattern: {0}")]
    Directive(#[from] regex::Error),
    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Why one file could not be analysed. Never aborts the batch.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{}", .0.message)]
    Parse(#[from] ParseError),
    #[error("analysis exceeded the {}ms budget", .0.as_millis())]
    Timeout(Duration),
}

impl FileError {
    /// Tag shown in place of a rule name.
    pub fn kind(&self) -> &'static str {
        match self {
            FileError::Io(_) => "io-error",
            FileError::Parse(_) => "parse-error",
            FileError::Timeout(_) => "timeout",
        }
    }

    pub fn position(&self) -> Position {
        match self {
            FileError::Parse(e) => e.position,
            _ => Position { line: 1, column: 1 },
        }
    }
}

#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: FileError,
}

/// Diagnostics for one successfully analysed file.
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
    pub fixes_applied: usize,
}

#[derive(Debug, Default)]
pub struct ScanResult {
    /// One entry per analysed file, sorted by path.
    pub reports: Vec<FileReport>,
    pub failures: Vec<FileFailure>,
    pub files_scanned: usize,
    pub rules_loaded: usize,
}

impl ScanResult {
    pub fn diagnostics(&self) -> impl Iterator<Item = (&Path, &Diagnostic)> {
        self.reports
            .iter()
            .flat_map(|r| r.diagnostics.iter().map(move |d| (r.path.as_path(), d)))
    }

    pub fn diagnostic_count(&self) -> usize {
        self.reports.iter().map(|r| r.diagnostics.len()).sum()
    }

    pub fn fixes_applied(&self) -> usize {
        self.reports.iter().map(|r| r.fixes_applied).sum()
    }

    /// 2 when any file failed, 1 when diagnostics remain, 0 otherwise.
    pub fn exit_code(&self) -> i32 {
        if !self.failures.is_empty() {
            2
        } else if self.diagnostic_count() > 0 {
            1
        } else {
            0
        }
    }
}

/// Runs the enabled matchers over files.
pub struct Scanner {
    config: CheckConfig,
    matchers: Vec<Box<dyn Matcher>>,
    directives: DirectiveScanner,
    exclude: GlobSet,
}

impl Scanner {
    pub fn new(config: CheckConfig) -> Result<Self, ScanError> {
        let matchers = build_matchers(&config);
        Self::with_matchers(config, matchers)
    }

    pub fn with_matchers(
        config: CheckConfig,
        matchers: Vec<Box<dyn Matcher>>,
    ) -> Result<Self, ScanError> {
        Ok(Self {
            exclude: build_glob_set(&config.exclude)?,
            directives: DirectiveScanner::new()?,
            config,
            matchers,
        })
    }

    /// Parse, match, report and suppress for one source text.
    pub fn check_source(
        &self,
        source: &SourceUnit,
        deadline: Option<Instant>,
    ) -> Result<Vec<Diagnostic>, FileError> {
        let chunk = source.parse()?;
        self.check_deadline(deadline)?;

        let objects = ObjectTable::infer(&chunk, &self.config.model);
        let ctx = CheckContext {
            source,
            chunk: &chunk,
            model: &self.config.model,
            objects: &objects,
        };

        let mut matches = Vec::new();
        for matcher in &self.matchers {
            self.check_deadline(deadline)?;
            matches.extend(run_matcher(matcher.as_ref(), &ctx));
        }
        self.check_deadline(deadline)?;

        let diagnostics = report(source, matches, &self.config);
        Ok(self.directives.scan(source).apply(diagnostics))
    }

    fn check_deadline(&self, deadline: Option<Instant>) -> Result<(), FileError> {
        match (deadline, self.config.timeout) {
            (Some(deadline), Some(budget)) if Instant::now() >= deadline => {
                Err(FileError::Timeout(budget))
            }
            _ => Ok(()),
        }
    }

    /// Analyse one file, rewriting it in place when `fix` is set.
    pub fn check_file(&self, path: &Path, fix: bool) -> Result<FileReport, FileError> {
        let started = Instant::now();
        let deadline = self.config.timeout.map(|budget| started + budget);
        let text = fs::read_to_string(path)?;

        let mut source = SourceUnit::new(path, text);
        let mut diagnostics = self.check_source(&source, deadline)?;
        let mut fixes_applied = 0;

        if fix {
            for pass in 1..=MAX_FIX_PASSES {
                let fixes: Vec<&Fix> = diagnostics.iter().filter_map(|d| d.fix.as_ref()).collect();
                if fixes.is_empty() {
                    break;
                }
                let rewrite = apply_fixes(source.text(), &fixes);
                if rewrite.applied == 0 {
                    break;
                }
                let rewritten = SourceUnit::new(path, rewrite.text);
                let rechecked = match self.check_source(&rewritten, deadline) {
                    Ok(d) => d,
                    Err(FileError::Parse(e)) => {
                        warn!(
                            "{}: fix pass {} produced unparsable text ({}); keeping previous text",
                            path.display(),
                            pass,
                            e
                        );
                        break;
                    }
                    Err(e) => return Err(e),
                };
                debug!(
                    "{}: fix pass {} applied {} ({} skipped)",
                    path.display(),
                    pass,
                    rewrite.applied,
                    rewrite.skipped
                );
                fixes_applied += rewrite.applied;
                source = rewritten;
                diagnostics = rechecked;
            }

            if fixes_applied > 0 {
                fs::write(path, source.text()).map_err(|e| {
                    warn!("{}: failed to write fixes: {}", path.display(), e);
                    e
                })?;
                info!("{}: applied {} fix(es)", path.display(), fixes_applied);
            }
        }

        debug!(
            "{}: {} diagnostic(s) in {:?}",
            path.display(),
            diagnostics.len(),
            started.elapsed()
        );
        Ok(FileReport {
            path: path.to_path_buf(),
            diagnostics,
            fixes_applied,
        })
    }

    /// Analyse every file under `targets` on a worker pool.
    pub fn run(&self, targets: &[PathBuf], fix: bool) -> Result<ScanResult, ScanError> {
        let (files, mut failures) = self.collect_files(targets);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs)
            .build()?;
        let outcomes: Vec<(&PathBuf, Result<FileReport, FileError>)> = pool.install(|| {
            files
                .par_iter()
                .map(|path| (path, self.check_file(path, fix)))
                .collect()
        });

        let mut reports = Vec::new();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(report) => reports.push(report),
                Err(error) => {
                    debug!("{}: {}: {}", path.display(), error.kind(), error);
                    failures.push(FileFailure {
                        path: path.clone(),
                        error,
                    });
                }
            }
        }
        failures.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(ScanResult {
            reports,
            failures,
            files_scanned: files.len(),
            rules_loaded: self.matchers.len(),
        })
    }

    /// Explicit files are taken as given; directories are walked for the
    /// configured extensions, honouring `.gitignore` and exclude globs.
    fn collect_files(&self, targets: &[PathBuf]) -> (Vec<PathBuf>, Vec<FileFailure>) {
        let mut files = Vec::new();
        let mut failures = Vec::new();

        for target in targets {
            if target.is_file() {
                files.push(target.clone());
                continue;
            }
            if !target.is_dir() {
                failures.push(FileFailure {
                    path: target.clone(),
                    error: FileError::Io(io::Error::new(
                        io::ErrorKind::NotFound,
                        "no such file or directory",
                    )),
                });
                continue;
            }

            for entry in WalkBuilder::new(target).require_git(false).build() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("{}: {}", target.display(), e);
                        continue;
                    }
                };
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }
                let path = entry.into_path();
                let rel = path.strip_prefix(target).unwrap_or(&path);
                if self.exclude.is_match(rel) || !self.has_extension(&path) {
                    continue;
                }
                files.push(path);
            }
        }

        files.sort();
        files.dedup();
        (files, failures)
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.config.extensions.iter().any(|want| want == ext))
    }
}

/// A faulting matcher counts as "no match" for its rule.
fn run_matcher(matcher: &dyn Matcher, ctx: &CheckContext) -> Vec<Match> {
    match panic::catch_unwind(AssertUnwindSafe(|| matcher.check(ctx))) {
        Ok(Ok(matches)) => matches,
        Ok(Err(e)) => {
            warn!("{}: {}", ctx.source.path().display(), e);
            Vec::new()
        }
        Err(_) => {
            warn!(
                "{}: rule '{}' panicked; treating as no match",
                ctx.source.path().display(),
                matcher.rule()
            );
            Vec::new()
        }
    }
}

/// Convenience wrapper: build a scanner from `config` and run it once.
pub fn run_scan(
    config: CheckConfig,
    targets: &[PathBuf],
    fix: bool,
) -> Result<ScanResult, ScanError> {
    Scanner::new(config)?.run(targets, fix)
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, ScanError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{RuleEvaluationError, RuleId};
    use std::fs;
    use tempfile::TempDir;

    const TERNARY: &str = "if(c.Boolean) then c.Color = 'red' else c.Color = 'green' end\n";

    fn write(dir: &TempDir, rel: &str, text: &str) -> PathBuf {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, text).unwrap();
        path
    }

    fn scan_dir(dir: &TempDir, config: CheckConfig, fix: bool) -> ScanResult {
        run_scan(config, &[dir.path().to_path_buf()], fix).unwrap()
    }

    fn rules_of(result: &ScanResult) -> Vec<RuleId> {
        result.diagnostics().map(|(_, d)| d.rule).collect()
    }

    #[test]
    fn walks_directories_for_configured_extensions() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.lua", TERNARY);
        write(&dir, "nested/b.lua", TERNARY);
        write(&dir, "notes.txt", TERNARY);
        write(&dir, "vendor/c.lua", TERNARY);

        let mut config = CheckConfig::default();
        config.exclude = vec!["vendor/**".into()];
        let result = scan_dir(&dir, config, false);

        assert_eq!(result.files_scanned, 2);
        assert_eq!(result.diagnostic_count(), 2);
        assert!(result.reports[0].path.ends_with("a.lua"));
        assert!(result.reports[1].path.ends_with("b.lua"));
        assert_eq!(result.exit_code(), 1);
    }

    #[test]
    fn gitignored_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(&dir, ".gitignore", "build/\n");
        write(&dir, "build/out.lua", TERNARY);
        write(&dir, "main.lua", "x = 1\n");
        let result = scan_dir(&dir, CheckConfig::default(), false);
        assert_eq!(result.files_scanned, 1);
        assert_eq!(result.exit_code(), 0);
    }

    #[test]
    fn explicit_files_ignore_extension_filter() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "script.txt", TERNARY);
        let result = run_scan(CheckConfig::default(), &[path], false).unwrap();
        assert_eq!(rules_of(&result), vec![RuleId::TernaryOpportunity]);
    }

    #[test]
    fn failures_do_not_abort_the_batch() {
        let dir = TempDir::new().unwrap();
        write(&dir, "bad.lua", "if x then\n");
        write(&dir, "good.lua", TERNARY);
        let missing = dir.path().join("missing");

        let result = run_scan(
            CheckConfig::default(),
            &[dir.path().to_path_buf(), missing],
            false,
        )
        .unwrap();

        assert_eq!(result.diagnostic_count(), 1);
        let kinds: Vec<&str> = result.failures.iter().map(|f| f.error.kind()).collect();
        assert_eq!(kinds, vec!["parse-error", "io-error"]);
        assert_eq!(result.failures[0].error.position().line, 2);
        assert_eq!(result.exit_code(), 2);
    }

    #[test]
    fn deeply_nested_file_is_a_parse_failure() {
        let dir = TempDir::new().unwrap();
        let deep = format!("x = {}1{}\n", "(".repeat(200_000), ")".repeat(200_000));
        write(&dir, "deep.lua", &deep);
        write(&dir, "good.lua", TERNARY);

        let result = scan_dir(&dir, CheckConfig::default(), false);

        assert_eq!(result.failures.len(), 1);
        assert!(result.failures[0].path.ends_with("deep.lua"));
        assert_eq!(result.failures[0].error.kind(), "parse-error");
        assert!(result.failures[0]
            .error
            .to_string()
            .contains("too many syntax levels"));
        assert_eq!(rules_of(&result), vec![RuleId::TernaryOpportunity]);
        assert_eq!(result.exit_code(), 2);
    }

    #[test]
    fn exhausted_budget_fails_only_that_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.lua", TERNARY);
        let mut config = CheckConfig::default();
        config.timeout = Some(Duration::ZERO);
        let result = scan_dir(&dir, config, false);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].error.kind(), "timeout");
        assert!(result.reports.is_empty());
    }

    #[test]
    fn fix_rewrites_and_rechecks() {
        let dir = TempDir::new().unwrap();
        let src = "function update(ctl)\n  if(ctl.Boolean) then Controls.Led.Boolean = true else Controls.Led.Boolean = false end\n  if(ctl.Boolean) then ctl.Color = 'red' else ctl.Color = 'green' end\nend\nControls.Mute.EventHandler = update\n";
        let path = write(&dir, "main.lua", src);

        let result = scan_dir(&dir, CheckConfig::default(), true);
        assert_eq!(result.fixes_applied(), 3);
        assert_eq!(result.diagnostic_count(), 0);

        let fixed = fs::read_to_string(&path).unwrap();
        assert!(fixed.contains("  Controls.Led.Boolean = ctl.Boolean\n"));
        assert!(fixed.contains("  ctl.Color = ctl.Boolean and 'red' or 'green'\n"));
        assert!(fixed.ends_with("Controls.Mute.EventHandler = update\nupdate(Controls.Mute)\n"));

        let again = scan_dir(&dir, CheckConfig::default(), false);
        assert_eq!(again.diagnostic_count(), 0);
    }

    #[test]
    fn unsafe_matches_survive_fix() {
        let dir = TempDir::new().unwrap();
        let src = "if c then x = a.Value else x = 0 end\n";
        let path = write(&dir, "a.lua", src);
        let result = scan_dir(&dir, CheckConfig::default(), true);
        assert_eq!(result.fixes_applied(), 0);
        assert_eq!(rules_of(&result), vec![RuleId::TernaryOpportunity]);
        assert_eq!(fs::read_to_string(path).unwrap(), src);
    }

    #[test]
    fn single_rule_restricts_output() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "a.lua",
            "local function f(c) end\nControls.A.EventHandler = f\nif c then x = 1 else x = 2 end\n",
        );
        let mut config = CheckConfig::default();
        config.only = Some(RuleId::MissingStartupInvocation);
        let result = scan_dir(&dir, config, false);
        assert_eq!(rules_of(&result), vec![RuleId::MissingStartupInvocation]);
        assert_eq!(result.rules_loaded, 1);
    }

    #[test]
    fn suppression_comments_apply() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "a.lua",
            "-- scriptwise: ignore ternary-opportunity\nif c then x = 1 else x = 2 end\n",
        );
        write(&dir, "b.lua", &format!("-- scriptwise: ignore-file\n{}", TERNARY));
        let result = scan_dir(&dir, CheckConfig::default(), false);
        assert_eq!(result.diagnostic_count(), 0);
    }

    struct Faulty {
        panic: bool,
    }

    impl Matcher for Faulty {
        fn rule(&self) -> RuleId {
            RuleId::AssumeAndRefute
        }

        fn check(&self, _ctx: &CheckContext) -> Result<Vec<Match>, RuleEvaluationError> {
            if self.panic {
                panic!("unexpected tree shape");
            }
            Err(RuleEvaluationError {
                rule: self.rule(),
                message: "unexpected tree shape".into(),
            })
        }
    }

    #[test]
    fn faulting_matchers_count_as_no_match() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.lua", TERNARY);
        let matchers: Vec<Box<dyn Matcher>> = vec![
            Box::new(Faulty { panic: true }),
            Box::new(Faulty { panic: false }),
            crate::rules::factory::build_matcher(RuleId::TernaryOpportunity),
        ];
        let scanner = Scanner::with_matchers(CheckConfig::default(), matchers).unwrap();
        let result = scanner.run(&[dir.path().to_path_buf()], false).unwrap();
        assert!(result.failures.is_empty());
        assert_eq!(rules_of(&result), vec![RuleId::TernaryOpportunity]);
    }

    #[test]
    fn bad_exclude_glob_is_fatal() {
        let mut config = CheckConfig::default();
        config.exclude = vec!["a[".into()];
        assert!(matches!(Scanner::new(config), Err(ScanError::GlobParse(_))));
    }
}

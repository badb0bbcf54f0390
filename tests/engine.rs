//! End-to-end sync scenarios over the in-memory adapters.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use tasksync::adapters::memory::{
    FixedClock, MemoryFileSystem, MemoryIssueTracker, ScriptedPrompt, ScriptedShell,
};
use tasksync::context::ServiceContext;
use tasksync::mapper::FieldMapper;
use tasksync::ports::issues::IssueState;
use tasksync::resolve::Resolution;
use tasksync::sources::{GroupedSource, NumberedSource, Registry};
use tasksync::sync::{Creator, Mode, SyncEngine, SyncOptions, SyncReport, SyncState, Target};

const TASKS: &str = "/p/tasks";
const SPECS: &str = "/p/specs";
const STATE: &str = "/p/.tasksync/state.json";

struct Harness {
    fs: MemoryFileSystem,
    issues: MemoryIssueTracker,
    shell: ScriptedShell,
    prompt: ScriptedPrompt,
    clock: FixedClock,
    creator: Creator,
}

impl Harness {
    fn new() -> Self {
        let fs = MemoryFileSystem::new();
        fs.create_dir(Path::new("/p/tasks/backlog"));
        fs.create_dir(Path::new("/p/tasks/active"));
        fs.create_dir(Path::new("/p/tasks/completed"));
        fs.create_dir(Path::new(SPECS));
        Self {
            fs,
            issues: MemoryIssueTracker::new(),
            shell: ScriptedShell::new(),
            prompt: ScriptedPrompt::new(),
            clock: FixedClock::default(),
            creator: Creator::Api,
        }
    }

    fn answering(mut self, answers: &[usize]) -> Self {
        self.prompt = ScriptedPrompt::answering(answers);
        self
    }

    fn run(&self, options: &SyncOptions) -> SyncReport {
        self.run_in(Path::new(TASKS), Path::new(SPECS), options)
    }

    fn run_in(&self, tasks: &Path, specs: &Path, options: &SyncOptions) -> SyncReport {
        let ctx = ServiceContext::in_memory(
            &self.fs,
            &self.issues,
            &self.shell,
            &self.prompt,
            &self.clock,
        );
        let mut registry = Registry::new();
        registry.register(Box::new(NumberedSource::new(&ctx, tasks)));
        registry.register(Box::new(GroupedSource::new(&ctx, specs)));
        let mapper = FieldMapper::new(BTreeMap::new(), true);
        let engine =
            SyncEngine::new(&ctx, &registry, &mapper, Path::new(STATE), self.creator.clone());
        engine.run(options).unwrap()
    }

    fn sync(&self) -> SyncReport {
        self.run(&SyncOptions::default())
    }

    fn state(&self) -> SyncState {
        SyncState::load(&self.fs, Path::new(STATE)).unwrap()
    }

    fn write_task(&self, path: &str, title: &str, extra: &str, body: &str) {
        let text = format!(
            "---\ncreated: 2025-01-10T09:00:00Z\nreporter: alice\ntitle: {title}\n\
             severity: medium\npriority: p2\n{extra}---\n\n{body}\n"
        );
        tasksync::ports::filesystem::FileSystem::write(&self.fs, Path::new(path), &text).unwrap();
    }

    fn read(&self, path: &str) -> String {
        tasksync::ports::filesystem::FileSystem::read_to_string(&self.fs, Path::new(path)).unwrap()
    }

    fn exists(&self, path: &str) -> bool {
        tasksync::ports::filesystem::FileSystem::exists(&self.fs, Path::new(path))
    }

    /// Seeds #7 and resolves the first-run conflict in favour of the local side.
    fn seeded() -> Self {
        let h = Self::new().answering(&[0]);
        h.write_task("/p/tasks/backlog/007-fix-login.md", "Fix login", "", "Users see a blank page.");
        h.issues.insert_simple(7, "Old title", &[]);
        let report = h.sync();
        assert_eq!(report.conflicts, vec![(7, Resolution::UseLocal)]);
        h
    }
}

#[test]
fn first_conflict_resolved_locally_then_converges() {
    let h = Harness::seeded();
    let issue = h.issues.issue(7).unwrap();
    assert_eq!(issue.title, "Fix login");
    assert!(issue.labels.contains(&"status:backlog".to_string()));
    assert!(h.state().entry(7).is_some());

    let report = h.sync();
    assert_eq!(report.skipped, vec![7]);
    assert!(report.pushed.is_empty() && report.pulled.is_empty());
    assert_eq!(h.issues.updates().len(), 1);
}

#[test]
fn local_edit_is_pushed() {
    let h = Harness::seeded();
    h.write_task("/p/tasks/backlog/007-fix-login.md", "Fix login", "", "Now with steps.");

    let report = h.sync();
    assert_eq!(report.pushed, vec![7]);
    assert!(h.issues.issue(7).unwrap().body.unwrap().contains("Now with steps."));
    assert_eq!(h.sync().skipped, vec![7]);
}

#[test]
fn remote_edit_is_pulled_and_renamed() {
    let h = Harness::seeded();
    let mut issue = h.issues.issue(7).unwrap();
    issue.title = "Fix login redirect".to_string();
    h.issues.insert(issue);

    let report = h.sync();
    assert_eq!(report.pulled, vec![7]);
    assert!(!h.exists("/p/tasks/backlog/007-fix-login.md"));
    let text = h.read("/p/tasks/backlog/007-fix-login-redirect.md");
    assert!(text.contains("title: Fix login redirect"));
    assert!(text.contains("Users see a blank page."));
    assert!(!text.contains("tasksync"), "issue decoration must not leak into the document");

    assert_eq!(h.sync().skipped, vec![7]);
}

#[test]
fn remote_close_moves_document_to_completed() {
    let h = Harness::seeded();
    let mut issue = h.issues.issue(7).unwrap();
    issue.state = IssueState::Closed;
    issue.closed_at = Some(Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap());
    h.issues.insert(issue);

    assert_eq!(h.sync().pulled, vec![7]);
    let text = h.read("/p/tasks/completed/007-fix-login.md");
    assert!(text.contains("status: completed"));
    assert!(text.contains("2025-05-01T00:00:00"));
    assert_eq!(h.sync().skipped, vec![7]);
}

#[test]
fn both_sides_changed_is_a_conflict() {
    let h = Harness::seeded();
    h.write_task("/p/tasks/backlog/007-fix-login.md", "Fix login", "", "Local edit.");
    let mut issue = h.issues.issue(7).unwrap();
    issue.title = "Remote title".to_string();
    h.issues.insert(issue);

    let h = Harness { prompt: ScriptedPrompt::answering(&[1]), ..h };
    let report = h.sync();
    assert_eq!(report.conflicts, vec![(7, Resolution::UseRemote)]);
    assert!(h.exists("/p/tasks/backlog/007-remote-title.md"));
    assert!(h.prompt.shown()[0].contains("Local edit."));
    let entry = h.state().entry(7).cloned().unwrap();
    assert_eq!(entry.local_hash, entry.remote_hash);
}

#[test]
fn remote_side_without_structured_labels_converges_after_pull() {
    let h = Harness::new().answering(&[1]);
    h.write_task("/p/tasks/backlog/007-fix-login.md", "Fix login", "", "Local text.");
    h.issues.insert_simple(7, "Remote title", &[]);

    let report = h.sync();
    assert_eq!(report.conflicts, vec![(7, Resolution::UseRemote)]);
    assert!(report.errors.is_empty());
    let entry = h.state().entry(7).cloned().unwrap();
    assert_eq!(entry.local_hash, entry.remote_hash);

    let labels = h.issues.issue(7).unwrap().labels;
    assert!(labels.contains(&"priority:p2".to_string()));
    assert!(labels.contains(&"status:backlog".to_string()));
    let text = h.read("/p/tasks/backlog/007-remote-title.md");
    assert!(text.contains("priority: p2"));

    assert_eq!(h.sync().skipped, vec![7]);
}

#[test]
fn pull_keeps_the_old_name_when_the_new_one_is_taken() {
    let h = Harness::seeded();
    h.write_task("/p/tasks/backlog/007-fix-login-redirect.md", "Placeholder", "", "keep me");
    let mut issue = h.issues.issue(7).unwrap();
    issue.title = "Fix login redirect".to_string();
    h.issues.insert(issue);

    let options = SyncOptions {
        target: Some(Target::File(PathBuf::from("/p/tasks/backlog/007-fix-login.md"))),
        ..SyncOptions::default()
    };
    let report = h.run(&options);
    assert_eq!(report.pulled, vec![7]);
    assert!(report.errors.is_empty());
    assert!(h.read("/p/tasks/backlog/007-fix-login.md").contains("title: Fix login redirect"));
    assert!(h.read("/p/tasks/backlog/007-fix-login-redirect.md").contains("keep me"));
}

#[test]
fn push_mode_leaves_remote_changes_alone() {
    let h = Harness::seeded();
    let mut issue = h.issues.issue(7).unwrap();
    issue.title = "Renamed remotely".to_string();
    h.issues.insert(issue);

    let options = SyncOptions { mode: Mode::Push, ..SyncOptions::default() };
    let report = h.run(&options);
    assert_eq!(report.skipped, vec![7]);
    assert!(report.pulled.is_empty());
    assert!(h.exists("/p/tasks/backlog/007-fix-login.md"));

    assert_eq!(h.sync().pulled, vec![7]);
}

#[test]
fn skip_all_stops_prompting_and_leaves_state_untouched() {
    let h = Harness::new().answering(&[2, 3]);
    for n in 1..=3 {
        h.write_task(&format!("/p/tasks/backlog/00{n}-task-{n}.md"), &format!("Task {n}"), "", "x");
        h.issues.insert_simple(n, "Different", &[]);
    }

    let report = h.sync();
    assert_eq!(
        report.conflicts,
        vec![(1, Resolution::Skip), (2, Resolution::Skip), (3, Resolution::Skip)]
    );
    let questions = h.prompt.questions();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0].1.len(), 4);
    let state = h.state();
    assert!((1..=3).all(|n| state.entry(n).is_none()));
    assert!(h.issues.updates().is_empty());
}

#[test]
fn unverified_issue_is_never_stripped_or_recreated() {
    let h = Harness { creator: Creator::Command { program: "gh".into(), repository: "acme/app".into() }, ..Harness::new() };
    h.write_task("/p/tasks/backlog/009-flaky.md", "Flaky", "", "x");
    h.issues.insert_simple(9, "Flaky", &[]);
    h.issues.fail_on(9);

    let options = SyncOptions { create_new: true, strip_orphans: true, ..SyncOptions::default() };
    let report = h.run(&options);
    assert_eq!(report.unverified, vec![9]);
    assert!(report.orphaned.is_empty());
    assert!(report.stripped.is_empty() && report.created.is_empty());
    assert!(h.exists("/p/tasks/backlog/009-flaky.md"));
    assert!(h.shell.calls().is_empty());
}

#[test]
fn confirmed_orphan_is_stripped_and_recreated_with_command() {
    let h = Harness { creator: Creator::Command { program: "gh".into(), repository: "acme/app".into() }, ..Harness::new() };
    h.write_task("/p/tasks/backlog/009-gone.md", "Gone", "labels: [\"team:core\"]\n", "x");
    h.shell.push_stdout("https://github.com/acme/app/issues/12\n");

    let options = SyncOptions { create_new: true, ..SyncOptions::default() };
    let report = h.run(&options);
    assert_eq!(report.orphaned, vec![9]);
    assert_eq!(report.stripped, vec![9]);
    assert_eq!(report.created, vec![(PathBuf::from("/p/tasks/backlog/012-gone.md"), 12)]);
    assert!(!h.exists("/p/tasks/backlog/009-gone.md"));

    let (program, args) = &h.shell.calls()[0];
    assert_eq!(program, "gh");
    assert_eq!(&args[..4], ["issue", "create", "--repo", "acme/app"]);
    assert!(args.windows(2).any(|w| w == ["--title", "Gone"]));
    assert!(args.windows(2).any(|w| w == ["--label", "team:core"]));

    let state = h.state();
    assert!(state.entry(9).is_none());
    assert!(state.entry(12).is_some());
}

#[test]
fn orphans_survive_without_cleanup_flags() {
    let h = Harness::new();
    h.write_task("/p/tasks/backlog/009-gone.md", "Gone", "", "x");

    let report = h.sync();
    assert_eq!(report.orphaned, vec![9]);
    assert!(report.stripped.is_empty() && report.deleted.is_empty() && report.created.is_empty());
    assert!(h.exists("/p/tasks/backlog/009-gone.md"));
    assert!(h.issues.updates().is_empty());
    assert!(h.issues.issue(1).is_none());
    assert!(h.issues.issue(9).is_none());
    assert!(h.shell.calls().is_empty());
}

#[test]
fn file_target_on_an_orphan_is_stripped_then_created() {
    let h = Harness { creator: Creator::Command { program: "gh".into(), repository: "acme/app".into() }, ..Harness::new() };
    h.write_task("/p/tasks/backlog/009-gone.md", "Gone", "", "x");
    h.shell.push_stdout("https://github.com/acme/app/issues/12\n");

    let options = SyncOptions {
        target: Some(Target::File(PathBuf::from("/p/tasks/backlog/009-gone.md"))),
        create_new: true,
        ..SyncOptions::default()
    };
    let report = h.run(&options);
    assert!(report.errors.is_empty());
    assert_eq!(report.stripped, vec![9]);
    assert_eq!(report.created, vec![(PathBuf::from("/p/tasks/backlog/012-gone.md"), 12)]);
    assert!(!h.exists("/p/tasks/backlog/gone.md"));

    let state = h.state();
    assert!(state.entry(9).is_none());
    assert!(state.entry(12).is_some());
}

#[test]
fn relative_file_target_matches_a_dot_prefixed_root() {
    let h = Harness::new().answering(&[0]);
    h.write_task("tasks/backlog/007-fix.md", "Fix", "", "x");
    h.issues.insert_simple(7, "Fix", &[]);

    let options = SyncOptions {
        target: Some(Target::File(PathBuf::from("tasks/backlog/007-fix.md"))),
        ..SyncOptions::default()
    };
    let report = h.run_in(&Path::new(".").join("tasks"), Path::new("./specs"), &options);
    assert!(report.errors.is_empty());
    assert_eq!(report.conflicts, vec![(7, Resolution::UseLocal)]);
    assert_eq!(h.issues.issue(7).unwrap().title, "Fix");
    assert!(h.state().entry(7).is_some());
}

#[test]
fn clean_orphans_delete_all_remaining() {
    let h = Harness::new().answering(&[2]);
    h.write_task("/p/tasks/backlog/009-gone.md", "Gone", "", "x");
    h.write_task("/p/tasks/backlog/010-also-gone.md", "Also gone", "", "x");

    let options = SyncOptions { clean_orphans: true, ..SyncOptions::default() };
    let report = h.run(&options);
    assert_eq!(report.deleted, vec![9, 10]);
    assert_eq!(h.prompt.questions().len(), 1);
    assert!(!h.exists("/p/tasks/backlog/009-gone.md"));
    assert!(!h.exists("/p/tasks/backlog/010-also-gone.md"));
}

#[test]
fn clean_orphans_keep_then_stop() {
    let h = Harness::new().answering(&[1, 3]);
    h.write_task("/p/tasks/backlog/009-gone.md", "Gone", "", "x");
    h.write_task("/p/tasks/backlog/010-also-gone.md", "Also gone", "", "x");
    h.write_task("/p/tasks/backlog/011-third.md", "Third", "", "x");

    let options = SyncOptions { clean_orphans: true, ..SyncOptions::default() };
    let report = h.run(&options);
    assert!(report.deleted.is_empty());
    assert_eq!(h.prompt.questions().len(), 2);
    assert!(h.exists("/p/tasks/backlog/011-third.md"));
}

#[test]
fn create_mode_uses_the_api_and_converges() {
    let h = Harness::new();
    h.write_task("/p/tasks/active/write-docs.md", "Write docs", "", "Cover the CLI.");

    let options = SyncOptions { mode: Mode::Create, ..SyncOptions::default() };
    let report = h.run(&options);
    assert_eq!(report.created, vec![(PathBuf::from("/p/tasks/active/001-write-docs.md"), 1)]);
    let issue = h.issues.issue(1).unwrap();
    assert_eq!(issue.title, "Write docs");
    assert!(issue.labels.contains(&"status:active".to_string()));

    assert_eq!(h.sync().skipped, vec![1]);
}

#[test]
fn unnumbered_documents_wait_for_create_new() {
    let h = Harness::new();
    h.write_task("/p/tasks/backlog/idea.md", "Idea", "", "x");

    let report = h.sync();
    assert_eq!(report.new, vec![PathBuf::from("/p/tasks/backlog/idea.md")]);
    assert!(report.created.is_empty());
    assert!(h.issues.issue(1).is_none());
}

#[test]
fn number_target_pulls_a_remote_only_issue() {
    let h = Harness::new();
    h.issues.insert_simple(21, "Write release notes", &["status:active", "priority:p1"]);

    let options = SyncOptions { target: Some(Target::Number(21)), ..SyncOptions::default() };
    let report = h.run(&options);
    assert_eq!(report.pulled, vec![21]);
    let text = h.read("/p/tasks/active/021-write-release-notes.md");
    assert!(text.contains("priority: p1"));
    assert!(text.contains("reporter: unknown"));
    assert!(h.state().entry(21).is_some());

    assert_eq!(h.run(&options).skipped, vec![21]);
}

#[test]
fn file_target_touches_only_that_document() {
    let h = Harness::seeded();
    h.write_task("/p/tasks/backlog/008-other.md", "Other", "", "x");
    h.issues.insert_simple(8, "Something else", &[]);
    h.write_task("/p/tasks/backlog/007-fix-login.md", "Fix login", "", "Edited.");

    let options = SyncOptions {
        target: Some(Target::File(PathBuf::from("/p/tasks/backlog/007-fix-login.md"))),
        ..SyncOptions::default()
    };
    let report = h.run(&options);
    assert_eq!(report.pushed, vec![7]);
    assert!(report.conflicts.is_empty());
}

#[test]
fn newer_recorded_status_moves_the_file_before_pushing() {
    let h = Harness::new().answering(&[0]);
    h.write_task(
        "/p/tasks/backlog/007-fix-login.md",
        "Fix login",
        "status: active\nstatus_last_modified: 2025-05-01T00:00:00Z\n",
        "x",
    );
    h.issues.insert_simple(7, "Fix login", &["status:backlog"]);

    h.sync();
    assert!(h.exists("/p/tasks/active/007-fix-login.md"));
    assert!(!h.exists("/p/tasks/backlog/007-fix-login.md"));
    assert!(h.issues.issue(7).unwrap().labels.contains(&"status:active".to_string()));
    assert_eq!(h.sync().skipped, vec![7]);
}

#[test]
fn newer_location_rewrites_the_recorded_status() {
    let h = Harness::new().answering(&[0]);
    h.write_task(
        "/p/tasks/active/007-fix-login.md",
        "Fix login",
        "status: backlog\nstatus_last_modified: 2024-01-01T00:00:00Z\n",
        "x",
    );
    h.issues.insert_simple(7, "Fix login", &["status:backlog"]);

    h.sync();
    assert!(h.exists("/p/tasks/active/007-fix-login.md"));
    assert!(!h.exists("/p/tasks/backlog/007-fix-login.md"));
    let text = h.read("/p/tasks/active/007-fix-login.md");
    assert!(text.contains("status: active"));
    assert!(!text.contains("2024-01-01"));
    assert!(h.issues.issue(7).unwrap().labels.contains(&"status:active".to_string()));
    assert_eq!(h.sync().skipped, vec![7]);
}

#[test]
fn duplicate_numbers_are_reported() {
    let h = Harness::seeded();
    h.write_task("/p/tasks/active/007-copy.md", "Copy", "", "x");

    let report = h.sync();
    assert_eq!(report.errors.len(), 1);
    assert!(report.format().contains("duplicate"));
}

#[test]
fn grouped_document_is_created_and_tracked_in_sidecar() {
    let h = Harness::new();
    let fs = &h.fs;
    tasksync::ports::filesystem::FileSystem::write(
        fs,
        Path::new("/p/specs/login-flow/tasks.md"),
        "# Login flow\n\n- [x] design\n- [ ] build\n",
    )
    .unwrap();

    let options = SyncOptions { mode: Mode::Create, ..SyncOptions::default() };
    let report = h.run(&options);
    assert_eq!(report.created.len(), 1);
    let sidecar = h.read("/p/specs/login-flow/.sync.json");
    assert!(sidecar.contains("\"github_issue\": 1"));
    assert!(sidecar.contains("local_hash"));
    let issue = h.issues.issue(1).unwrap();
    assert_eq!(issue.title, "Login flow");
    assert!(issue.body.unwrap().contains("- [ ] build"));

    assert_eq!(h.sync().skipped, vec![1]);
}

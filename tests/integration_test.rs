use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use git2::{IndexAddOption, Oid, Repository, Signature};
use git_regroup::data::{validate, CommitPlan, CommitProposal, ValidationError};
use git_regroup::git::{
    decompose, ChangeKind, GitRepository, SnapshotOptions, StagingError, UnitId,
};
use git_regroup::session::{plan_session, SessionError, SessionState};
use tempfile::TempDir;

const A_ORIGINAL: &str = "line 1\nline 2\nline 3\nline 4\nline 5\nline 6\nline 7\nline 8\nline 9\nline 10\n\
line 11\nline 12\nline 13\nline 14\nline 15\nline 16\nline 17\nline 18\nline 19\nline 20\n";

/// `A_ORIGINAL` with two lines inserted after line 2.
const A_TOP_ONLY: &str = "line 1\nline 2\nnew A1\nnew A2\nline 3\nline 4\nline 5\nline 6\nline 7\nline 8\n\
line 9\nline 10\nline 11\nline 12\nline 13\nline 14\nline 15\nline 16\nline 17\nline 18\nline 19\nline 20\n";

/// `A_ORIGINAL` with line 18 rewritten.
const A_BOTTOM_ONLY: &str = "line 1\nline 2\nline 3\nline 4\nline 5\nline 6\nline 7\nline 8\nline 9\nline 10\n\
line 11\nline 12\nline 13\nline 14\nline 15\nline 16\nline 17\nline 18 changed\nline 19\nline 20\n";

/// Both edits.
const A_EDITED: &str = "line 1\nline 2\nnew A1\nnew A2\nline 3\nline 4\nline 5\nline 6\nline 7\nline 8\n\
line 9\nline 10\nline 11\nline 12\nline 13\nline 14\nline 15\nline 16\nline 17\nline 18 changed\nline 19\nline 20\n";

const B_ORIGINAL: &str = "b1\nb2\nb3\n";
const B_EDITED: &str = "b1\nB2\nb3\n";

/// Temporary repository with one initial commit of `a.txt` and `b.txt`.
struct TestRepo {
    _temp_dir: TempDir,
    repo_path: PathBuf,
    repo: Repository,
}

impl TestRepo {
    fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let repo_path = temp_dir.path().to_path_buf();
        let repo = Repository::init(&repo_path)?;

        let mut config = repo.config()?;
        config.set_str("user.name", "Test User")?;
        config.set_str("user.email", "test@example.com")?;
        config.set_bool("commit.gpgsign", false)?;

        let test_repo = Self {
            _temp_dir: temp_dir,
            repo_path,
            repo,
        };
        test_repo.write("a.txt", A_ORIGINAL)?;
        test_repo.write("b.txt", B_ORIGINAL)?;
        test_repo.commit_all("chore: initial import")?;
        Ok(test_repo)
    }

    fn write(&self, path: &str, content: &str) -> Result<()> {
        let full = self.repo_path.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, content)?;
        Ok(())
    }

    fn commit_all(&self, message: &str) -> Result<Oid> {
        let mut index = self.repo.index()?;
        index.read(true)?;
        index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"], None)?;
        index.write()?;

        let tree = self.repo.find_tree(index.write_tree()?)?;
        let signature = Signature::now("Test User", "test@example.com")?;
        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        Ok(self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?)
    }

    fn open(&self) -> Result<GitRepository> {
        GitRepository::open_at(&self.repo_path)
    }

    fn snapshot(&self) -> Result<(GitRepository, String)> {
        let git = self.open()?;
        let diff = git.snapshot_diff(&SnapshotOptions::default())?;
        Ok((git, diff))
    }

    /// Commit subjects on HEAD, newest first.
    fn subjects(&self) -> Result<Vec<String>> {
        let mut walker = self.repo.revwalk()?;
        walker.push_head()?;
        let mut subjects = Vec::new();
        for oid in walker {
            let commit = self.repo.find_commit(oid?)?;
            subjects.push(commit.summary().unwrap_or_default().to_string());
        }
        Ok(subjects)
    }

    /// Content of `path` in the commit `back` steps behind HEAD.
    fn file_in_commit(&self, back: usize, path: &str) -> Result<Option<String>> {
        let mut commit = self.repo.head()?.peel_to_commit()?;
        for _ in 0..back {
            commit = commit.parent(0)?;
        }
        let tree = commit.tree()?;
        match tree.get_path(Path::new(path)) {
            Ok(entry) => {
                let blob = self.repo.find_blob(entry.id())?;
                Ok(Some(String::from_utf8(blob.content().to_vec())?))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn index_tree(&self) -> Result<Oid> {
        let mut index = self.repo.index()?;
        index.read(true)?;
        Ok(index.write_tree()?)
    }

    fn edit_both_files(&self) -> Result<()> {
        self.write("a.txt", A_EDITED)?;
        self.write("b.txt", B_EDITED)
    }
}

fn scenario_a_plan() -> CommitPlan {
    CommitPlan::new(vec![
        CommitProposal::new("feat: a", [1]),
        CommitProposal::new("fix: b", [2, 3]),
    ])
}

#[test]
fn snapshot_decomposes_into_three_units() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.edit_both_files()?;

    let (_git, diff) = test_repo.snapshot()?;
    let changes = decompose(&diff);

    assert_eq!(changes.ids(), vec![UnitId(1), UnitId(2), UnitId(3)]);
    let paths: Vec<&str> = changes.units().iter().map(|u| u.file_path.as_str()).collect();
    assert_eq!(paths, vec!["a.txt", "a.txt", "b.txt"]);
    assert!(changes
        .units()
        .iter()
        .all(|u| u.change_kind == ChangeKind::Modified));
    assert_eq!(changes.reassemble(), diff);
    Ok(())
}

#[test]
fn apply_all_creates_commits_in_plan_order() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.edit_both_files()?;
    let (git, diff) = test_repo.snapshot()?;

    let mut session = plan_session(&diff, scenario_a_plan(), false)?;
    let status = session.apply_all(&git)?;

    assert_eq!(status.state, SessionState::Done);
    assert!(status.remaining.is_empty());
    assert_eq!(status.applied.len(), 2);
    assert_eq!(
        test_repo.subjects()?,
        vec!["fix: b", "feat: a", "chore: initial import"]
    );

    assert_eq!(test_repo.file_in_commit(1, "a.txt")?.as_deref(), Some(A_TOP_ONLY));
    assert_eq!(test_repo.file_in_commit(1, "b.txt")?.as_deref(), Some(B_ORIGINAL));
    assert_eq!(test_repo.file_in_commit(0, "a.txt")?.as_deref(), Some(A_EDITED));
    assert_eq!(test_repo.file_in_commit(0, "b.txt")?.as_deref(), Some(B_EDITED));

    let head = test_repo.repo.head()?.peel_to_commit()?;
    assert_eq!(status.applied[0].commit_id, head.parent_id(0)?.to_string());
    assert_eq!(status.applied[1].commit_id, head.id().to_string());
    assert!(git.working_directory_status()?.clean);
    Ok(())
}

#[test]
fn incomplete_plan_is_rejected_before_touching_the_repository() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.edit_both_files()?;
    let (_git, diff) = test_repo.snapshot()?;

    let plan = CommitPlan::new(vec![
        CommitProposal::new("feat: a", [1]),
        CommitProposal::new("fix: b", [2]),
    ]);
    let error = plan_session(&diff, plan, false).unwrap_err();
    assert_eq!(
        error,
        ValidationError::IncompletePartition {
            missing: vec![UnitId(3)]
        }
    );
    assert_eq!(test_repo.subjects()?.len(), 1);
    Ok(())
}

#[test]
fn duplicate_assignment_is_rejected() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.edit_both_files()?;
    let (_git, diff) = test_repo.snapshot()?;
    let changes = decompose(&diff);

    let plan = CommitPlan::new(vec![
        CommitProposal::new("feat: a", [1, 2]),
        CommitProposal::new("fix: b", [2, 3]),
    ]);
    let error = validate(changes.units(), plan, false).unwrap_err();
    assert!(matches!(
        error,
        ValidationError::DuplicateAssignment { unit: UnitId(2), .. }
    ));
    Ok(())
}

#[test]
fn out_of_band_edit_halts_with_failing_proposal_at_head() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.edit_both_files()?;
    let (git, diff) = test_repo.snapshot()?;

    let mut session = plan_session(&diff, scenario_a_plan(), false)?;
    session.apply_next(&git)?;
    assert_eq!(test_repo.subjects()?.len(), 2);

    test_repo.write("b.txt", "b1\nB2\nb3\nedited elsewhere\n")?;
    let index_before = test_repo.index_tree()?;

    let error = session.apply_next(&git).unwrap_err();
    assert!(matches!(
        error,
        SessionError::Staging {
            proposal: 2,
            error: StagingError::PatchApplyConflict { .. }
        }
    ));

    let status = session.status();
    assert_eq!(status.state, SessionState::Halted);
    assert_eq!(status.remaining.len(), 1);
    assert_eq!(status.remaining[0].message, "fix: b");
    assert_eq!(test_repo.subjects()?.len(), 2);
    assert_eq!(test_repo.index_tree()?, index_before);
    Ok(())
}

#[test]
fn index_conflict_leaves_index_untouched() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.edit_both_files()?;
    let (git, diff) = test_repo.snapshot()?;
    let mut session = plan_session(&diff, scenario_a_plan(), false)?;

    // Stage unrelated content for a.txt behind the session's back.
    let mut index = test_repo.repo.index()?;
    index.read(true)?;
    let entry = index
        .get_path(Path::new("a.txt"), 0)
        .ok_or_else(|| anyhow::anyhow!("a.txt missing from index"))?;
    index.add_frombuffer(&entry, b"replaced\n")?;
    index.write()?;
    let index_before = test_repo.index_tree()?;

    let error = session.apply_next(&git).unwrap_err();
    assert!(matches!(
        error,
        SessionError::Staging {
            proposal: 1,
            error: StagingError::PatchApplyConflict { .. }
        }
    ));
    assert_eq!(test_repo.index_tree()?, index_before);
    assert_eq!(test_repo.subjects()?.len(), 1);
    Ok(())
}

#[test]
fn same_file_units_commit_separately_top_first() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.write("a.txt", A_EDITED)?;
    let (git, diff) = test_repo.snapshot()?;

    let plan = CommitPlan::new(vec![
        CommitProposal::new("feat: insert lines", [1]),
        CommitProposal::new("fix: rewrite line 18", [2]),
    ]);
    let mut session = plan_session(&diff, plan, false)?;
    session.apply_all(&git)?;

    assert_eq!(test_repo.file_in_commit(1, "a.txt")?.as_deref(), Some(A_TOP_ONLY));
    assert_eq!(test_repo.file_in_commit(0, "a.txt")?.as_deref(), Some(A_EDITED));
    assert!(git.working_directory_status()?.clean);
    Ok(())
}

#[test]
fn same_file_units_commit_separately_bottom_first() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.write("a.txt", A_EDITED)?;
    let (git, diff) = test_repo.snapshot()?;

    let plan = CommitPlan::new(vec![
        CommitProposal::new("fix: rewrite line 18", [2]),
        CommitProposal::new("feat: insert lines", [1]),
    ]);
    let mut session = plan_session(&diff, plan, false)?;
    session.apply_all(&git)?;

    assert_eq!(
        test_repo.file_in_commit(1, "a.txt")?.as_deref(),
        Some(A_BOTTOM_ONLY)
    );
    assert_eq!(test_repo.file_in_commit(0, "a.txt")?.as_deref(), Some(A_EDITED));
    assert!(git.working_directory_status()?.clean);
    Ok(())
}

#[test]
fn untracked_and_deleted_files_are_whole_file_units() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.write("docs/notes.md", "# Notes\n\nfirst\n")?;
    fs::remove_file(test_repo.repo_path.join("b.txt"))?;
    let (git, diff) = test_repo.snapshot()?;

    let changes = decompose(&diff);
    let kinds: Vec<(&str, ChangeKind)> = changes
        .units()
        .iter()
        .map(|u| (u.file_path.as_str(), u.change_kind))
        .collect();
    assert_eq!(
        kinds,
        vec![("b.txt", ChangeKind::Deleted), ("docs/notes.md", ChangeKind::Added)]
    );

    let plan = CommitPlan::new(vec![
        CommitProposal::new("docs: add notes", [2]),
        CommitProposal::new("chore: drop b", [1]),
    ]);
    let mut session = plan_session(&diff, plan, false)?;
    session.apply_all(&git)?;

    assert_eq!(
        test_repo.file_in_commit(1, "docs/notes.md")?.as_deref(),
        Some("# Notes\n\nfirst\n")
    );
    assert_eq!(test_repo.file_in_commit(1, "b.txt")?.as_deref(), Some(B_ORIGINAL));
    assert_eq!(test_repo.file_in_commit(0, "b.txt")?, None);
    assert!(git.working_directory_status()?.clean);
    Ok(())
}

#[test]
fn excluded_units_stay_in_the_working_tree() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.edit_both_files()?;
    let (git, diff) = test_repo.snapshot()?;

    let plan = CommitPlan::new(vec![CommitProposal::new("fix: b", [3])]);
    let mut session = plan_session(&diff, plan, true)?;
    let status = session.apply_all(&git)?;

    assert_eq!(status.excluded, vec![UnitId(1), UnitId(2)]);
    assert_eq!(test_repo.file_in_commit(0, "a.txt")?.as_deref(), Some(A_ORIGINAL));
    assert_eq!(test_repo.file_in_commit(0, "b.txt")?.as_deref(), Some(B_EDITED));

    let remaining = git.working_directory_status()?;
    assert!(!remaining.clean);
    assert_eq!(remaining.changes.len(), 1);
    assert_eq!(remaining.changes[0].file, "a.txt");
    Ok(())
}

#[test]
fn clean_tree_gives_a_finished_session() -> Result<()> {
    let test_repo = TestRepo::new()?;
    let (git, diff) = test_repo.snapshot()?;
    assert!(diff.is_empty());

    let mut session = plan_session(&diff, CommitPlan::default(), false)?;
    assert_eq!(session.state(), SessionState::Done);
    assert!(session.apply_all(&git)?.is_done());
    assert_eq!(test_repo.subjects()?.len(), 1);
    Ok(())
}

#[test]
fn staged_changes_block_planning() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.write("b.txt", B_EDITED)?;
    let mut index = test_repo.repo.index()?;
    index.add_path(Path::new("b.txt"))?;
    index.write()?;

    let error = test_repo.open()?.ensure_nothing_staged().unwrap_err();
    assert!(error.to_string().contains("b.txt"));
    Ok(())
}

#[test]
fn rename_is_detected_for_untracked_target() -> Result<()> {
    let test_repo = TestRepo::new()?;
    fs::rename(
        test_repo.repo_path.join("a.txt"),
        test_repo.repo_path.join("moved.txt"),
    )?;
    let (_git, diff) = test_repo.snapshot()?;

    let changes = decompose(&diff);
    assert_eq!(changes.len(), 1);
    let unit = &changes.units()[0];
    assert_eq!(unit.change_kind, ChangeKind::Renamed);
    assert_eq!(unit.file_path, "moved.txt");
    assert_eq!(unit.old_path.as_deref(), Some("a.txt"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn rejected_commit_can_be_retried_without_restaging() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let test_repo = TestRepo::new()?;
    test_repo.edit_both_files()?;
    let hook = test_repo.repo_path.join(".git/hooks/pre-commit");
    fs::create_dir_all(hook.parent().unwrap_or(&test_repo.repo_path))?;
    fs::write(&hook, "#!/bin/sh\nexit 1\n")?;
    fs::set_permissions(&hook, fs::Permissions::from_mode(0o755))?;

    let (git, diff) = test_repo.snapshot()?;
    let mut session = plan_session(&diff, scenario_a_plan(), false)?;

    let error = session.apply_next(&git).unwrap_err();
    assert!(matches!(
        error,
        SessionError::CommitCreation { proposal: 1, .. }
    ));
    assert_eq!(test_repo.subjects()?.len(), 1);

    fs::remove_file(&hook)?;
    let status = session.retry_commit(&git)?;
    assert_eq!(status.state, SessionState::Ready);
    assert_eq!(test_repo.file_in_commit(0, "a.txt")?.as_deref(), Some(A_TOP_ONLY));
    Ok(())
}

#[cfg(unix)]
#[test]
fn hooks_are_skipped_when_verification_is_off() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let test_repo = TestRepo::new()?;
    test_repo.write("b.txt", B_EDITED)?;
    let hook = test_repo.repo_path.join(".git/hooks/pre-commit");
    fs::create_dir_all(hook.parent().unwrap_or(&test_repo.repo_path))?;
    fs::write(&hook, "#!/bin/sh\nexit 1\n")?;
    fs::set_permissions(&hook, fs::Permissions::from_mode(0o755))?;

    let git = test_repo.open()?.with_verify_hooks(false);
    let diff = git.snapshot_diff(&SnapshotOptions::default())?;
    let plan = CommitPlan::new(vec![CommitProposal::new("fix: b", [1])]);
    let mut session = plan_session(&diff, plan, false)?;

    assert!(session.apply_all(&git)?.is_done());
    assert_eq!(test_repo.subjects()?[0], "fix: b");
    Ok(())
}

#[cfg(unix)]
#[test]
fn mode_change_with_two_hunks_commits_in_reverse_order() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let original: String = (1..=30).map(|n| format!("echo {n}\n")).collect();
    let edited = original
        .replace("echo 2\n", "echo two\n")
        .replace("echo 28\n", "echo twenty-eight\n");
    let bottom_only = original.replace("echo 28\n", "echo twenty-eight\n");

    let test_repo = TestRepo::new()?;
    test_repo.write("run.sh", &original)?;
    test_repo.commit_all("chore: add script")?;
    let script = test_repo.repo_path.join("run.sh");
    fs::write(&script, &edited)?;
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;

    let (git, diff) = test_repo.snapshot()?;
    assert_eq!(decompose(&diff).len(), 2);

    let plan = CommitPlan::new(vec![
        CommitProposal::new("fix: bottom line", [2]),
        CommitProposal::new("fix: top line", [1]),
    ]);
    let mut session = plan_session(&diff, plan, false)?;
    assert!(session.apply_all(&git)?.is_done());

    let head = test_repo.repo.head()?.peel_to_commit()?;
    let entry = head.tree()?.get_path(Path::new("run.sh"))?;
    assert_eq!(entry.filemode(), 0o100755);
    assert_eq!(test_repo.file_in_commit(0, "run.sh")?.as_deref(), Some(edited.as_str()));
    assert_eq!(
        test_repo.file_in_commit(1, "run.sh")?.as_deref(),
        Some(bottom_only.as_str())
    );
    assert!(git.working_directory_status()?.clean);
    Ok(())
}

#[test]
fn non_utf8_file_fails_the_snapshot_by_name() -> Result<()> {
    let test_repo = TestRepo::new()?;
    fs::write(test_repo.repo_path.join("latin1.txt"), b"caf\xe9\nx\n")?;
    test_repo.commit_all("chore: add latin1 text")?;
    fs::write(test_repo.repo_path.join("latin1.txt"), b"caf\xe9 au lait\nx\n")?;

    let git = test_repo.open()?;
    let error = git.snapshot_diff(&SnapshotOptions::default()).unwrap_err();
    assert!(format!("{error:#}").contains("latin1.txt"));
    Ok(())
}

#[test]
fn commit_message_is_recorded_verbatim() -> Result<()> {
    let test_repo = TestRepo::new()?;
    test_repo.write("b.txt", B_EDITED)?;
    let (git, diff) = test_repo.snapshot()?;

    let message = "fix: b\n\n\n\nbody after blank lines";
    let plan = CommitPlan::new(vec![CommitProposal::new(message, [1])]);
    let mut session = plan_session(&diff, plan, false)?;
    session.apply_all(&git)?;

    let head = test_repo.repo.head()?.peel_to_commit()?;
    assert_eq!(head.message().map(|m| m.trim_end_matches('\n')), Some(message));
    Ok(())
}

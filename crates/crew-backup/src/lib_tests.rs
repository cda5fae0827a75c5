use super::*;
use tempfile::tempdir;

struct Fixture {
    _dir: tempfile::TempDir,
    work: PathBuf,
    manager: BackupManager,
    project: ProjectId,
}

fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let work = dir.path().join("work");
    fs::create_dir_all(work.join("src")).unwrap();
    let manager = BackupManager::new(dir.path().join("backups"));
    Fixture {
        work,
        manager,
        project: ProjectId::new(),
        _dir: dir,
    }
}

fn write(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn test_create_backup_copies_whole_tree() {
    let fx = fixture();
    write(&fx.work.join("README.md"), "hello");
    write(&fx.work.join("src").join("main.rs"), "fn main() {}");
    fs::create_dir_all(fx.work.join("empty")).unwrap();

    let snapshot = fx
        .manager
        .create_backup(&fx.project, Role::FrontendDeveloper, &fx.work)
        .unwrap();

    assert_eq!(snapshot.role, Role::FrontendDeveloper);
    assert!(snapshot.name.starts_with("frontend_developer_"));
    assert!(snapshot.timestamp().ends_with('Z'));
    assert_eq!(snapshot.timestamp().len(), "2024-05-02T10-11-12-345Z".len());
    assert_eq!(read(&snapshot.path.join("README.md")), "hello");
    assert_eq!(read(&snapshot.path.join("src").join("main.rs")), "fn main() {}");
    assert!(snapshot.path.join("empty").is_dir());
}

#[test]
fn test_restore_latest_picks_newest_for_role_only() {
    let fx = fixture();
    let version = fx.work.join("version.txt");

    write(&version, "1");
    fx.manager
        .create_backup(&fx.project, Role::FrontendDeveloper, &fx.work)
        .unwrap();
    write(&version, "2");
    fx.manager
        .create_backup(&fx.project, Role::FrontendDeveloper, &fx.work)
        .unwrap();
    write(&version, "backend");
    fx.manager
        .create_backup(&fx.project, Role::BackendDeveloper, &fx.work)
        .unwrap();
    write(&version, "3");
    let newest = fx
        .manager
        .create_backup(&fx.project, Role::FrontendDeveloper, &fx.work)
        .unwrap();

    write(&version, "broken");
    write(&fx.work.join("src").join("added_later.rs"), "junk");

    let restored = fx
        .manager
        .restore_latest(&fx.project, Role::FrontendDeveloper, &fx.work)
        .unwrap();
    assert_eq!(restored.name, newest.name);
    assert_eq!(read(&version), "3");
    assert!(!fx.work.join("src").join("added_later.rs").exists());

    let restored = fx
        .manager
        .restore_latest(&fx.project, Role::BackendDeveloper, &fx.work)
        .unwrap();
    assert_eq!(restored.role, Role::BackendDeveloper);
    assert_eq!(read(&version), "backend");
}

#[test]
fn test_list_backups_newest_first() {
    let fx = fixture();
    for role in [Role::FrontendDeveloper, Role::BackendDeveloper, Role::FrontendDeveloper] {
        fx.manager.create_backup(&fx.project, role, &fx.work).unwrap();
    }
    let names: Vec<String> = fx
        .manager
        .list_backups(&fx.project)
        .unwrap()
        .into_iter()
        .map(|snapshot| snapshot.name)
        .collect();
    assert_eq!(names.len(), 3);
    let mut sorted = names.clone();
    sorted.sort();
    sorted.reverse();
    assert_eq!(names, sorted);
}

#[test]
fn test_restore_without_backup_is_no_backup_error() {
    let fx = fixture();
    fx.manager
        .create_backup(&fx.project, Role::BackendDeveloper, &fx.work)
        .unwrap();
    let err = fx
        .manager
        .restore_latest(&fx.project, Role::FrontendDeveloper, &fx.work)
        .unwrap_err();
    assert!(matches!(
        err,
        CrewError::NoBackup {
            role: Role::FrontendDeveloper,
            ..
        }
    ));
}

#[test]
fn test_create_backup_of_missing_dir_is_backup_error() {
    let fx = fixture();
    let err = fx
        .manager
        .create_backup(&fx.project, Role::Qa, &fx.work.join("missing"))
        .unwrap_err();
    assert!(matches!(err, CrewError::Backup(_)));
    assert!(err.to_string().starts_with("Backup failed:"));
}

#[test]
fn test_nested_backup_root_is_excluded_and_preserved() {
    let dir = tempdir().unwrap();
    let work = dir.path().to_path_buf();
    write(&work.join("app.js"), "v1");
    let manager = BackupManager::new(work.join(".crew").join("backups"));
    let project = ProjectId::new();

    let first = manager
        .create_backup(&project, Role::FrontendDeveloper, &work)
        .unwrap();
    assert!(!first.path.join(".crew").exists());

    write(&work.join("app.js"), "v2");
    write(&work.join(".crew").join("notes.txt"), "scratch");
    manager
        .restore_latest(&project, Role::FrontendDeveloper, &work)
        .unwrap();

    assert_eq!(read(&work.join("app.js")), "v1");
    assert!(first.path.is_dir(), "snapshot must survive the restore");
    assert!(!work.join(".crew").join("notes.txt").exists());
}

#[test]
fn test_reserve_name_appends_padded_suffix() {
    let dir = tempdir().unwrap();
    let (first, staging) = reserve_name(dir.path(), "qa_2024-05-02T10-11-12-345Z").unwrap();
    let (second, _) = reserve_name(dir.path(), "qa_2024-05-02T10-11-12-345Z").unwrap();
    assert_eq!(first, "qa_2024-05-02T10-11-12-345Z");
    assert_eq!(staging, dir.path().join(".partial-qa_2024-05-02T10-11-12-345Z"));
    assert_eq!(second, "qa_2024-05-02T10-11-12-345Z-001");
    assert!(second > first);
}

#[test]
fn test_same_millisecond_snapshots_sort_in_creation_order() {
    let fx = fixture();
    let project_dir = fx.manager.project_dir(&fx.project);
    fs::create_dir_all(&project_dir).unwrap();
    let base = "qa_2024-05-02T10-11-12-345Z";

    let mut created = Vec::new();
    for _ in 0..12 {
        let (name, staging) = reserve_name(&project_dir, base).unwrap();
        fs::rename(&staging, project_dir.join(&name)).unwrap();
        created.push(name);
    }
    assert_eq!(created[10], format!("{base}-010"));

    let mut sorted = created.clone();
    sorted.sort();
    assert_eq!(sorted, created);
    let latest = fx.manager.latest(&fx.project, Role::Qa).unwrap().unwrap();
    assert_eq!(latest.name, format!("{base}-011"));
}

#[test]
fn test_failed_backup_leaves_no_snapshot() {
    let fx = fixture();
    write(&fx.work.join("app.js"), "good");
    let good = fx
        .manager
        .create_backup(&fx.project, Role::FrontendDeveloper, &fx.work)
        .unwrap();

    // Sockets cannot be copied, so the second copy fails midway.
    write(&fx.work.join("app.js"), "broken");
    let _socket = std::os::unix::net::UnixListener::bind(fx.work.join("zz.sock")).unwrap();
    let err = fx
        .manager
        .create_backup(&fx.project, Role::FrontendDeveloper, &fx.work)
        .unwrap_err();
    assert!(matches!(err, CrewError::Backup(_)));

    let names: Vec<String> = fx
        .manager
        .list_backups(&fx.project)
        .unwrap()
        .into_iter()
        .map(|snapshot| snapshot.name)
        .collect();
    assert_eq!(names, vec![good.name.clone()]);
    let leftovers = fs::read_dir(fx.manager.project_dir(&fx.project))
        .unwrap()
        .count();
    assert_eq!(leftovers, 1, "staging directory must be removed");

    fs::remove_file(fx.work.join("zz.sock")).unwrap();
    let restored = fx
        .manager
        .restore_latest(&fx.project, Role::FrontendDeveloper, &fx.work)
        .unwrap();
    assert_eq!(restored.name, good.name);
    assert_eq!(read(&fx.work.join("app.js")), "good");
}

#[test]
fn test_preserved_data_dir_survives_restore() {
    let dir = tempdir().unwrap();
    let work = dir.path().to_path_buf();
    let data = work.join(".agent-crew");
    let memory = data.join("tasks").join("p1").join("qa_memory.md");
    fs::create_dir_all(memory.parent().unwrap()).unwrap();
    write(&memory, "first report");
    write(&work.join("app.js"), "v1");
    let manager = BackupManager::new(data.join("backups")).preserve(&data);
    let project = ProjectId::new();

    let snapshot = manager
        .create_backup(&project, Role::FrontendDeveloper, &work)
        .unwrap();
    assert!(!snapshot.path.join(".agent-crew").exists());

    write(&work.join("app.js"), "v2");
    write(&memory, "first report\n\nsecond report");
    manager
        .restore_latest(&project, Role::FrontendDeveloper, &work)
        .unwrap();

    assert_eq!(read(&work.join("app.js")), "v1");
    assert_eq!(read(&memory), "first report\n\nsecond report");
}

#[test]
fn test_role_of_requires_underscore_boundary() {
    assert_eq!(role_of("qa_2024"), Some(Role::Qa));
    assert_eq!(role_of("frontend_developer_2024"), Some(Role::FrontendDeveloper));
    assert_eq!(role_of("qa2024"), None);
    assert_eq!(role_of("notes"), None);
}

use depot_files::{
    Disks, FileEvent, FileRepository, FilesError, JsonRecordStore, LocalDisk, RecordingNotifier,
    SizeBase, SizeUnit, UploadedFile,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

struct Depot {
    _temp: TempDir,
    repository: FileRepository,
    notifier: Arc<RecordingNotifier>,
    records_root: std::path::PathBuf,
    public_root: std::path::PathBuf,
    archive_root: std::path::PathBuf,
}

fn depot() -> Depot {
    let temp = TempDir::new().unwrap();
    let public_root = temp.path().join("public");
    let archive_root = temp.path().join("archive");
    let records_root = temp.path().join("records");

    let disks = Disks::builder()
        .disk(
            "public",
            LocalDisk::new(&public_root).with_url("http://localhost:3000/storage/public"),
        )
        .disk("archive", LocalDisk::new(&archive_root))
        .default_disk("public")
        .build()
        .unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let repository = FileRepository::new(
        disks,
        Arc::new(JsonRecordStore::new(&records_root)),
        notifier.clone(),
    );

    Depot {
        _temp: temp,
        repository,
        notifier,
        records_root,
        public_root,
        archive_root,
    }
}

fn write_source(dir: &Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn upload_move_and_reload_from_records() {
    let depot = depot();
    let source_dir = TempDir::new().unwrap();
    let source = write_source(source_dir.path(), "report.pdf", b"%PDF-1.4 minimal");

    let upload = UploadedFile::from_path(&source).unwrap();
    let mut file = depot
        .repository
        .create_from_upload(&upload, "reports/2024/", None)
        .unwrap();

    assert_eq!(file.fullname(), "reports/2024/report.pdf");
    assert_eq!(file.extension(), Some("pdf"));
    assert!(depot.public_root.join("reports/2024/report.pdf").is_file());
    assert_eq!(
        depot.repository.url(&file).unwrap(),
        "http://localhost:3000/storage/public/reports/2024/report.pdf"
    );

    let events = depot
        .repository
        .move_file(&mut file, "archive::2024/q1.pdf")
        .unwrap();

    let kinds: Vec<_> = events.iter().map(FileEvent::kind).collect();
    assert_eq!(kinds, vec!["moved", "renamed"]);
    assert!(!depot.public_root.join("reports/2024/report.pdf").exists());
    assert_eq!(
        fs::read(depot.archive_root.join("2024/q1.pdf")).unwrap(),
        b"%PDF-1.4 minimal"
    );

    // A second store over the same directory sees the moved record.
    let reloaded = JsonRecordStore::new(&depot.records_root);
    let restored = depot_files::RecordStore::fetch(&reloaded, &file.id())
        .unwrap()
        .unwrap();
    assert_eq!(restored, file);
    assert_eq!(restored.disk().as_str(), "archive");
    assert_eq!(restored.fullname(), "2024/q1.pdf");

    let kinds: Vec<_> = depot
        .notifier
        .events()
        .iter()
        .map(FileEvent::kind)
        .collect();
    assert_eq!(kinds, vec!["created", "moved", "renamed"]);
}

#[test]
fn orphaned_file_is_reported_not_found() {
    let depot = depot();
    let upload = UploadedFile::new("notes.txt", b"remember the milk".to_vec());
    let mut file = depot
        .repository
        .create_from_upload(&upload, "/", None)
        .unwrap();

    fs::remove_file(depot.public_root.join("notes.txt")).unwrap();

    assert!(!depot.repository.exists(&file).unwrap());
    assert!(matches!(
        depot.repository.content(&file),
        Err(FilesError::NotFound { .. })
    ));
    assert!(matches!(
        depot.repository.move_file(&mut file, "elsewhere/"),
        Err(FilesError::NotFound { .. })
    ));
    // The record itself survives.
    assert_eq!(depot.repository.find(file.id()).unwrap(), file);
}

#[test]
fn archive_disk_has_no_public_url() {
    let depot = depot();
    let upload = UploadedFile::new("a.bin", vec![1, 2, 3]);
    let file = depot
        .repository
        .create_from_upload(&upload, "archive::/", None)
        .unwrap();

    assert!(matches!(
        depot.repository.url(&file),
        Err(FilesError::Backend { .. })
    ));
    assert_eq!(depot.repository.content(&file).unwrap(), vec![1, 2, 3]);
}

#[test]
fn list_and_size() {
    let depot = depot();
    for name in ["one.bin", "two.bin"] {
        let upload = UploadedFile::new(name, vec![0u8; 1_500_000]);
        depot
            .repository
            .create_from_upload(&upload, "bulk/", None)
            .unwrap();
    }

    let files = depot.repository.list().unwrap();

    assert_eq!(files.len(), 2);
    for file in &files {
        assert_eq!(file.size_in(SizeUnit::Megabytes, SizeBase::Decimal), 1.5);
        assert_eq!(file.path(), "bulk");
    }
}

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::tempdir;

use mend_core::crypto::CipherSuite;
use mend_core::files::{decrypt_file, encrypt_file};
use mend_core::lifecycle::{setup, PRIVATE_KEY_FILE, PUBLIC_KEY_FILE};
use mend_core::log::{append_entry, entry_body, entry_timestamp, read_log};
use mend_core::settings::{load_wrapped_material, MemorySettings};
use mend_core::shred::SecureDelete;
use mend_core::{KeyLifecycle, LockState, MendContext, MendError, SettingKey, SettingsStore};

/// Records every path it is asked to delete, then removes it.
#[derive(Default)]
struct RecordingDelete {
    calls: RefCell<Vec<PathBuf>>,
}

impl SecureDelete for &RecordingDelete {
    fn secure_delete(&self, path: &Path) -> mend_core::Result<()> {
        self.calls.borrow_mut().push(path.to_path_buf());
        fs::remove_file(path)?;
        Ok(())
    }
}

fn configured_store(root: &Path, password: &str) -> MemorySettings {
    let mut store = MemorySettings::new();
    store
        .set_value(SettingKey::WorkDir, &root.join("work").to_string_lossy())
        .unwrap();
    setup(&mut store, password, CipherSuite::default(), 1024).expect("setup should succeed");
    store
}

#[test]
fn test_log_hello_end_to_end() {
    let dir = tempdir().unwrap();
    let store = configured_store(dir.path(), "p@ss");
    let ctx = MendContext::from_settings(&store).unwrap();
    let log_path = dir.path().join("logs").join("default.log");

    // Appending only needs the public key.
    append_entry(&ctx, &log_path, "hello").unwrap();
    let on_disk = fs::read(&log_path).unwrap();
    assert!(!String::from_utf8_lossy(&on_disk).contains("hello"));

    let deleter = RecordingDelete::default();
    let lifecycle = KeyLifecycle::new(ctx.work_dir(), &deleter);
    lifecycle
        .unlock(&load_wrapped_material(&store).unwrap(), "p@ss")
        .unwrap();
    let key = lifecycle.load_private_key().unwrap();

    let entries = read_log(ctx.cipher(), &key, &log_path).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].ends_with("hello"));
    assert_eq!(entry_body(&entries[0]), "hello");
    assert!(entry_timestamp(&entries[0]).is_some());
}

#[test]
fn test_lock_deletes_each_key_file_once() {
    let dir = tempdir().unwrap();
    let store = configured_store(dir.path(), "p@ss");
    let ctx = MendContext::from_settings(&store).unwrap();

    let deleter = RecordingDelete::default();
    let lifecycle = KeyLifecycle::new(ctx.work_dir(), &deleter);
    lifecycle
        .unlock(&load_wrapped_material(&store).unwrap(), "p@ss")
        .unwrap();
    assert_eq!(lifecycle.state(), LockState::Unlocked);
    assert!(ctx.work_dir().join(PRIVATE_KEY_FILE).exists());

    lifecycle.lock().unwrap();

    let mut calls = deleter.calls.borrow().clone();
    calls.sort();
    let mut expected = vec![
        ctx.work_dir().join(PRIVATE_KEY_FILE),
        ctx.work_dir().join(PUBLIC_KEY_FILE),
    ];
    expected.sort();
    assert_eq!(calls, expected);
    assert_eq!(lifecycle.state(), LockState::Locked);

    // Nothing left to delete the second time.
    lifecycle.lock().unwrap();
    assert_eq!(deleter.calls.borrow().len(), 2);
}

#[test]
fn test_wrong_password_never_materializes_key() {
    let dir = tempdir().unwrap();
    let store = configured_store(dir.path(), "p@ss");
    let ctx = MendContext::from_settings(&store).unwrap();

    let deleter = RecordingDelete::default();
    let lifecycle = KeyLifecycle::new(ctx.work_dir(), &deleter);
    let result = lifecycle.unlock(&load_wrapped_material(&store).unwrap(), "P@ss");

    assert!(matches!(result, Err(MendError::IncorrectPassword)));
    assert_eq!(lifecycle.state(), LockState::Locked);
    assert!(!ctx.work_dir().join(PRIVATE_KEY_FILE).exists());
}

#[test]
fn test_file_encryption_through_lifecycle() {
    let dir = tempdir().unwrap();
    let store = configured_store(dir.path(), "p@ss");
    let ctx = MendContext::from_settings(&store).unwrap();

    let source = dir.path().join("photo.jpg");
    let payload: Vec<u8> = (0..20_000u32).map(|i| (i * 7 % 256) as u8).collect();
    fs::write(&source, &payload).unwrap();
    let encrypted = encrypt_file(&ctx, &source, &dir.path().join("enc")).unwrap();

    let deleter = RecordingDelete::default();
    let lifecycle = KeyLifecycle::new(ctx.work_dir(), &deleter);
    assert!(matches!(
        lifecycle.load_private_key(),
        Err(MendError::Locked)
    ));
    lifecycle
        .unlock(&load_wrapped_material(&store).unwrap(), "p@ss")
        .unwrap();

    let key = lifecycle.load_private_key().unwrap();
    let restored = decrypt_file(ctx.cipher(), &key, &encrypted, &dir.path().join("dec")).unwrap();
    assert_eq!(restored.file_name().unwrap(), "photo.jpg");
    assert_eq!(fs::read(restored).unwrap(), payload);
}

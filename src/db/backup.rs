//! Online SQLite backups (§6), grounded on
//! `original_source/backend/app/services/backup_service.py`'s
//! `sqlite3.Connection.backup()` + timestamp-named-file rotation, reimplemented
//! on `rusqlite::backup::Backup` (the same SQLite online-backup API under a
//! typed wrapper).

use super::Database;
use crate::Result;
use chrono::Utc;
use rusqlite::backup::Backup;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub struct BackupOutcome {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl Database {
    /// Backs up the live database into `backup_dir/walkabout-<timestamp>.db`
    /// using SQLite's online backup API (safe to run against a connection
    /// that's concurrently being written to), then rotates old backups down
    /// to `max_backups`.
    pub fn backup_to(&self, backup_dir: &Path, max_backups: usize) -> Result<BackupOutcome> {
        std::fs::create_dir_all(backup_dir)?;
        let timestamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();
        let backup_path = backup_dir.join(format!("walkabout-{timestamp}.db"));

        let mut dest = Connection::open(&backup_path)?;
        self.session(|source| {
            let backup = Backup::new(source, &mut dest)?;
            backup.run_to_completion(100, Duration::from_millis(50), None)
        })?;

        let size_bytes = std::fs::metadata(&backup_path)?.len();
        rotate_backups(backup_dir, max_backups)?;

        Ok(BackupOutcome { path: backup_path, size_bytes })
    }
}

/// Deletes the oldest `walkabout-*.db` files beyond `max_backups`, oldest
/// file-modified-time first.
fn rotate_backups(backup_dir: &Path, max_backups: usize) -> Result<()> {
    let mut backups: Vec<(std::time::SystemTime, PathBuf)> = std::fs::read_dir(backup_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("walkabout-") && n.ends_with(".db"))
                .unwrap_or(false)
        })
        .filter_map(|path| std::fs::metadata(&path).ok().map(|meta| (meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH), path)))
        .collect();

    backups.sort_by_key(|(modified, _)| *modified);
    while backups.len() > max_backups {
        let (_, oldest) = backups.remove(0);
        let _ = std::fs::remove_file(oldest);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_writes_a_file_and_rotates_old_ones() {
        let db = Database::open_in_memory().unwrap();
        let dir = std::env::temp_dir().join(format!("walkabout-backup-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        for _ in 0..3 {
            db.backup_to(&dir, 2).unwrap();
            std::thread::sleep(Duration::from_millis(10));
        }

        let count = std::fs::read_dir(&dir).unwrap().count();
        assert_eq!(count, 2);
        std::fs::remove_dir_all(&dir).ok();
    }
}

use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Write};
use std::path::Path;

use crate::store::Database;

/// Write a gzip-compressed bincode snapshot of every collection
pub fn save_backup(db: &Database, path: impl AsRef<Path>) -> std::io::Result<()> {
    let file = File::create(path)?;
    write_backup(db, file)
}

pub fn load_backup(path: impl AsRef<Path>) -> std::io::Result<Database> {
    let file = File::open(path)?;
    read_backup(file)
}

/// Snapshot serialized into memory, for downloads
pub fn backup_to_bytes(db: &Database) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_backup(db, &mut buffer)?;
    Ok(buffer)
}

pub fn backup_from_bytes(bytes: &[u8]) -> std::io::Result<Database> {
    read_backup(Cursor::new(bytes))
}

fn write_backup<W: Write>(db: &Database, out: W) -> std::io::Result<()> {
    let encoder = GzEncoder::new(out, Compression::default());
    let mut writer = BufWriter::new(encoder);

    serialize_into(&mut writer, db).map_err(std::io::Error::other)?;

    let encoder = writer.into_inner().map_err(|e| e.into_error())?;
    encoder.finish()?;
    Ok(())
}

fn read_backup<R: std::io::Read>(input: R) -> std::io::Result<Database> {
    let decoder = GzDecoder::new(input);
    let mut reader = BufReader::new(decoder);

    deserialize_from(&mut reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Profile, Table, new_id};
    use crate::store::Store;
    use chrono::Utc;

    #[test]
    fn backup_preserves_documents() {
        let store = Store::in_memory();
        let now = Utc::now();
        let profile = Profile::new("Chez Max", "Max", "max@bar.ga", "+24106123456", "h", now);
        let id = profile.id.clone();
        store.put(profile).unwrap();
        store
            .put(Table {
                id: new_id(),
                establishment_id: id.clone(),
                name: "VIP".to_string(),
                seats: 6,
                zone: Some("Etage".to_string()),
                created_at: now,
            })
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nack.bin.gz");
        save_backup(&store.snapshot(), &path).unwrap();

        let restored = load_backup(&path).unwrap();
        assert_eq!(restored.profiles[&id].created_at, now);
        assert_eq!(restored.tables.values().next().unwrap().zone.as_deref(), Some("Etage"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(backup_from_bytes(b"not a backup").is_err());
    }
}

//! Full-file rewrite: the chosen implementation of `update`/`delete`
//! (spec §9 resolves the "append-plus-tombstone vs full rewrite" open
//! question in favor of the simpler full rewrite). Also used by recovery's
//! `RepairIndexes` path and by destructive index rebuilds, which all start
//! from the same "encode every live entity into a brand-new file" step.

use crate::file::EuffFile;
use crate::writer::Writer;
use entity_core::entity::Entity;
use entity_core::error::Result;
use entity_format::deletion_entry::DeletionEntry;
use std::fs;
use std::path::Path;

/// Write `entities` and `deletions` into a fresh EUFF file at `tmp_path`,
/// removing any stale leftover at that path first. Does not touch
/// `final_path`; callers are responsible for backing up and swapping the
/// old file out once this returns successfully.
pub fn rewrite_file(
    tmp_path: &Path,
    entities: &[Entity],
    deletions: &[DeletionEntry],
    compression_threshold: usize,
) -> Result<EuffFile> {
    if tmp_path.exists() {
        fs::remove_file(tmp_path)?;
    }
    let mut euff = EuffFile::open_or_create(tmp_path)?;
    let mut index_entries = Vec::with_capacity(entities.len());
    {
        let mut writer = Writer::new(&mut euff, compression_threshold);
        for entity in entities {
            index_entries.push(writer.append_entity(entity)?);
        }
    }
    euff.write_footer(&index_entries, deletions)?;
    euff.sync()?;
    Ok(euff)
}

/// Swap a freshly rewritten file into place at `final_path`, first moving
/// whatever currently lives there aside to a timestamped backup (spec §6's
/// `entities.edb.backup.<timestamp>` convention).
pub fn swap_into_place(tmp_path: &Path, final_path: &Path, backup_timestamp_ns: u64) -> Result<()> {
    if final_path.exists() {
        let backup_path = final_path.with_file_name(format!(
            "{}.backup.{backup_timestamp_ns}",
            final_path.file_name().and_then(|n| n.to_str()).unwrap_or("entities.edb")
        ));
        fs::rename(final_path, backup_path)?;
    }
    fs::rename(tmp_path, final_path)?;
    Ok(())
}

//! Fixed-width, NUL-padded entity id encoding shared by index and deletion
//! records.

use entity_core::error::{Error, Result};

/// Write `id` into `field`, NUL-padded. Errors if `id` does not fit.
pub fn write_padded_id(id: &str, field: &mut [u8]) -> Result<()> {
    let bytes = id.as_bytes();
    if bytes.len() > field.len() {
        return Err(Error::Validation(format!(
            "entity id {} bytes exceeds {}-byte field",
            bytes.len(),
            field.len()
        )));
    }
    field.fill(0);
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}

/// Read a NUL-padded id field back into a `String`.
pub fn read_padded_id(field: &[u8]) -> Result<String> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    std::str::from_utf8(&field[..end])
        .map(str::to_string)
        .map_err(|e| Error::Corruption(format!("entity id is not UTF-8: {e}")))
}

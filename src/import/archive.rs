//! Resolves an export archive path to a byte stream the importer can feed
//! straight into [`crate::import::jsonevents::JsonEventReader`], whether
//! the caller handed over a bare `messages.json` or a tar archive
//! containing one, per spec.md §4.5's "optionally tar-wrapped".

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use crate::error::{ChatVaultError, Result};

const TAR_MAGIC_OFFSET: u64 = 257;
const TAR_MAGIC: &[u8] = b"ustar";

/// Opens `path` and returns a reader positioned at the start of its
/// `messages.json` content. A plain JSON file streams straight through; a
/// tar archive has its `messages.json` member located and its bytes read
/// into memory once (the archive container itself isn't re-streamed, only
/// the JSON content it wraps, which still goes through the streaming event
/// parser from there).
pub fn open_export_reader(path: &Path) -> Result<Box<dyn Read>> {
    let mut file = File::open(path).map_err(|e| ChatVaultError::Io(format!("{}: {e}", path.display())))?;
    if is_tar(&mut file)? {
        let mut archive = tar::Archive::new(file);
        let mut entries = archive
            .entries()
            .map_err(|e| ChatVaultError::Parse(format!("reading tar entries: {e}")))?;
        let entry = entries
            .find_map(|entry| {
                let entry = entry.ok()?;
                let name = entry.path().ok()?.to_string_lossy().into_owned();
                name.ends_with("messages.json").then_some(entry)
            })
            .ok_or_else(|| ChatVaultError::Parse("archive has no messages.json member".to_string()))?;
        let mut buf = Vec::new();
        let mut entry = entry;
        entry
            .read_to_end(&mut buf)
            .map_err(|e| ChatVaultError::Io(format!("reading messages.json from archive: {e}")))?;
        Ok(Box::new(Cursor::new(buf)))
    } else {
        use std::io::Seek;
        file.seek(std::io::SeekFrom::Start(0))
            .map_err(|e| ChatVaultError::Io(e.to_string()))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

fn is_tar(file: &mut File) -> Result<bool> {
    use std::io::{Seek, SeekFrom};
    let len = file.metadata().map_err(|e| ChatVaultError::Io(e.to_string()))?.len();
    if len < TAR_MAGIC_OFFSET + TAR_MAGIC.len() as u64 {
        file.seek(SeekFrom::Start(0)).map_err(|e| ChatVaultError::Io(e.to_string()))?;
        return Ok(false);
    }
    file.seek(SeekFrom::Start(TAR_MAGIC_OFFSET)).map_err(|e| ChatVaultError::Io(e.to_string()))?;
    let mut magic = [0u8; 5];
    file.read_exact(&mut magic).map_err(|e| ChatVaultError::Io(e.to_string()))?;
    file.seek(SeekFrom::Start(0)).map_err(|e| ChatVaultError::Io(e.to_string()))?;
    Ok(&magic == TAR_MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_file_opens_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.json");
        std::fs::write(&path, br#"{"conversations": []}"#).unwrap();
        let mut reader = open_export_reader(&path).unwrap();
        let mut buf = String::new();
        reader.read_to_string(&mut buf).unwrap();
        assert!(buf.contains("conversations"));
    }

    #[test]
    fn tar_wrapped_json_is_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let tar_path = dir.path().join("export.tar");
        {
            let file = File::create(&tar_path).unwrap();
            let mut builder = tar::Builder::new(file);
            let content = br#"{"conversations": [{"id": "8:alice"}]}"#;
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_cksum();
            builder.append_data(&mut header, "messages.json", &content[..]).unwrap();
            builder.finish().unwrap();
        }
        let mut reader = open_export_reader(&tar_path).unwrap();
        let mut buf = String::new();
        reader.read_to_string(&mut buf).unwrap();
        assert!(buf.contains("8:alice"));
    }

    #[test]
    fn missing_messages_json_member_errors() {
        let dir = tempfile::tempdir().unwrap();
        let tar_path = dir.path().join("export.tar");
        {
            let file = File::create(&tar_path).unwrap();
            let mut builder = tar::Builder::new(file);
            let content = b"irrelevant";
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_cksum();
            builder.append_data(&mut header, "other.txt", &content[..]).unwrap();
            builder.finish().unwrap();
        }
        assert!(open_export_reader(&tar_path).is_err());
    }
}

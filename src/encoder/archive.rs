//! In-memory ZIP archives

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{ArchiveEncoder, ArchiveSession, EncodeError};

/// ZIP archive service. Always ready.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipArchiver;

impl ZipArchiver {
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveEncoder for ZipArchiver {
    fn is_ready(&self) -> bool {
        true
    }

    fn create(&self) -> Result<Box<dyn ArchiveSession>, EncodeError> {
        Ok(Box::new(ZipSession { writer: ZipWriter::new(Cursor::new(Vec::new())) }))
    }
}

struct ZipSession {
    writer: ZipWriter<Cursor<Vec<u8>>>,
}

impl ArchiveSession for ZipSession {
    fn add_entry(&mut self, name: &str, bytes: &[u8]) -> Result<(), EncodeError> {
        // PNG data is already deflated
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        self.writer.start_file(name, options)?;
        self.writer.write_all(bytes)?;
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Vec<u8>, EncodeError> {
        let cursor = self.writer.finish()?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn test_entries_round_trip() {
        let mut session = ZipArchiver::new().create().unwrap();
        session.add_entry("slices/slice_1.png", b"one").unwrap();
        session.add_entry("slices/slice_2.png", b"two").unwrap();
        let bytes = session.finalize().unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut contents = String::new();
        archive.by_name("slices/slice_2.png").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "two");
    }

    #[test]
    fn test_duplicate_entry_is_an_error() {
        let mut session = ZipArchiver::new().create().unwrap();
        session.add_entry("a.png", b"x").unwrap();
        assert!(session.add_entry("a.png", b"y").is_err());
    }

    #[test]
    fn test_empty_archive_is_valid() {
        let bytes = ZipArchiver::new().create().unwrap().finalize().unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }
}

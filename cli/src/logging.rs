use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::writer::MakeWriter;

/// Tee of every log line to stderr and, when configured, an append-only file.
#[derive(Clone)]
pub(crate) struct LogWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl LogWriter {
    pub(crate) fn new(path: Option<PathBuf>) -> io::Result<Self> {
        let file = match path {
            Some(path) => Some(Arc::new(Mutex::new(
                OpenOptions::new().create(true).append(true).open(path)?,
            ))),
            None => None,
        };
        Ok(Self { file })
    }
}

pub(crate) struct LogWriterGuard {
    file: Option<Arc<Mutex<File>>>,
}

impl LogWriterGuard {
    fn with_file(&self, op: impl FnOnce(&mut File) -> io::Result<()>) -> io::Result<()> {
        match &self.file {
            Some(file) => {
                let mut handle = file
                    .lock()
                    .map_err(|_| io::Error::other("log file lock poisoned"))?;
                op(&mut handle)
            }
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriterGuard {
            file: self.file.clone(),
        }
    }
}

impl Write for LogWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.with_file(|file| file.write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.with_file(File::flush)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_appended_to_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dbtools.log");
        std::fs::write(&path, "earlier\n").unwrap();

        let writer = LogWriter::new(Some(path.clone())).unwrap();
        let mut guard = writer.make_writer();
        guard.write_all(b"backup started\n").unwrap();
        guard.flush().unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "earlier\nbackup started\n"
        );
    }
}

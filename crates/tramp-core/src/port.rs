use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::rc::Rc;

use crate::error::TrampError;

/// Destination for `display`, `write` and `newline`.
pub trait OutputPort {
    fn display(&self, text: &str) -> Result<(), TrampError>;
    fn newline(&self) -> Result<(), TrampError>;
}

/// Discards all output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPort;

impl OutputPort for NullPort {
    fn display(&self, _text: &str) -> Result<(), TrampError> {
        Ok(())
    }

    fn newline(&self) -> Result<(), TrampError> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutPort;

impl OutputPort for StdoutPort {
    fn display(&self, text: &str) -> Result<(), TrampError> {
        let mut out = io::stdout().lock();
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    fn newline(&self) -> Result<(), TrampError> {
        self.display("\n")
    }
}

/// Collects output in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct BufferPort {
    buffer: Rc<RefCell<String>>,
}

impl BufferPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buffer.borrow().clone()
    }

    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buffer.borrow_mut())
    }
}

impl OutputPort for BufferPort {
    fn display(&self, text: &str) -> Result<(), TrampError> {
        self.buffer.borrow_mut().push_str(text);
        Ok(())
    }

    fn newline(&self) -> Result<(), TrampError> {
        self.buffer.borrow_mut().push('\n');
        Ok(())
    }
}

/// File system access available to scripts.
pub trait FileAccessor {
    fn open_read(&self, path: &str) -> Result<Box<dyn BufRead>, TrampError>;
    fn open_write(&self, path: &str) -> Result<Box<dyn Write>, TrampError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledFiles;

impl FileAccessor for DisabledFiles {
    fn open_read(&self, path: &str) -> Result<Box<dyn BufRead>, TrampError> {
        Err(TrampError::Io(format!(
            "file system access is disabled: cannot read {path}"
        )))
    }

    fn open_write(&self, path: &str) -> Result<Box<dyn Write>, TrampError> {
        Err(TrampError::Io(format!(
            "file system access is disabled: cannot write {path}"
        )))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReadOnlyFiles;

impl FileAccessor for ReadOnlyFiles {
    fn open_read(&self, path: &str) -> Result<Box<dyn BufRead>, TrampError> {
        let file = File::open(Path::new(path))
            .map_err(|e| TrampError::Io(format!("cannot open {path}: {e}")))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn open_write(&self, path: &str) -> Result<Box<dyn Write>, TrampError> {
        Err(TrampError::Io(format!(
            "file system is read-only: cannot write {path}"
        )))
    }
}

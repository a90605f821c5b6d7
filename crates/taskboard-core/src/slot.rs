use std::cell::RefCell;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// A single named location holding the serialized task collection.
pub trait Slot {
    fn name(&self) -> &str;

    /// `Ok(None)` when nothing has been stored yet.
    fn read(&self) -> anyhow::Result<Option<String>>;

    fn write(&mut self, payload: &str) -> anyhow::Result<()>;
}

/// Slot backed by `<data_dir>/<name>.json`.
#[derive(Debug)]
pub struct FileSlot {
    name: String,
    path: PathBuf,
}

impl FileSlot {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path, name: &str) -> anyhow::Result<Self> {
        validate_slot_name(name)?;
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let path = data_dir.join(format!("{name}.json"));
        info!(
            data_dir = %data_dir.display(),
            slot = %name,
            path = %path.display(),
            "opened file slot"
        );

        Ok(Self {
            name: name.to_string(),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Slot for FileSlot {
    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(skip(self), fields(slot = %self.name))]
    fn read(&self) -> anyhow::Result<Option<String>> {
        debug!(file = %self.path.display(), "reading slot");
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("failed reading {}", self.path.display()))
            }
        }
    }

    #[tracing::instrument(skip(self, payload), fields(slot = %self.name, bytes = payload.len()))]
    fn write(&mut self, payload: &str) -> anyhow::Result<()> {
        debug!(file = %self.path.display(), "writing slot atomically");

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        temp.write_all(payload.as_bytes())?;
        temp.flush()?;

        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;

        Ok(())
    }
}

/// In-process slot. Clones share the same contents, so a caller can keep a
/// handle and inspect what the store wrote.
#[derive(Debug, Clone)]
pub struct MemorySlot {
    name: String,
    contents: Rc<RefCell<Option<String>>>,
}

impl MemorySlot {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            contents: Rc::new(RefCell::new(None)),
        }
    }

    pub fn with_contents(name: &str, contents: &str) -> Self {
        let slot = Self::new(name);
        *slot.contents.borrow_mut() = Some(contents.to_string());
        slot
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.borrow().clone()
    }
}

impl Slot for MemorySlot {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> anyhow::Result<Option<String>> {
        Ok(self.contents())
    }

    fn write(&mut self, payload: &str) -> anyhow::Result<()> {
        *self.contents.borrow_mut() = Some(payload.to_string());
        Ok(())
    }
}

fn validate_slot_name(name: &str) -> anyhow::Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("slot name cannot be empty"));
    }
    if trimmed != name || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(anyhow!("invalid slot name: {name:?}"));
    }
    Ok(())
}

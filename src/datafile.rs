//! Path-based [`DataFile`] API, the primary embedding surface.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ocf::datafile::DataFile;
//! use ocf::io_stream::WriterOptions;
//! use ocf::schema::{Kind, Schema};
//! use ocf::value::Value;
//!
//! // Write
//! let schema = Arc::new(Schema::primitive(Kind::Long)?);
//! let mut df = DataFile::create("numbers.ocf", schema, WriterOptions::default())?;
//! df.append(&Value::Int(42))?;
//! df.close()?;
//!
//! // Read
//! let mut df = DataFile::open("numbers.ocf")?;
//! assert_eq!(df.read_all()?, vec![Value::Int(42)]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::header::Header;
use crate::io_stream::{DataFileReader, DataFileWriter, ReaderOptions, WriterOptions};
use crate::schema::Schema;
use crate::value::Value;

enum FileMode {
    Read(DataFileReader<BufReader<File>>),
    Write(DataFileWriter<File>),
}

pub struct DataFile {
    path: PathBuf,
    mode: FileMode,
}

impl DataFile {
    // ── Constructors ─────────────────────────────────────────────────────────

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, None, ReaderOptions::default())
    }

    /// Open for reading through `reader` (or the writer schema when `None`).
    pub fn open_with<P: AsRef<Path>>(path: P, reader: Option<Arc<Schema>>, options: ReaderOptions) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let source = BufReader::new(File::open(&path)?);
        let reader = DataFileReader::with_options(source, reader, options)?;
        Ok(Self { path, mode: FileMode::Read(reader) })
    }

    /// Create (or truncate) `path` and write a fresh header.
    pub fn create<P: AsRef<Path>>(path: P, schema: Arc<Schema>, options: WriterOptions) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let writer = DataFileWriter::new(File::create(&path)?, schema, options)?;
        Ok(Self { path, mode: FileMode::Write(writer) })
    }

    /// Reopen an existing file for appending with its own schema, codec and
    /// sync marker.
    pub fn append_to<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let writer = DataFileWriter::append_to(file, options)?;
        Ok(Self { path, mode: FileMode::Write(writer) })
    }

    // ── Write ────────────────────────────────────────────────────────────────

    pub fn append(&mut self, value: &Value) -> Result<()> {
        self.writer()?.append(value)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer()?.flush()
    }

    /// See [`DataFileWriter::sync`].
    pub fn sync(&mut self) -> Result<u64> {
        self.writer()?.sync()
    }

    /// Flush pending records and release the file.  Reading handles just
    /// drop theirs.
    pub fn close(self) -> Result<()> {
        if let FileMode::Write(w) = self.mode {
            w.close()?.sync_all()?;
        }
        Ok(())
    }

    // ── Read ─────────────────────────────────────────────────────────────────

    pub fn next_record(&mut self) -> Result<Option<Value>> {
        self.reader()?.next().transpose()
    }

    pub fn read_all(&mut self) -> Result<Vec<Value>> {
        self.reader()?.collect()
    }

    /// See [`DataFileReader::sync_to`].
    pub fn sync_to(&mut self, position: u64) -> Result<()> {
        self.reader()?.sync_to(position)
    }

    // ── Metadata ─────────────────────────────────────────────────────────────

    pub fn path(&self) -> &Path { &self.path }

    pub fn header(&self) -> &Header {
        match &self.mode {
            FileMode::Read(r)  => r.header(),
            FileMode::Write(w) => w.header(),
        }
    }

    /// The schema the file was written with.
    pub fn schema(&self) -> &Arc<Schema> {
        match &self.mode {
            FileMode::Read(r)  => r.writer_schema(),
            FileMode::Write(w) => w.schema(),
        }
    }

    pub fn metadata(&self, key: &str) -> Option<&[u8]> { self.header().get(key) }

    pub fn codec_name(&self) -> &str { self.header().codec_name() }

    pub fn sync_hex(&self) -> String { hex::encode(self.header().sync) }

    fn writer(&mut self) -> Result<&mut DataFileWriter<File>> {
        match &mut self.mode {
            FileMode::Write(w) => Ok(w),
            FileMode::Read(_)  => Err(read_only()),
        }
    }

    fn reader(&mut self) -> Result<&mut DataFileReader<BufReader<File>>> {
        match &mut self.mode {
            FileMode::Read(r)  => Ok(r),
            FileMode::Write(_) => Err(write_only()),
        }
    }
}

fn read_only()  -> Error { io::Error::new(io::ErrorKind::PermissionDenied, "data file is open for reading").into() }
fn write_only() -> Error { io::Error::new(io::ErrorKind::PermissionDenied, "data file is open for writing").into() }

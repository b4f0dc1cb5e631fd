pub mod error;
pub mod schema;
pub mod value;
pub mod encoding;
pub mod resolve;
pub mod codec;
pub mod header;
pub mod block;
pub mod io_stream;
pub mod recovery;
pub mod datafile;

pub use error::{Error, Result};
pub use schema::{Kind, Schema, SchemaBuilder, SchemaNode, SchemaRef};
pub use value::Value;
pub use encoding::{from_datum, to_datum, DatumConfig};
pub use resolve::{from_datum_resolved, EnumFallback, PlanCache, ResolutionConfig, ResolutionPlan};
pub use codec::{Codec, CodecRegistry};
pub use header::Header;
pub use io_stream::{DataFileReader, DataFileWriter, ReaderOptions, WriterOptions};
pub use datafile::DataFile;

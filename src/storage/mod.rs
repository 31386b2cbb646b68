mod couchdb;
mod types;

pub use couchdb::{document, CouchDbSink, SINK_TIMEOUT};
pub use types::SinkError;

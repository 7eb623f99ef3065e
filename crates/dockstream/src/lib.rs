//! dockstream - asynchronous streaming client core for the Docker Engine API
//!
//! This crate provides lazily-resolved streamed responses over chunked HTTP
//! bodies, incremental JSON framing, and LIFO teardown of adopted resources.

pub mod client;
pub mod config;
pub mod errors;
pub mod exitstack;
pub mod models;
pub mod streaming;
pub mod transport;

pub use client::{DockerClient, EventsQuery, FormatsVersionedUrls, IssuesStreamedRequests};
pub use config::ClientConfig;
pub use errors::{Error, Result, TeardownFailure};
pub use exitstack::{AsyncExitStack, ScopedResource};
pub use models::{EngineEvent, EventActor, ImageHistoryEntry, VersionInfo};
pub use streaming::{
    ChunkedByteStream, ChunkedTextStream, FramedStream, JsonLineSplitter, JsonSplitter,
    LineSplitter, PendingTransport, Splitter, StreamableResponse, TextDecoder,
};
pub use transport::{ChunkRead, ChunkTransport, HttpChunkTransport};

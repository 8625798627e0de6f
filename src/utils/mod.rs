// Shared helpers: text encodings and I/O plumbing

pub mod encoding;
pub mod io;

//! WAL test suite: record codec, reader, writer and crash recovery

mod entry_tests;
mod recovery_tests;
mod writer_tests;

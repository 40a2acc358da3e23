//! The media ingest / face clustering / guest matching pipeline.
//!
//! Each component owns one concern and talks to the database through
//! `sea-orm` entities in `crate::models`; nothing here is loco-specific so
//! the workers and controllers can stay thin adapters around it.

pub mod clusterer;
pub mod embedding_store;
pub mod face_engine;
pub mod job_payload;
pub mod job_queue;
pub mod matcher;
pub mod remote_client;
pub mod storage;
pub mod worker;

//! # Photo Variants
//!
//! Image ingestion for a therapist directory: profile photos, gallery images
//! and blog covers go in, a normalized JPEG plus a fixed set of responsive
//! variants come out, and a JSON metadata record describes what was written.
//!
//! # Architecture: One Pipeline, Two Entry Points
//!
//! ```text
//! storage key ─► intake ─► fingerprint gate ─► validate ─► render ─► persist ─► metadata
//!                (size,     (sha256 +           (decode,   (JPEG +    (local     (ProcessOutcome)
//!                 read)      version)            orient,    AVIF per   path or
//!                                                 limits)    variant)   remote)
//! ```
//!
//! The same [`pipeline::Pipeline`] is driven by the post-save hook
//! ([`hooks::on_image_saved`]) for single uploads and by the batch backfill
//! ([`backfill::run`]) for whole media roots. Both hand back a
//! [`metadata::ProcessOutcome`] for the caller to store on the entity.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`intake`] | Size limit, raw read, decode and validation rules |
//! | [`fingerprint`] | Content hash and the reprocess decision |
//! | [`render`] | Normalized original and variant encodes |
//! | [`persist`] | Writes outputs next to the source, local or remote |
//! | [`pipeline`] | Ties the stages together |
//! | [`hooks`] | Post-save entry point for single entities |
//! | [`backfill`] | Batch entry point over a media root, with its metadata store |
//! | [`storage`] | `Storage` trait, filesystem and in-memory backends |
//! | [`metadata`] | Stored metadata shape, flags and error records |
//! | [`naming`] | Storage key parsing and output file names |
//! | [`config`] | `photo-variants.toml` loading, merging and validation |
//! | [`imaging`] | Pure-Rust pixel work: decode, resize, sharpen, encode |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Idempotent by Content
//!
//! An image is reprocessed only when its bytes or the pipeline version
//! change. Re-saving an entity, or re-running a backfill, is free for images
//! that are already current. The hash is taken before decoding, so an
//! unchanged image is never decoded twice.
//!
//! ## Errors Are Data
//!
//! Missing, oversized and undecodable files are expected in a media library
//! that users upload to. They come back as error-shaped metadata
//! (`{"error": "file-missing"}`), never as a panic or a failed save.
//! Encoder and storage faults are different: they surface as
//! [`pipeline::PipelineError`] and leave existing metadata untouched.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate (Lanczos3 resampling, JPEG)
//! and `rav1e` (AVIF) through it. No system libraries, so the binary runs
//! anywhere the web app does.

pub mod backfill;
pub mod config;
pub mod fingerprint;
pub mod hooks;
pub mod imaging;
pub mod intake;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod persist;
pub mod pipeline;
pub mod render;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_helpers;

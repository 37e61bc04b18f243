//! Pipeline stages for the text-vs-image benchmark.
//!
//! Each submodule implements one transformation step and is testable on
//! its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ normalize ──▶ paginate ──▶ persist
//! (path/URL)  (whitespace)  (render)     (images, pages.json)
//!                              │
//!                              └──▶ encode ──▶ evaluate
//!                                   (data URI)  (text + image per question)
//! ```
//!
//! 1. [`input`]     — read the document from a local path or download it
//! 2. [`normalize`] — single-pass whitespace replacement
//! 3. [`paginate`]  — wrap lines and cut fixed-size pages; pure
//! 4. [`render`]    — font loading, metrics and rasterisation
//! 5. [`persist`]   — page images, char-count manifest and atomic JSON writes
//! 6. [`encode`]    — in-memory JPEG/PNG wrapped as a base64 data URI
//! 7. [`evaluate`]  — message construction and the two per-question calls;
//!    the only stage with network I/O

pub mod encode;
pub mod evaluate;
pub mod input;
pub mod normalize;
pub mod paginate;
pub mod persist;
pub mod render;

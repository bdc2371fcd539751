//! Pipeline stages from a raw upload to an answer request.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the controller only wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ prepare ──▶ encode ──▶ request
//! (path/URL) (decode+bound) (same type) (multipart POST)
//! ```
//!
//! 1. [`input`]   — read a file or download a URL; resolve the declared media type
//! 2. [`prepare`] — decode, compute the bounded size, resample; runs in
//!    `spawn_blocking` because it is pure CPU work
//! 3. [`encode`]  — re-encode in the source media type; `data:` URI previews
//! 4. [`request`] — the [`request::AskBackend`] seam and its HTTP implementation;
//!    the only stage with network I/O besides URL capture

pub mod encode;
pub mod input;
pub mod prepare;
pub mod request;

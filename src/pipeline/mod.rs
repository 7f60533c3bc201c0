//! Pipeline stages for one conversion request.
//!
//! Each submodule implements exactly one step; the façade in
//! [`crate::convert`] chains them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ worker ──▶ materialize ──▶ response
//! (path/URL/  (child     (archive, upload
//!  base64)    process)    or inline)
//! ```
//!
//! 1. [`input`]  — resolve a path, URL or inline payload to a local file
//! 2. [`worker`] — run the conversion worker under a deadline and parse its result
//! 3. [`materialize`] — decide how the outputs reach the caller
//!
//! Support modules: [`archive`] (zip building), [`encode`] (base64 both ways),
//! [`cleanup`] (scratch-file ownership).

pub mod archive;
pub mod cleanup;
pub mod encode;
pub mod input;
pub mod materialize;
pub mod worker;

//! Pipeline stages for Word ⇄ Markdown conversion.
//!
//! Each submodule implements exactly one step.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ invoke ──▶ inline
//!            (pandoc,   (media/ → data: URIs)
//!             soffice)
//! ```
//!
//! 1. [`invoke`] runs an external converter under a timeout and turns its
//!    exit status and stderr into a typed error
//! 2. [`inline`] walks the extracted media tree and rewrites every Markdown
//!    reference to it as a base64 `data:` URI

pub mod inline;
pub mod invoke;

//! Pipeline stages of the fetch step.
//!
//! Each submodule implements one stage and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! feed ──▶ gist ─────────────────────────▶ digest
//!           ├─ llm / agent  (summarizer)
//!           ├─ llm          (formatter)
//!           ├─ postprocess  (cleanup)
//!           └─ links        (reference checks)
//!      ──▶ input ──▶ figure ─────────────▶ digest
//!          (download) (pdfium)
//! ```
//!
//! 1. [`feed`]   query the arXiv API and select one day of papers
//! 2. [`gist`]   drive summarizer and formatter with schema retries
//! 3. [`agent`]  tool loop for the agent summarizer
//! 4. [`llm`]    the [`llm::ChatModel`] seam over edgequake-llm providers
//! 5. [`postprocess`] deterministic cleanup of model output and HTML
//! 6. [`links`]  reference-link validation
//! 7. [`input`]  PDF download to a temp dir
//! 8. [`figure`] first-figure extraction; runs in `spawn_blocking` because
//!    pdfium is not async-safe

pub mod agent;
pub mod feed;
pub mod figure;
pub mod gist;
pub mod input;
pub mod links;
pub mod llm;
pub mod postprocess;

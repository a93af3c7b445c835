//! qtiscore-report — Renderers for scored results.
//!
//! Scored [`AssessmentResult`](qtiscore_core::results::AssessmentResult)s are
//! the single source of truth; this crate renders them on demand as QTI 2.2
//! `assessmentResult` XML and as a self-contained HTML score sheet.

pub mod html;
pub mod xml;

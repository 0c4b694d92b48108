// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that define what the system talks about:
// student rows, outcomes, the request/response contract and
// the error taxonomy. No file I/O and no model code here.

// A merged student row and the binary outcome
pub mod record;

// Typed pipeline errors
pub mod error;

// Inference request validation and response shapes
pub mod request;

// Core abstractions (traits) that other layers implement
pub mod traits;

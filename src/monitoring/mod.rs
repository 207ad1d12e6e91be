/*!
 * Monitoring Module
 * Structured tracing for supervision
 */

pub mod tracer;

pub use tracer::{generate_trace_id, init_tracing, supervisor_span};

//! Conversation core for the Edo desktop companion: turn orchestration, bounded
//! persistent memory, and the model adapter it talks to.

pub mod config;
pub mod display;
pub mod learning;
pub mod llm;
mod lock;
mod logging;
pub mod memory;
pub mod safety;
pub mod session;
pub mod summarizer;
mod telemetry;
pub mod text;

pub use logging::{init_logging, log_debug, log_debug_content, log_file_path};
pub use session::{run_control_loop, ControlInput, Session, SubmitStatus};
pub use telemetry::init_tracing;

pub mod activity;
pub mod macros;
pub mod outbox;
pub mod payment;
pub mod period;
pub mod report;
pub mod session;
pub mod teacher;

// Re-export all models for easy importing
pub use activity::*;
pub use outbox::*;
pub use payment::*;
pub use period::*;
pub use report::*;
pub use session::*;
pub use teacher::*;

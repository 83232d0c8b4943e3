pub mod activity_logger;
pub mod auth;
pub mod cache;
pub mod events;
pub mod notifier;
pub mod payments;
pub mod payroll;
pub mod teachers;

pub use activity_logger::{ActivityLogger, AuditContext};
pub use auth::{Claims, StaffRole};
pub use cache::PaymentListCache;
pub use events::{EventBus, MutationSubscriber, PaymentEvent};
pub use notifier::{Notifier, SmsGateway};
pub use payments::PaymentService;
pub use teachers::TeacherService;

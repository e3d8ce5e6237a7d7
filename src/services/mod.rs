pub mod billing;
pub mod customer;
pub mod lifecycle;
pub mod notifier;
pub mod registration;
pub mod replacement;
pub mod sequence;

pub use billing::{BillingManifest, BillingService, DashboardStats, ImportSummary};
pub use customer::{CustomerPortal, CustomerSession, CustomerView};
pub use lifecycle::TagLifecycle;
pub use notifier::{NotificationDispatcher, Notifier, TracingNotifier};
pub use registration::{RegistrationRequest, RegistrationService, ScanView};
pub use replacement::{ReplacementReceipt, ReplacementService};
pub use sequence::SequenceAllocator;

mod error;
mod traits;
mod types;

pub use error::{RepositoryError, Result, TimeWindowError};
pub use traits::{
    OrderRepository, ScheduleRepository, SessionRepository, TokenRepository,
    TransactionRepository, WebhookRepository,
};
pub use types::{FieldPatch, TimeWindow, WindowFilter};

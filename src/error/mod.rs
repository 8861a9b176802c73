mod app_error;
mod compose_error;
mod http_error;

pub use app_error::{AppError, AppResult};
pub use compose_error::ComposeError;
pub use http_error::{ErrorPayload, GENERIC_SERVER_MESSAGE, HttpError};

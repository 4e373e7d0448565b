pub mod digest;
pub mod mailer;

pub use digest::DeliveryService;
pub use mailer::{Mailer, SmtpMailer};

pub mod prelude {
    pub use super::{DeliveryService, Mailer, SmtpMailer};
    pub use wd_core::{Error, Result};
}

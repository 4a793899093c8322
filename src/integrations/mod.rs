//! External service integrations.

pub mod salesforce_client {
    pub use crate::salesforce_client::*;
}

pub mod landbot_models {
    pub use crate::landbot_models::*;
}

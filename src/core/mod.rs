// Domain-layer modules and shared errors/models
pub mod scenario {
    pub use crate::scenario::*;
}

pub mod composite {
    pub use crate::composite::*;
}

pub mod services {
    pub use crate::services::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}

//! Provider-independent core logic.

pub mod creds;
pub mod envfile;
pub mod reconcile;
pub mod validation;

//! AWS SDK client initialisation.

pub mod clients;

pub use clients::AwsClients;

//! The typed interface every tool exposes to an outer dispatch layer.

use async_trait::async_trait;
use serde::Serialize;

/// A named operation with a typed input and output.
///
/// The dispatcher picks a capability by `name` and `description`; the
/// capability never sees how that choice was made.
#[async_trait]
pub trait Capability: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn name(&self) -> &str;

    /// Natural-language summary shown to whatever selects capabilities.
    fn description(&self) -> &str;

    async fn invoke(&self, input: Self::Input) -> Self::Output;

    fn info(&self) -> CapabilityInfo {
        CapabilityInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
        }
    }
}

/// Name and description of a capability, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityInfo {
    pub name: String,
    pub description: String,
}

pub use crate::client::{Forwarder, ForwarderBuilder, ReqwestForwarder};
pub use crate::config::{CapabilitiesConfig, CapabilityConfig};
pub use crate::endpoint::CapabilityEndpoint;
pub use crate::errors::ProxyError;
pub use crate::policy::PoolPolicy;
pub use crate::registry::{CapabilityRegistry, RegisteredCapability};
pub use crate::types::{Body, ForwardRequest, ForwardResponse};

//! Domain entities and routing rules

pub mod audio;
pub mod collection;
pub mod config;
pub mod criteria;
pub mod port;
pub mod route;
pub mod stream;
pub mod testing;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{
    AudioDevice, DeviceError, Direction, PcmConfig, SampleFormat, SampleSpec,
};
pub use collection::{RouteCollection, RouteMasks, MAX_ROUTES_PER_DIRECTION};
pub use config::{ConfigError, PlatformConfig};
pub use criteria::{
    CriteriaSet, CriteriaSink, Criterion, CriterionType, SinkError, ROUTING_STAGE_CRITERION,
};
pub use port::{Port, PortGroup, PortGroupId, PortId};
pub use route::{CapabilityProfile, Route, RouteId, RouteKind, StreamRoute, StreamRouteConfig};
pub use stream::{same_stream, Stream};

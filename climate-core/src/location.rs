//! Sources of the device position.

use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use tokio::{sync::Mutex, time::Instant};

use crate::{error::LocationError, model::Coordinate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationOptions {
    /// Oldest cached fix that may be reused.
    pub max_age: Duration,
    /// Give up waiting after this long.
    pub timeout: Duration,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(60),
            timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
pub trait LocationSource: Send + Sync + Debug {
    async fn locate(&self, options: &LocationOptions) -> Result<Coordinate, LocationError>;
}

/// A position supplied up front (config file or command line). With no
/// position the source reports geolocation as unsupported.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedLocation(pub Option<Coordinate>);

#[async_trait]
impl LocationSource for FixedLocation {
    async fn locate(&self, _: &LocationOptions) -> Result<Coordinate, LocationError> {
        self.0.ok_or(LocationError::Unsupported)
    }
}

/// The user declined to share a position.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeniedLocation;

#[async_trait]
impl LocationSource for DeniedLocation {
    async fn locate(&self, _: &LocationOptions) -> Result<Coordinate, LocationError> {
        Err(LocationError::PermissionDenied)
    }
}

/// Reuses the last successful fix while it is younger than `max_age`.
#[derive(Debug)]
pub struct CachedLocation<L> {
    inner: L,
    last: Mutex<Option<(Coordinate, Instant)>>,
}

impl<L: LocationSource> CachedLocation<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            last: Mutex::new(None),
        }
    }
}

#[async_trait]
impl<L: LocationSource> LocationSource for CachedLocation<L> {
    async fn locate(&self, options: &LocationOptions) -> Result<Coordinate, LocationError> {
        let mut last = self.last.lock().await;

        if let Some((coord, at)) = *last {
            if at.elapsed() <= options.max_age {
                tracing::debug!(age = ?at.elapsed(), "reusing cached location");
                return Ok(coord);
            }
        }

        let coord = self.inner.locate(options).await?;
        *last = Some((coord, Instant::now()));
        Ok(coord)
    }
}

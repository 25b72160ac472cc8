//! Multi-channel memory controller.
//!
//! This module builds and runs the controller that sits between the last-level cache and the
//! DRAM devices. It performs:
//! 1. **Construction:** Reads which pools exist, builds their devices through the factory and
//!    picks the routing strategy.
//! 2. **Coherence:** Grants the coherence state of every request and short-circuits clean
//!    evictions.
//! 3. **Bookkeeping:** Counts misses, compulsory misses and touched pages.
//! 4. **Dispatch:** Under one lock, selects a pool, interleaves the line onto a device and
//!    collects the completion cycle.
//! 5. **Stats:** Reports its own counters and every device's counters.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{info, trace, warn};

use super::bookkeeper::AccessBookkeeper;
use super::coherence;
use super::factory::{build_device, pool_kind};
use super::pool::BackendPool;
use super::routing::{PoolId, PoolSelector, build_selector};
use crate::common::{ConfigError, ControllerError, LineAddr, lines_per_page};
use crate::config::{self, ConfigLookup, Routing, defaults, keys};
use crate::dram::DeviceContext;
use crate::request::MemRequest;
use crate::stats::{FootprintReport, StatsSink, StatsTree};

/// Controller-level inputs that do not come from the configuration tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerParams {
    /// Unique controller name.
    pub name: String,
    /// System clock frequency in MHz.
    pub frequency_mhz: u32,
    /// Clock domain.
    pub domain: u32,
}

impl ControllerParams {
    /// Creates parameters for a controller in domain 0.
    pub fn new(name: impl Into<String>, frequency_mhz: u32) -> Self {
        Self {
            name: name.into(),
            frequency_mhz,
            domain: 0,
        }
    }
}

/// Where a line would be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Serving pool.
    pub pool: PoolId,
    /// Device index within the pool.
    pub device: usize,
    /// Device-local line address.
    pub local: LineAddr,
}

/// Configured pools. At least one always exists.
#[derive(Debug)]
enum Backends {
    External(BackendPool),
    InPackage(BackendPool),
    Both {
        external: BackendPool,
        in_package: BackendPool,
    },
}

impl Backends {
    fn new(external: Option<BackendPool>, in_package: Option<BackendPool>) -> Option<Self> {
        match (external, in_package) {
            (Some(external), Some(in_package)) => Some(Self::Both {
                external,
                in_package,
            }),
            (Some(external), None) => Some(Self::External(external)),
            (None, Some(in_package)) => Some(Self::InPackage(in_package)),
            (None, None) => None,
        }
    }

    const fn external(&self) -> Option<&BackendPool> {
        match self {
            Self::External(pool) | Self::Both { external: pool, .. } => Some(pool),
            Self::InPackage(_) => None,
        }
    }

    const fn in_package(&self) -> Option<&BackendPool> {
        match self {
            Self::InPackage(pool) | Self::Both { in_package: pool, .. } => Some(pool),
            Self::External(_) => None,
        }
    }

    /// Resolves a selection to a configured pool, falling back to the only pool when the
    /// requested one is absent.
    fn get_mut(&mut self, id: PoolId) -> (PoolId, &mut BackendPool) {
        match (self, id) {
            (Self::External(pool), _) => (PoolId::External, pool),
            (Self::InPackage(pool), _) => (PoolId::InPackage, pool),
            (Self::Both { external, .. }, PoolId::External) => (PoolId::External, external),
            (Self::Both { in_package, .. }, PoolId::InPackage) => (PoolId::InPackage, in_package),
        }
    }

    fn pools(&self) -> impl Iterator<Item = &BackendPool> + '_ {
        self.external().into_iter().chain(self.in_package())
    }
}

/// Memory controller owning up to two backend pools.
///
/// `access` may be called from many requester threads at once. Clean evictions never lock;
/// all other requests are serialized through a single dispatch lock, so the devices observe a
/// strict submission order. Bookkeeping runs before that lock under its own mutex.
#[derive(Debug)]
pub struct MemoryController {
    name: String,
    line_size: u32,
    selector: Box<dyn PoolSelector>,
    bookkeeper: AccessBookkeeper,
    backends: Mutex<Backends>,
    external_devices: usize,
    in_package_devices: usize,
}

impl MemoryController {
    /// Builds a controller from configuration.
    ///
    /// Reads `sys.mem.ext_dram` and `sys.mem.mc_dram`; at least one must be present. The
    /// in-package section also gives the device count (`mc_drams_per_ctrl`); the interleaving
    /// granularity comes from `sys.mem.mapGranu`.
    ///
    /// # Arguments
    ///
    /// * `params` - Name, frequency and clock domain.
    /// * `cfg` - Configuration source.
    ///
    /// # Errors
    ///
    /// `ControllerError::Config` for an unsupported backend kind, no pool configured, or any
    /// invalid option.
    pub fn new(params: ControllerParams, cfg: &dyn ConfigLookup) -> Result<Self, ControllerError> {
        let name = params.name.clone();
        Self::build(params, cfg).map_err(|source| ControllerError::config(&name, source))
    }

    fn build(params: ControllerParams, cfg: &dyn ConfigLookup) -> Result<Self, ConfigError> {
        let line_size = config::line_size(cfg)?;
        let ctx = DeviceContext {
            line_size,
            frequency_mhz: params.frequency_mhz,
            domain: params.domain,
        };
        let name = params.name;

        let external = if cfg.exists(keys::EXT_DRAM) {
            let prefix = format!("{}.", keys::EXT_DRAM);
            let kind = pool_kind(cfg, &prefix)?;
            let device = build_device(cfg, kind, &prefix, format!("{name}-ext"), &ctx)?;
            Some(BackendPool::single(kind, device))
        } else {
            None
        };

        let in_package = if cfg.exists(keys::MC_DRAM) {
            let prefix = format!("{}.", keys::MC_DRAM);
            let kind = pool_kind(cfg, &prefix)?;
            let count = cfg.get_u32(
                &format!("{prefix}{}", keys::MC_DRAMS_PER_CTRL),
                defaults::MC_DRAMS_PER_CTRL,
            )?;
            if count == 0 {
                warn!(controller = %name, "in-package section has no devices; ignoring it");
                None
            } else {
                let granularity =
                    cfg.get_u32(keys::MAP_GRANULARITY, defaults::MAP_GRANULARITY)?;
                let devices = (0..count)
                    .map(|i| build_device(cfg, kind, &prefix, format!("{name}-mc-{i}"), &ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                Some(BackendPool::interleaved(kind, devices, u64::from(granularity))?)
            }
        } else {
            None
        };

        let routing: Routing = cfg.get_str(keys::ROUTING, defaults::ROUTING)?.parse()?;
        Self::assemble(name, line_size, external, in_package, routing)
    }

    /// Builds a controller around already constructed pools.
    ///
    /// # Arguments
    ///
    /// * `name` - Controller name.
    /// * `line_size` - Cache line size in bytes.
    /// * `external` - External pool, if any.
    /// * `in_package` - In-package pool, if any.
    /// * `routing` - Pool selection strategy.
    ///
    /// # Errors
    ///
    /// `ControllerError::Config` if both pools are absent, the line size is invalid, or the
    /// routing strategy needs a missing pool.
    pub fn with_pools(
        name: impl Into<String>,
        line_size: u32,
        external: Option<BackendPool>,
        in_package: Option<BackendPool>,
        routing: Routing,
    ) -> Result<Self, ControllerError> {
        let name = name.into();
        config::check_line_size(line_size)
            .and_then(|line_size| {
                Self::assemble(name.clone(), line_size, external, in_package, routing)
            })
            .map_err(|source| ControllerError::config(&name, source))
    }

    fn assemble(
        name: String,
        line_size: u32,
        external: Option<BackendPool>,
        in_package: Option<BackendPool>,
        routing: Routing,
    ) -> Result<Self, ConfigError> {
        let external_devices = external.as_ref().map_or(0, BackendPool::len);
        let in_package_devices = in_package.as_ref().map_or(0, BackendPool::len);
        let granularity = in_package.as_ref().map(|p| p.interleaver().granularity());

        let (has_external, has_in_package) = (external.is_some(), in_package.is_some());
        let backends = Backends::new(external, in_package).ok_or(ConfigError::NoMemory)?;
        let selector = build_selector(routing, has_external, has_in_package)?;

        info!(
            controller = %name,
            granularity = ?granularity,
            routing = %routing,
            "[{name}] Created {external_devices} external DRAM and {in_package_devices} MCDRAM modules"
        );

        Ok(Self {
            bookkeeper: AccessBookkeeper::new(lines_per_page(line_size)),
            name,
            line_size,
            selector,
            backends: Mutex::new(backends),
            external_devices,
            in_package_devices,
        })
    }

    /// Services one request from the last-level cache.
    ///
    /// Writes the granted coherence state into `req.state`. Clean evictions return at once
    /// with the issue cycle; everything else is counted, routed to one device, and its
    /// completion cycle is stored in `req.cycle`.
    ///
    /// # Returns
    ///
    /// The completion cycle.
    pub fn access(&self, req: &mut MemRequest) -> u64 {
        if coherence::apply(req) {
            return req.cycle;
        }

        let _ = self.bookkeeper.record(req.line_addr);

        let mut backends = self.lock_backends();
        let (pool_id, pool) = backends.get_mut(self.selector.select(req.line_addr));
        let (device, local, done) = pool.dispatch(req);
        drop(backends);

        trace!(
            controller = %self.name,
            kind = %req.kind,
            line = %req.line_addr,
            pool = %pool_id,
            device,
            local = %local,
            issue = req.cycle,
            done,
            "dispatched"
        );
        req.cycle = done;
        done
    }

    /// Reports where `line` would be served, without touching devices or counters.
    pub fn route(&self, line: LineAddr) -> Route {
        let mut backends = self.lock_backends();
        let (pool, p) = backends.get_mut(self.selector.select(line));
        let (device, local) = p.route(line);
        Route {
            pool,
            device,
            local,
        }
    }

    /// Decodes a raw request on behalf of a requester.
    ///
    /// # Errors
    ///
    /// `ControllerError::Protocol` for an unrecognized request type.
    pub fn decode(
        &self,
        code: u8,
        line: u64,
        flags: u32,
        cycle: u64,
    ) -> Result<MemRequest, ControllerError> {
        MemRequest::from_raw(code, line, flags, cycle)
            .map_err(|source| ControllerError::protocol(&self.name, source))
    }

    /// Reports controller and device counters.
    ///
    /// Layout: `memctrl/<name>/{totalPages, llcCompulsoryMisses, llcTotalMisses}` followed by
    /// `DRAM/<device>/...` for every device, external first.
    pub fn report_stats(&self, parent: &mut dyn StatsSink) {
        parent.enter("memctrl", "Memory controller stats");
        parent.enter(&self.name, "Memory controller stats");
        self.bookkeeper.report_stats(parent);
        parent.leave();
        parent.leave();

        parent.enter("DRAM", "DRAM modules stats");
        let backends = self.lock_backends();
        for device in backends.pools().flat_map(|pool| pool.devices()) {
            device.report_stats(parent);
        }
        drop(backends);
        parent.leave();
    }

    /// Collects all counters into a fresh tree.
    pub fn stats(&self) -> StatsTree {
        let mut tree = StatsTree::new("root");
        self.report_stats(&mut tree);
        tree
    }

    /// Controller name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cache line size in bytes.
    pub const fn line_size(&self) -> u32 {
        self.line_size
    }

    /// Active routing policy.
    pub fn routing(&self) -> Routing {
        self.selector.policy()
    }

    /// Number of external devices (0 or 1).
    pub const fn external_devices(&self) -> usize {
        self.external_devices
    }

    /// Number of in-package devices.
    pub const fn in_package_devices(&self) -> usize {
        self.in_package_devices
    }

    /// Miss and footprint bookkeeping.
    pub const fn bookkeeper(&self) -> &AccessBookkeeper {
        &self.bookkeeper
    }

    /// Snapshot of the bookkeeping counters.
    pub fn footprint(&self) -> FootprintReport {
        self.bookkeeper.footprint()
    }

    fn lock_backends(&self) -> MutexGuard<'_, Backends> {
        self.backends.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

use mcsim_core::ConfigTree;
use mcsim_core::dram::DeviceContext;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

/// Installs a test-friendly log subscriber once per process. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Device context used by most DDR tests: 64-byte lines at 2 GHz, so one DDR3-1333 memory
/// cycle is exactly three system cycles.
pub const fn ctx() -> DeviceContext {
    DeviceContext {
        line_size: 64,
        frequency_mhz: 2000,
        domain: 0,
    }
}

/// Fluent builder for configuration trees.
pub struct ConfigBuilder {
    root: Value,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            root: json!({ "sys": { "lineSize": 64, "mem": {} } }),
        }
    }

    /// Sets `key` (a dotted path) to `value`, creating intermediate sections.
    pub fn set(mut self, key: &str, value: Value) -> Self {
        let parts: Vec<&str> = key.split('.').collect();
        let (last, parents) = parts.split_last().expect("non-empty key");
        let mut node = &mut self.root;
        for part in parents {
            node = node
                .as_object_mut()
                .expect("section")
                .entry((*part).to_owned())
                .or_insert_with(|| json!({}));
        }
        let _ = node
            .as_object_mut()
            .expect("section")
            .insert((*last).to_owned(), value);
        self
    }

    pub fn line_size(self, bytes: u32) -> Self {
        self.set("sys.lineSize", json!(bytes))
    }

    /// Enables the external pool with default DDR options.
    pub fn external(self) -> Self {
        self.set("sys.mem.ext_dram.type", json!("DDR"))
    }

    /// Enables the in-package pool with `count` default DDR devices.
    pub fn in_package(self, count: u32) -> Self {
        self.set("sys.mem.mc_dram.type", json!("DDR"))
            .set("sys.mem.mc_dram.mc_drams_per_ctrl", json!(count))
    }

    pub fn granularity(self, lines: u32) -> Self {
        self.set("sys.mem.mapGranu", json!(lines))
    }

    pub fn routing(self, policy: &str) -> Self {
        self.set("sys.mem.routing", json!(policy))
    }

    pub fn build(self) -> ConfigTree {
        ConfigTree::new(self.root)
    }
}

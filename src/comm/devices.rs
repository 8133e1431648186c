use crate::comm::topology::ProcessTopology;

/// How many ranks per host drive an accelerator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankShare {
    /// Every rank on a host gets a device.
    #[default]
    All,
    /// Only the first `n` ranks on each host get a device.
    Count(u32),
}

/// Accelerator assignment policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DevicePolicy {
    /// Which ranks on a host use a device.
    pub ranks_per_host_using_device: RankShare,
    /// Devices to spread ranks over; `None` uses every available device.
    pub active_devices: Option<u32>,
}

/// Outcome of [`DeviceAssignment::plan`] for one rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceAssignment {
    /// Render and composite on the CPU.
    Cpu,
    /// Use accelerator `device` of this host.
    Device {
        /// Host-local device index.
        device: u32,
    },
}

impl DeviceAssignment {
    /// Pick a device for the rank described by `topology`.
    ///
    /// Devices are dealt round-robin by host rank over `min(requested, available)` active
    /// devices. A rank falls back to the CPU when there is no active device or when the
    /// policy limits device use to lower host ranks.
    pub fn plan(
        topology: &ProcessTopology,
        policy: &DevicePolicy,
        available_devices: u32,
    ) -> DeviceAssignment {
        let active = policy
            .active_devices
            .map_or(available_devices, |n| n.min(available_devices));
        let eligible = match policy.ranks_per_host_using_device {
            RankShare::All => true,
            RankShare::Count(n) => (topology.host_rank as u64) < u64::from(n),
        };
        let assignment = if active > 0 && eligible {
            DeviceAssignment::Device {
                device: (topology.host_rank as u64 % u64::from(active)) as u32,
            }
        } else {
            DeviceAssignment::Cpu
        };
        tracing::debug!(
            rank = topology.world_rank,
            host_rank = topology.host_rank,
            active,
            ?assignment,
            "device assignment"
        );
        assignment
    }

    /// `true` when the rank drives an accelerator.
    pub fn uses_device(&self) -> bool {
        matches!(self, DeviceAssignment::Device { .. })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/comm/devices.rs"]
mod tests;

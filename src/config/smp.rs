//! CPU topology resolution.

use serde::{Deserialize, Serialize};

/// Optional vCPU count and topology terms.
///
/// The effective number of vCPUs exposed to the guest is
/// `sockets * cores * threads`; any term may be left at zero to mean
/// unspecified.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SmpConfig {
    /// Requested vCPU count. Zero means derive from the topology.
    pub cpus: u32,
    pub sockets: u32,
    pub cores: u32,
    pub threads: u32,
}

impl SmpConfig {
    /// Maximum vCPU count compatible with the optional topology.
    ///
    /// Zero when nothing is specified, otherwise the product of all
    /// non-zero terms.
    pub fn max_cpus(&self) -> u32 {
        let mut total = self.sockets;

        if self.cores > 0 && total > 0 {
            total *= self.cores;
        }
        // Sockets not provided, fall back to cores alone.
        if total == 0 {
            total = self.cores;
        }

        if self.threads > 0 && total != 0 {
            total *= self.threads;
        }
        // Nothing else provided, fall back to threads alone.
        if total == 0 {
            total = self.threads;
        }

        total
    }

    /// Effective vCPU count after reconciling the requested count with the
    /// topology. A mismatch in either direction warns but never errors: the
    /// user's topology is respected, and an oversized request is clamped to
    /// what the topology allows.
    pub fn resolved_cpu_count(&self) -> u32 {
        let max = self.max_cpus();
        if max == 0 && self.cpus == 0 {
            return 1;
        }

        let mut count = self.cpus;
        if count == 0 {
            tracing::debug!(total = max, "cpu count unset, using topology maximum");
            count = max;
        }

        if max > count {
            tracing::warn!(
                requested = count,
                topology_max = max,
                "cpu count is lower than the configured topology, performance may degrade"
            );
        }

        if count > max && max != 0 {
            tracing::warn!(
                requested = count,
                topology_max = max,
                "cpu count exceeds what the topology allows, clamping to topology maximum"
            );
            count = max;
        }

        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smp(cpus: u32, sockets: u32, cores: u32, threads: u32) -> SmpConfig {
        SmpConfig {
            cpus,
            sockets,
            cores,
            threads,
        }
    }

    #[test]
    fn fully_unspecified_resolves_to_one() {
        assert_eq!(smp(0, 0, 0, 0).resolved_cpu_count(), 1);
    }

    #[test]
    fn topology_silent_uses_requested_count() {
        assert_eq!(smp(4, 0, 0, 0).resolved_cpu_count(), 4);
        assert_eq!(smp(1, 0, 0, 0).resolved_cpu_count(), 1);
    }

    #[test]
    fn topology_product_ignores_zero_terms() {
        assert_eq!(smp(0, 2, 4, 0).max_cpus(), 8);
        assert_eq!(smp(0, 0, 4, 2).max_cpus(), 8);
        assert_eq!(smp(0, 0, 0, 2).max_cpus(), 2);
        assert_eq!(smp(0, 2, 0, 0).max_cpus(), 2);
        assert_eq!(smp(0, 2, 3, 2).max_cpus(), 12);
    }

    #[test]
    fn unset_count_takes_topology_maximum() {
        assert_eq!(smp(0, 2, 2, 2).resolved_cpu_count(), 8);
    }

    #[test]
    fn oversized_request_is_clamped_to_topology() {
        assert_eq!(smp(16, 2, 2, 1).resolved_cpu_count(), 4);
    }

    #[test]
    fn undersized_request_is_kept_with_a_warning() {
        assert_eq!(smp(2, 2, 4, 1).resolved_cpu_count(), 2);
    }
}

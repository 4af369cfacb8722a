// ============================================================
// Layer 6 — Device Resolver
// ============================================================
// Decides whether training runs on the GPU-class accelerator
// backend (wgpu) or on the host CPU backend (ndarray).
//
// Two inputs drive the decision:
//   1. availability — does the machine expose a GPU-class
//      wgpu adapter at all?
//   2. the --no-gpu opt-out flag
//
// Policy table (availability x opt-out):
//   | available | --no-gpu | outcome                         |
//   |-----------|----------|---------------------------------|
//   | yes       | yes      | warn, host CPU (explicit wish)  |
//   | yes       | no       | accelerator                     |
//   | no        | yes      | host CPU, no warning            |
//   | no        | no       | warn, fall back to host CPU     |
//
// There is deliberately NO process-global device state: the
// resolver returns a value, the caller picks the matching
// backend type and passes its device handle to every tensor
// creation site. Seeding the chosen backend's generator is
// also the caller's job, right after the backend is picked.
//
// Reference: wgpu crate documentation (adapter enumeration)

/// Which tensor backend the run will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeBackend {
    /// wgpu-backed GPU execution
    Accelerator,
    /// ndarray-backed CPU execution
    HostCpu,
}

/// The resolved device decision plus the warning the policy
/// table attaches to it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePlan {
    pub backend: ComputeBackend,
    pub warning: Option<&'static str>,
}

impl DevicePlan {
    /// The pure policy table — no probing, no logging.
    pub fn decide(accelerator_available: bool, opt_out: bool) -> Self {
        match (accelerator_available, opt_out) {
            (true, true) => Self {
                backend: ComputeBackend::HostCpu,
                warning: Some("you have a GPU adapter, so you should probably not run with --no-gpu"),
            },
            (true, false) => Self {
                backend: ComputeBackend::Accelerator,
                warning: None,
            },
            (false, true) => Self {
                backend: ComputeBackend::HostCpu,
                warning: None,
            },
            (false, false) => Self {
                backend: ComputeBackend::HostCpu,
                warning: Some("no GPU adapter found, so you should probably run with --no-gpu"),
            },
        }
    }
}

/// Look for a GPU-class wgpu adapter and return its name.
/// Software rasterisers and other CPU adapters do not count —
/// falling "back" onto them would silently give CPU speed
/// while claiming accelerator execution.
pub fn probe_accelerator() -> Option<String> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());

    instance
        .enumerate_adapters(wgpu::Backends::all())
        .into_iter()
        .map(|adapter| adapter.get_info())
        .find(|info| {
            matches!(
                info.device_type,
                wgpu::DeviceType::DiscreteGpu
                    | wgpu::DeviceType::IntegratedGpu
                    | wgpu::DeviceType::VirtualGpu
            )
        })
        .map(|info| info.name)
}

/// Probe the machine, apply the policy table, surface the
/// warning. This is the entry point the use cases call.
pub fn resolve(opt_out: bool) -> DevicePlan {
    let adapter = probe_accelerator();
    let plan    = DevicePlan::decide(adapter.is_some(), opt_out);

    if let Some(warning) = plan.warning {
        tracing::warn!("{warning}");
    }
    match plan.backend {
        ComputeBackend::Accelerator => {
            // the table only picks the accelerator when the probe found one
            if let Some(name) = &adapter {
                tracing::info!("Running on {name}");
            }
        }
        ComputeBackend::HostCpu => {
            tracing::info!("Running on the host CPU backend");
        }
    }

    plan
}

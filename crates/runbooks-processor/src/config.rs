/// Size cap (spec §4.C4: "reject payloads over the configured cap (default
/// 10 MiB) with `PAYLOAD_TOO_LARGE`").
pub const DEFAULT_SIZE_CAP_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub size_cap_bytes: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            size_cap_bytes: DEFAULT_SIZE_CAP_BYTES,
        }
    }
}

/// Platform specific constants that the phase needs but cannot learn from the device tree
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PlatformConfig {
    /// `compatible` identifier of PCIe host bridges
    pub pcie_host_compatible: &'static str,
    /// `compatible` identifier of SD/MMC storage controllers
    pub storage_compatible: &'static str,
    /// Start of the address range that is reserved for 32-bit inbound PCIe accesses
    pub pcie_inbound_base: u64,
    pub pcie_inbound_size: u64,
    /// Location of the firmware volume that holds the DXE phase
    pub dxe_fv_base: u32,
    pub dxe_fv_size: u32,
}

impl PlatformConfig {
    /// The Sophgo SG2042
    pub const SG2042: Self = Self {
        pcie_host_compatible: "sophgo,cdns-pcie-host",
        storage_compatible: "bitmain,bm-sd",
        // 3GiB - 4GiB
        pcie_inbound_base: 0xC000_0000,
        pcie_inbound_size: 0x4000_0000,
        dxe_fv_base: 0x8040_0000,
        dxe_fv_size: 0x00E0_0000,
    };
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self::SG2042
    }
}

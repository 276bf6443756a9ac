use crate::config::PlatformConfig;
use crate::error::PhaseError;
use crate::relocate::{relocate, RelocatedTree};
use crate::resource::MmioWindow;
use crate::scan::{scan, ScanReport};
use allocators::PageAllocator;
use device_tree::fdt::FlattenedDeviceTree;
use hob::HobList;

/// The steps of the platform initialization phase.
///
/// Steps are taken strictly in order.
/// `Failed` is reached from whichever step failed and is never left again.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PhaseState {
    NotStarted,
    Relocating,
    AnnouncingFirmwareVolume,
    ScanningDevices,
    Done,
    Failed,
}

/// What a successful run of the phase produced
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PhaseReport<'mem> {
    pub relocated: RelocatedTree<'mem>,
    pub pcie_hosts: ScanReport,
    pub storage: ScanReport,
}

/// The platform initialization phase.
///
/// It relocates the device tree it is given into pages from `allocator` and fills `hobs` with the following records,
/// in this order:
///
/// 1. a GUID extension HOB which holds the address of the relocated device tree
/// 2. the firmware volume of the DXE phase
/// 3. MMIO resources of all PCIe host bridges
/// 4. the MMIO resource reserved for inbound 32-bit PCIe accesses
/// 5. MMIO resources of all SD controllers
pub struct PlatformPhase<'p, 'h, A> {
    config: PlatformConfig,
    allocator: &'p A,
    hobs: &'p mut HobList<'h>,
    state: PhaseState,
}

impl<'p, 'h, A> PlatformPhase<'p, 'h, A> {
    pub fn new(config: PlatformConfig, allocator: &'p A, hobs: &'p mut HobList<'h>) -> Self {
        Self {
            config,
            allocator,
            hobs,
            state: PhaseState::NotStarted,
        }
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }

    /// Run the phase with the device tree that is stored in `fdt`
    pub fn run<'mem>(&mut self, fdt: &[u8]) -> Result<PhaseReport<'mem>, PhaseError>
    where
        A: PageAllocator<'mem>,
    {
        self.start()?;
        let result = FlattenedDeviceTree::from_buffer(fdt)
            .map_err(PhaseError::from)
            .and_then(|src| self.run_steps(&src));
        self.finish(result)
    }

    /// Run the phase with the device tree that the previous boot stage left at `ptr`
    ///
    /// # Safety
    /// If `ptr` is not null, it must point to memory that is readable for at least 40 bytes.
    /// If that memory holds a valid device tree header, it must also be readable for as many bytes as the header
    /// declares as total size.
    pub unsafe fn run_from_ptr<'mem>(
        &mut self,
        ptr: *const u8,
    ) -> Result<PhaseReport<'mem>, PhaseError>
    where
        A: PageAllocator<'mem>,
    {
        self.start()?;
        let result = if ptr.is_null() {
            Err(PhaseError::MissingInput)
        } else {
            FlattenedDeviceTree::from_ptr(ptr)
                .map_err(PhaseError::from)
                .and_then(|src| self.run_steps(&src))
        };
        self.finish(result)
    }

    fn start(&mut self) -> Result<(), PhaseError> {
        if self.state != PhaseState::NotStarted {
            return Err(PhaseError::AlreadyRun);
        }
        self.state = PhaseState::Relocating;
        Ok(())
    }

    fn finish<T>(&mut self, result: Result<T, PhaseError>) -> Result<T, PhaseError> {
        match &result {
            Ok(_) => {
                log::info!("platform initialization done");
                self.state = PhaseState::Done;
            }
            Err(e) => {
                log::error!("platform initialization failed while {:?}: {}", self.state, e);
                self.state = PhaseState::Failed;
            }
        }
        result
    }

    fn run_steps<'mem>(
        &mut self,
        src: &FlattenedDeviceTree<'_>,
    ) -> Result<PhaseReport<'mem>, PhaseError>
    where
        A: PageAllocator<'mem>,
    {
        log::info!("relocating device tree from {:p}", src.buf.as_ptr());
        let relocated = relocate(src, self.allocator)?;
        relocated.announce(self.hobs)?;

        self.state = PhaseState::AnnouncingFirmwareVolume;
        self.hobs.add_firmware_volume(
            self.config.dxe_fv_base.into(),
            self.config.dxe_fv_size.into(),
        )?;

        // devices are looked up in the relocated copy since that one is owned by firmware from now on
        self.state = PhaseState::ScanningDevices;
        let pcie_hosts = scan(
            relocated.tree(),
            self.config.pcie_host_compatible,
            self.hobs,
        )?;
        MmioWindow::normalize(self.config.pcie_inbound_base, self.config.pcie_inbound_size)?
            .announce(self.hobs)?;
        let storage = scan(relocated.tree(), self.config.storage_compatible, self.hobs)?;

        Ok(PhaseReport {
            relocated,
            pcie_hosts,
            storage,
        })
    }
}

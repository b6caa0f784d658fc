// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The device handle: one open accelerator character device, with a
//! typed method per driver ioctl.

use std::{
    collections::BTreeSet,
    fs::{self, File, OpenOptions},
    io,
    os::unix::{
        fs::OpenOptionsExt,
        io::{AsRawFd, RawFd},
    },
    path::{Path, PathBuf},
    sync::{mpsc, Mutex, PoisonError},
    thread,
    time::Duration,
};

use md5::{Digest, Md5};
use nix::{errno::Errno, libc::ioctl as nix_ioctl};
use retry::{delay::NoDelay, retry, Error as RetryError, OperationResult};
use semver::{Version, VersionReq};

use crate::{
    core::{abi, errors, ioctl, options::DeviceOptions},
    result::{HailoError, HailoResult},
};

/// Highest device node number probed by [`HailoDevice::scan`].
pub const MAX_DEVICE_NODES: usize = 16;

/// Sysfs class directory the driver registers nodes under.
const SYSFS_CLASS_PATH: &str = "/sys/class/hailo_chardev";

/// Kernel driver series this crate's ABI layouts are written against.
const SUPPORTED_DRIVER_SERIES: &str = "~4.23";

/// Interrupted `fw-control` calls are retried this many times.
const FW_CONTROL_EINTR_RETRIES: usize = 8;

lazy_static! {
    static ref SUPPORTED_DRIVER_VERSIONS: VersionReq =
        VersionReq::parse(SUPPORTED_DRIVER_SERIES).expect("static requirement parses");
}

struct DeviceState {
    file: Option<File>,
    enabled_channels: [u32; abi::MAX_VDMA_ENGINES],
}

/// An open accelerator device.
///
/// The handle owns the file descriptor and serializes its own state
/// changes behind one lock; the ioctls themselves are plain blocking
/// syscalls and may run concurrently on different devices. Once
/// [`close`](HailoDevice::close) has run, every dispatching method fails
/// with [`errors::Error::Closed`].
pub struct HailoDevice {
    state: Mutex<DeviceState>,
    path: PathBuf,
    properties: abi::DeviceProperties,
    driver_version: Version,
    options: DeviceOptions,
}

fn ioctl_raw<T>(fd: RawFd, cmd: u32, arg: &mut T) -> Result<(), errors::Error> {
    let res = unsafe {
        nix_ioctl(
            fd,
            cmd as nix::libc::c_ulong,
            arg as *mut T as *mut nix::libc::c_void,
        )
    };
    match Errno::result(res) {
        Ok(_) => Ok(()),
        Err(errno) => Err(errors::Error::from_errno(errno)),
    }
}

fn query_driver_info_fd(fd: RawFd) -> Result<abi::DriverInfo, errors::Error> {
    let mut info = abi::DriverInfo::default();
    ioctl_raw(fd, ioctl::QUERY_DRIVER_INFO, &mut info)?;
    Ok(info)
}

/// Properties assumed for the Hailo-8 board class when the loaded
/// driver predates the query.
fn default_device_properties() -> abi::DeviceProperties {
    abi::DeviceProperties {
        desc_max_page_size: 512,
        board_type: abi::BOARD_TYPE_HAILO8,
        allocation_mode: abi::ALLOCATION_MODE_USERPTR,
        dma_type: abi::DMA_TYPE_PCIE,
        dma_engines_count: 1,
        is_fw_loaded: 1,
    }
}

impl HailoDevice {
    /// Open the device node at `path`.
    ///
    /// The node is opened read-write with close-on-exec and in blocking
    /// mode; the driver acquires a semaphore on open and requires
    /// blocking semantics. The loaded driver's version is checked
    /// against the supported 4.23 series unless the options disable it.
    pub fn open<P: AsRef<Path>>(path: P, options: DeviceOptions) -> HailoResult<HailoDevice> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(nix::libc::O_CLOEXEC)
            .open(&path)
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => HailoError::NotFound(path.display().to_string()),
                _ => HailoError::Driver(errors::Error::Open(err.to_string())),
            })?;

        let fd = file.as_raw_fd();
        let info = query_driver_info_fd(fd)?;
        let driver_version = Version::new(
            u64::from(info.major),
            u64::from(info.minor),
            u64::from(info.revision),
        );
        if options.checks_driver_version() && !SUPPORTED_DRIVER_VERSIONS.matches(&driver_version) {
            return Err(HailoError::Driver(errors::Error::UnsupportedDriverVersion(
                driver_version.to_string(),
            )));
        }

        let properties = {
            let mut props = abi::DeviceProperties::default();
            match ioctl_raw(fd, ioctl::QUERY_DEVICE_PROPERTIES, &mut props) {
                Ok(()) => props,
                Err(errors::Error::InvalidIoctl) | Err(errors::Error::Timeout) => {
                    debug!(
                        "Driver on {} does not answer the properties query, \
                         assuming Hailo-8 defaults",
                        path.display()
                    );
                    default_device_properties()
                }
                Err(err) => return Err(HailoError::Driver(err)),
            }
        };

        debug!(
            "Opened {} (driver {}, {} DMA engines, desc page size {})",
            path.display(),
            driver_version,
            properties.dma_engines_count,
            properties.desc_max_page_size
        );

        Ok(HailoDevice {
            state: Mutex::new(DeviceState {
                file: Some(file),
                enabled_channels: [0; abi::MAX_VDMA_ENGINES],
            }),
            path,
            properties,
            driver_version,
            options,
        })
    }

    /// List the device nodes present on this host.
    ///
    /// Probes `/dev/hailo0` through `/dev/hailo15` and, when the
    /// driver's sysfs class directory is readable, keeps only the nodes
    /// registered there. Existence only: opening a node takes the
    /// driver's semaphore.
    pub fn scan() -> Vec<PathBuf> {
        let class: Option<BTreeSet<String>> = fs::read_dir(SYSFS_CLASS_PATH).ok().map(|dir| {
            dir.filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        });

        (0..MAX_DEVICE_NODES)
            .filter_map(|n| {
                let name = format!("hailo{n}");
                if let Some(class) = &class {
                    if !class.contains(&name) {
                        return None;
                    }
                }
                let path = PathBuf::from(format!("/dev/{name}"));
                path.exists().then_some(path)
            })
            .collect()
    }

    /// Open the first device found by [`scan`](HailoDevice::scan).
    pub fn open_first(options: DeviceOptions) -> HailoResult<HailoDevice> {
        let path = Self::scan()
            .into_iter()
            .next()
            .ok_or_else(|| HailoError::NotFound("no accelerator device node".to_string()))?;
        Self::open(path, options)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fd(&self) -> HailoResult<RawFd> {
        self.lock_state()
            .file
            .as_ref()
            .map(AsRawFd::as_raw_fd)
            .ok_or(HailoError::Driver(errors::Error::Closed))
    }

    fn ioctl<T>(&self, cmd: u32, arg: &mut T) -> HailoResult<()> {
        let fd = self.fd()?;
        ioctl_raw(fd, cmd, arg).map_err(HailoError::Driver)
    }

    /// Path this handle was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Board properties reported (or assumed) at open time.
    pub fn properties(&self) -> &abi::DeviceProperties {
        &self.properties
    }

    /// Version of the loaded kernel driver.
    pub fn driver_version(&self) -> &Version {
        &self.driver_version
    }

    /// Options this handle was opened with.
    pub fn options(&self) -> &DeviceOptions {
        &self.options
    }

    /// Close the underlying file descriptor. Idempotent; subsequent
    /// ioctl-dispatching calls fail with a closed error.
    pub fn close(&self) {
        let mut state = self.lock_state();
        if state.file.take().is_some() {
            debug!("Closed {}", self.path.display());
        }
    }

    /// Whether [`close`](HailoDevice::close) has run.
    pub fn is_closed(&self) -> bool {
        self.lock_state().file.is_none()
    }

    /// Re-query the loaded driver's version triple.
    pub fn driver_info(&self) -> HailoResult<abi::DriverInfo> {
        let fd = self.fd()?;
        query_driver_info_fd(fd).map_err(HailoError::Driver)
    }

    /// Map `size` bytes at `user_addr` for DMA and return the mapped
    /// handle. The address must be page-aligned.
    pub fn vdma_buffer_map(
        &self,
        user_addr: usize,
        size: u64,
        direction: abi::DmaDirection,
    ) -> HailoResult<u64> {
        let mut params = abi::VdmaBufferMap {
            user_addr,
            size,
            direction: direction as u32,
            buffer_type: abi::BUFFER_TYPE_USER_PTR,
            allocated_buffer_handle: 0,
            mapped_handle: 0,
        };
        self.ioctl(ioctl::VDMA_BUFFER_MAP, &mut params)?;
        trace!(
            "Mapped {size} bytes at {user_addr:#x} as handle {}",
            params.mapped_handle
        );
        Ok(params.mapped_handle)
    }

    /// Drop the kernel mapping named by `mapped_handle`.
    pub fn vdma_buffer_unmap(&self, mapped_handle: u64) -> HailoResult<()> {
        let mut params = abi::VdmaBufferUnmap { mapped_handle };
        self.ioctl(ioctl::VDMA_BUFFER_UNMAP, &mut params)
    }

    /// Synchronize the caches over a mapped range.
    pub fn vdma_buffer_sync(
        &self,
        handle: u64,
        direction: abi::SyncDirection,
        offset: u64,
        count: u64,
    ) -> HailoResult<()> {
        let mut params = abi::VdmaBufferSync {
            handle,
            sync_type: direction as u32,
            offset,
            count,
        };
        self.ioctl(ioctl::VDMA_BUFFER_SYNC, &mut params)
    }

    /// Create a descriptor list and return `(handle, dma_address)`.
    pub fn desc_list_create(
        &self,
        desc_count: u64,
        page_size: u16,
        is_circular: bool,
    ) -> HailoResult<(usize, u64)> {
        let mut params = abi::DescListCreate {
            desc_count,
            page_size,
            is_circular: u8::from(is_circular),
            desc_handle: 0,
            dma_address: 0,
        };
        self.ioctl(ioctl::DESC_LIST_CREATE, &mut params)?;
        trace!(
            "Created descriptor list {} ({desc_count} x {page_size}B at {:#x})",
            params.desc_handle,
            params.dma_address
        );
        Ok((params.desc_handle, params.dma_address))
    }

    /// Release a descriptor list. Must be issued exactly once per list.
    pub fn desc_list_release(&self, desc_handle: usize) -> HailoResult<()> {
        let mut params = abi::DescListRelease { desc_handle };
        self.ioctl(ioctl::DESC_LIST_RELEASE, &mut params)
    }

    /// Point a descriptor list at a mapped buffer.
    pub fn desc_list_program(&self, params: &mut abi::DescListProgram) -> HailoResult<()> {
        self.ioctl(ioctl::DESC_LIST_PROGRAM, params)
    }

    /// Enable the channels selected by a per-engine bitmap.
    pub fn vdma_enable_channels(
        &self,
        bitmap: [u32; abi::MAX_VDMA_ENGINES],
        enable_timestamps: bool,
    ) -> HailoResult<()> {
        let mut state = self.lock_state();
        let fd = state
            .file
            .as_ref()
            .map(AsRawFd::as_raw_fd)
            .ok_or(HailoError::Driver(errors::Error::Closed))?;
        let mut params = abi::VdmaEnableChannels {
            channels_bitmap_per_engine: bitmap,
            enable_timestamps_measure: u8::from(enable_timestamps),
        };
        ioctl_raw(fd, ioctl::VDMA_ENABLE_CHANNELS, &mut params).map_err(HailoError::Driver)?;
        for (word, bits) in state.enabled_channels.iter_mut().zip(bitmap) {
            *word |= bits;
        }
        debug!("Enabled channels {bitmap:08x?}");
        Ok(())
    }

    /// Disable the channels selected by a per-engine bitmap. Disabling
    /// clears exactly the given bits.
    pub fn vdma_disable_channels(
        &self,
        bitmap: [u32; abi::MAX_VDMA_ENGINES],
    ) -> HailoResult<()> {
        let mut state = self.lock_state();
        let fd = state
            .file
            .as_ref()
            .map(AsRawFd::as_raw_fd)
            .ok_or(HailoError::Driver(errors::Error::Closed))?;
        let mut params = abi::VdmaDisableChannels {
            channels_bitmap_per_engine: bitmap,
        };
        ioctl_raw(fd, ioctl::VDMA_DISABLE_CHANNELS, &mut params).map_err(HailoError::Driver)?;
        for (word, bits) in state.enabled_channels.iter_mut().zip(bitmap) {
            *word &= !bits;
        }
        debug!("Disabled channels {bitmap:08x?}");
        Ok(())
    }

    /// Channels currently enabled through this handle.
    pub fn enabled_channels(&self) -> [u32; abi::MAX_VDMA_ENGINES] {
        self.lock_state().enabled_channels
    }

    /// Block until one of the requested channels signals, or until
    /// `timeout` expires on the host side.
    ///
    /// The wait runs on a worker thread racing a timer. On expiry the
    /// caller gets [`HailoError::Timeout`] while the worker's syscall is
    /// left to complete in the background and its result is discarded.
    pub fn vdma_interrupts_wait(
        &self,
        bitmap: [u32; abi::MAX_VDMA_ENGINES],
        timeout: Duration,
    ) -> HailoResult<Vec<abi::ChannelIrqData>> {
        let fd = self.fd()?;
        let mut params = abi::VdmaInterruptsWait::default();
        params.channels_bitmap_per_engine = bitmap;

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("hailo-irq-wait".to_string())
            .spawn(move || {
                let res =
                    ioctl_raw(fd, ioctl::VDMA_INTERRUPTS_WAIT, &mut params).map(|()| params);
                let _ = tx.send(res);
            })
            .map_err(|err| HailoError::OutOfMemory(err.to_string()))?;

        match rx.recv_timeout(timeout) {
            Ok(Ok(params)) => {
                let count = (params.channels_count as usize).min(abi::CHANNEL_IRQ_DATA_COUNT);
                let irq_data = params.irq_data;
                Ok(irq_data[..count].to_vec())
            }
            Ok(Err(err)) => Err(HailoError::Driver(err)),
            Err(mpsc::RecvTimeoutError::Timeout) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                warn!(
                    "Interrupt wait on {} abandoned after {timeout:?}; \
                     the in-kernel wait may still complete",
                    self.path.display()
                );
                Err(HailoError::Timeout(timeout))
            }
        }
    }

    /// Launch a transfer on an enabled channel.
    pub fn vdma_launch_transfer(&self, params: &mut abi::VdmaLaunchTransfer) -> HailoResult<()> {
        self.ioctl(ioctl::VDMA_LAUNCH_TRANSFER, params)
    }

    /// Carry one serialized control frame to the firmware and return
    /// the raw response frame.
    ///
    /// The request's MD5 rides along for the firmware to verify; the
    /// response's MD5 is verified here before the frame is returned.
    /// Interrupted calls are retried with a fresh syscall.
    pub fn fw_control(
        &self,
        request: &[u8],
        cpu_id: u32,
        timeout: Duration,
    ) -> HailoResult<Vec<u8>> {
        if request.len() > abi::MAX_CONTROL_LENGTH {
            return Err(HailoError::InvalidArgument(format!(
                "control frame of {} bytes exceeds the {}-byte wire capacity",
                request.len(),
                abi::MAX_CONTROL_LENGTH
            )));
        }
        let fd = self.fd()?;

        let mut params = abi::FwControl::default();
        params.expected_md5 = Md5::digest(request).into();
        params.buffer_len = request.len() as u32;
        params.buffer[..request.len()].copy_from_slice(request);
        params.timeout_ms = timeout.as_millis() as u32;
        params.cpu_id = cpu_id;

        let result = retry(NoDelay.take(FW_CONTROL_EINTR_RETRIES), || {
            let mut attempt = params;
            match ioctl_raw(fd, ioctl::FW_CONTROL, &mut attempt) {
                Ok(()) => OperationResult::Ok(attempt),
                Err(errors::Error::Interrupted) => {
                    trace!("fw-control interrupted, retrying");
                    OperationResult::Retry(errors::Error::Interrupted)
                }
                Err(err) => OperationResult::Err(err),
            }
        });
        let params = match result {
            Ok(params) => params,
            Err(RetryError::Operation { error, .. }) => return Err(HailoError::Driver(error)),
            Err(RetryError::Internal(msg)) => return Err(HailoError::Protocol(msg)),
        };

        let len = params.buffer_len as usize;
        if len > abi::MAX_CONTROL_LENGTH {
            return Err(HailoError::Protocol(format!(
                "driver reported a {len}-byte response frame"
            )));
        }
        let response = params.buffer[..len].to_vec();
        let digest: [u8; 16] = Md5::digest(&response).into();
        if digest != params.expected_md5 {
            return Err(HailoError::Protocol(
                "response frame failed its MD5 check".to_string(),
            ));
        }
        Ok(response)
    }

    /// Block for the next device-to-host notification payload.
    pub fn read_notification(&self) -> HailoResult<Vec<u8>> {
        let mut params = abi::D2hNotification::default();
        self.ioctl(ioctl::READ_NOTIFICATION, &mut params)?;
        let len = (params.buffer_len as usize).min(abi::NOTIFICATION_BUFFER_SIZE);
        Ok(params.buffer[..len].to_vec())
    }

    /// Wake any blocked notification reader and stop delivery.
    pub fn disable_notifications(&self) -> HailoResult<()> {
        let mut nothing = 0u8;
        self.ioctl(ioctl::DISABLE_NOTIFICATION, &mut nothing)
    }

    /// Read the firmware's log buffer from the given processor.
    pub fn read_fw_log(&self, cpu_id: u32) -> HailoResult<Vec<u8>> {
        let mut params = abi::FwLog {
            cpu_id,
            ..Default::default()
        };
        self.ioctl(ioctl::READ_LOG, &mut params)?;
        let len = (params.read_bytes as usize).min(abi::FW_LOG_BUFFER_SIZE);
        Ok(params.buffer[..len].to_vec())
    }

    /// Hard-reset the neural-network core.
    pub fn reset_nn_core(&self) -> HailoResult<()> {
        let mut nothing = 0u8;
        self.ioctl(ioctl::RESET_NN_CORE, &mut nothing)
    }
}

impl std::fmt::Debug for HailoDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HailoDevice")
            .field("path", &self.path)
            .field("driver_version", &self.driver_version)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn opening_a_missing_node_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hailo0");
        assert_matches!(
            HailoDevice::open(&path, DeviceOptions::default()),
            Err(HailoError::NotFound(_))
        );
    }

    #[test]
    fn opening_a_non_device_file_fails_at_the_driver_query() {
        // A regular file accepts the open but rejects every ioctl.
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_matches!(
            HailoDevice::open(file.path(), DeviceOptions::default()),
            Err(HailoError::Driver(_))
        );
    }

    #[test]
    fn default_properties_describe_a_hailo8() {
        let props = default_device_properties();
        assert_eq!(props.board_type, abi::BOARD_TYPE_HAILO8);
        assert_eq!(props.desc_max_page_size, 512);
        assert_eq!(props.dma_engines_count, 1);
        assert_eq!(props.is_fw_loaded, 1);
    }

    #[test]
    fn supported_series_accepts_only_4_23() {
        assert!(SUPPORTED_DRIVER_VERSIONS.matches(&Version::new(4, 23, 0)));
        assert!(SUPPORTED_DRIVER_VERSIONS.matches(&Version::new(4, 23, 7)));
        assert!(!SUPPORTED_DRIVER_VERSIONS.matches(&Version::new(4, 20, 0)));
        assert!(!SUPPORTED_DRIVER_VERSIONS.matches(&Version::new(4, 24, 0)));
    }

    #[test]
    #[ignore = "requires an accelerator at /dev/hailo0"]
    fn device_smoke_open_close() {
        let dev = HailoDevice::open("/dev/hailo0", DeviceOptions::default()).unwrap();
        assert!(!dev.is_closed());
        assert!(dev.properties().dma_engines_count >= 1);
        dev.close();
        dev.close();
        assert!(dev.is_closed());
        assert_matches!(
            dev.driver_info(),
            Err(HailoError::Driver(errors::Error::Closed))
        );
    }
}

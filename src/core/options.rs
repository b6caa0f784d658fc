// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::time::Duration;

/// Default deadline for one firmware control round trip.
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default host-side watchdog on the inference interrupt wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Encapsulates options for opening a device.
#[derive(Clone, Copy, Debug)]
pub struct DeviceOptions {
    control_timeout: Duration,
    wait_timeout: Duration,
    check_driver_version: bool,
}

impl Default for DeviceOptions {
    fn default() -> DeviceOptions {
        DeviceOptions {
            control_timeout: DEFAULT_CONTROL_TIMEOUT,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            check_driver_version: true,
        }
    }
}

impl DeviceOptions {
    /// Set the firmware control timeout. Replace the previous value.
    /// Consumes self.
    pub fn set_control_timeout(mut self, timeout: Duration) -> DeviceOptions {
        self.control_timeout = timeout;
        self
    }

    /// Set the interrupt-wait watchdog timeout. Replace the previous
    /// value. Consumes self.
    pub fn set_wait_timeout(mut self, timeout: Duration) -> DeviceOptions {
        self.wait_timeout = timeout;
        self
    }

    /// Skip the driver version gate at open time. Consumes self.
    pub fn skip_driver_version_check(mut self) -> DeviceOptions {
        self.check_driver_version = false;
        self
    }

    /// Retrieve the control timeout.
    pub fn control_timeout(&self) -> Duration {
        self.control_timeout
    }

    /// Retrieve the interrupt-wait watchdog timeout.
    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Whether the driver version gate runs at open time.
    pub fn checks_driver_version(&self) -> bool {
        self.check_driver_version
    }
}

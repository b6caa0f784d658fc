// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The activation orchestrator: moves a configured network group onto
//! the device and tears it down again.

use std::{
    cmp,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use crate::{
    control::{
        ops::{self, ApplicationHeader, ContextSwitchStatus, APP_INDEX_IGNORE},
        ControlTransport,
    },
    core::{abi, options::DEFAULT_CONTROL_TIMEOUT},
    hef::{build_action_list, ContextCategory, NetworkGroupInfo},
    result::{HailoError, HailoResult},
};

/// Context-switch manager buffer size installed for every group.
const CSM_BUFFER_SIZE: u16 = 512;

/// States of a network group on the host side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkGroupState {
    /// Created, not yet configured.
    Uninitialized,
    /// Host-side state prepared; the device knows nothing yet.
    Configured,
    /// The firmware's context-switch machine is running this group.
    Activated,
    /// Torn down; may be activated again.
    Deactivated,
}

impl NetworkGroupState {
    fn name(self) -> &'static str {
        match self {
            NetworkGroupState::Uninitialized => "uninitialized",
            NetworkGroupState::Configured => "configured",
            NetworkGroupState::Activated => "activated",
            NetworkGroupState::Deactivated => "deactivated",
        }
    }
}

struct GroupInner {
    state: NetworkGroupState,
    sequence: u32,
    closed: bool,
    action_list_address: Option<u64>,
}

/// One network group bound to a device.
///
/// The group borrows its transport (in production the open
/// [`crate::HailoDevice`]); the device always outlives the group.
/// Every public operation takes the group's lock for its duration, so
/// concurrent calls serialize and the first to acquire wins.
pub struct ConfiguredNetworkGroup<'a> {
    transport: &'a dyn ControlTransport,
    info: NetworkGroupInfo,
    index: u8,
    control_timeout: Duration,
    inner: Mutex<GroupInner>,
}

impl<'a> ConfiguredNetworkGroup<'a> {
    /// Bind a parsed network group to a transport. The group starts
    /// uninitialized; call [`configure`](Self::configure) before
    /// activating.
    pub fn new(
        transport: &'a dyn ControlTransport,
        info: NetworkGroupInfo,
        index: u8,
    ) -> ConfiguredNetworkGroup<'a> {
        ConfiguredNetworkGroup {
            transport,
            info,
            index,
            control_timeout: DEFAULT_CONTROL_TIMEOUT,
            inner: Mutex::new(GroupInner {
                state: NetworkGroupState::Uninitialized,
                sequence: 0,
                closed: false,
                action_list_address: None,
            }),
        }
    }

    /// Set the per-request control timeout. Replace the previous
    /// value. Consumes self.
    pub fn set_control_timeout(mut self, timeout: Duration) -> ConfiguredNetworkGroup<'a> {
        self.control_timeout = timeout;
        self
    }

    /// The parsed network group this object drives.
    pub fn info(&self) -> &NetworkGroupInfo {
        &self.info
    }

    /// Name of the network group.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Index of the group on the device; 0 for the default group.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Current state of the group.
    pub fn state(&self) -> NetworkGroupState {
        self.lock().state
    }

    /// Last control sequence number used on the wire.
    pub fn last_sequence(&self) -> u32 {
        self.lock().sequence
    }

    fn lock(&self) -> MutexGuard<'_, GroupInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Advanced even when the request fails, so a retry gets a fresh
    // sequence.
    fn next_sequence(inner: &mut GroupInner) -> u32 {
        inner.sequence += 1;
        inner.sequence
    }

    /// Move an uninitialized group to configured.
    pub fn configure(&self) -> HailoResult<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(HailoError::InvalidState {
                operation: "configure",
                state: "closed",
            });
        }
        if inner.state != NetworkGroupState::Uninitialized {
            return Err(HailoError::InvalidState {
                operation: "configure",
                state: inner.state.name(),
            });
        }
        inner.state = NetworkGroupState::Configured;
        debug!(
            "Configured network group \"{}\" ({} dynamic contexts)",
            self.info.name,
            self.info.dynamic_contexts.len()
        );
        Ok(())
    }

    fn application_header(&self, action_list_address: Option<u64>) -> ApplicationHeader {
        let mut batch_size = [0u16; 8];
        batch_size[0] = 1;
        ApplicationHeader {
            dynamic_contexts_count: cmp::max(1, self.info.dynamic_contexts.len()) as u16,
            preliminary_run_asap: false,
            batch_register_config: false,
            can_fast_batch_switch: false,
            is_abbale_supported: false,
            networks_count: 1,
            csm_buffer_size: CSM_BUFFER_SIZE,
            batch_size,
            external_action_list_address: action_list_address
                .map(|addr| addr as u32)
                .unwrap_or(abi::INVALID_EXTERNAL_ACTION_LIST_ADDRESS),
            boundary_channels_bitmap: [0; 3],
        }
    }

    // Serialized action lists in firmware installation order:
    // activation, batch switching, preliminary, then each dynamic
    // context. A missing preliminary context is installed empty.
    fn context_blobs(&self) -> Vec<(ContextCategory, Vec<u8>)> {
        let mut blobs = Vec::with_capacity(3 + self.info.dynamic_contexts.len());
        blobs.push((
            ContextCategory::Activation,
            self.info.activation_context.action_list(),
        ));
        blobs.push((
            ContextCategory::BatchSwitching,
            self.info.batch_switching_context.action_list(),
        ));
        blobs.push((
            ContextCategory::Preliminary,
            match &self.info.preliminary_context {
                Some(context) => context.action_list(),
                None => build_action_list([]),
            },
        ));
        for context in &self.info.dynamic_contexts {
            blobs.push((ContextCategory::Dynamic, context.action_list()));
        }
        blobs
    }

    /// Activate the group: install its header and contexts and enable
    /// the firmware's context-switch machine.
    ///
    /// Permitted from configured or deactivated. Any failure past the
    /// initial clear aborts the sequence and leaves the state where it
    /// was.
    pub fn activate(&self) -> HailoResult<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(HailoError::InvalidState {
                operation: "activate",
                state: "closed",
            });
        }
        match inner.state {
            NetworkGroupState::Configured | NetworkGroupState::Deactivated => {}
            other => {
                return Err(HailoError::InvalidState {
                    operation: "activate",
                    state: other.name(),
                })
            }
        }

        let sequence = Self::next_sequence(&mut inner);
        if let Err(err) = ops::clear_configured_apps(self.transport, sequence, self.control_timeout)
        {
            warn!("Clearing configured apps failed, continuing activation: {err}");
        }

        let header = self.application_header(inner.action_list_address);
        let sequence = Self::next_sequence(&mut inner);
        ops::set_network_group_header(self.transport, sequence, &header, self.control_timeout)?;

        for (category, blob) in self.context_blobs() {
            for chunk in ops::context_chunks(&blob) {
                let sequence = Self::next_sequence(&mut inner);
                ops::set_context_info(
                    self.transport,
                    sequence,
                    category,
                    chunk,
                    self.control_timeout,
                )?;
            }
        }

        let sequence = Self::next_sequence(&mut inner);
        // Batch size 0 keeps the firmware default; batch count 0 runs
        // until reset.
        ops::change_context_switch_status(
            self.transport,
            sequence,
            ContextSwitchStatus::Enabled,
            self.index,
            0,
            0,
            self.control_timeout,
        )?;

        inner.state = NetworkGroupState::Activated;
        debug!("Activated network group \"{}\"", self.info.name);
        Ok(())
    }

    /// Deactivate the group: reset the firmware's context-switch
    /// machine.
    ///
    /// Idempotent; a deactivated group returns Ok without touching the
    /// device. A firmware failure is logged and the state still ends
    /// deactivated.
    pub fn deactivate(&self) -> HailoResult<()> {
        let mut inner = self.lock();
        match inner.state {
            NetworkGroupState::Deactivated => return Ok(()),
            NetworkGroupState::Activated => {}
            other => {
                return Err(HailoError::InvalidState {
                    operation: "deactivate",
                    state: other.name(),
                })
            }
        }

        let sequence = Self::next_sequence(&mut inner);
        if let Err(err) = ops::change_context_switch_status(
            self.transport,
            sequence,
            ContextSwitchStatus::Reset,
            APP_INDEX_IGNORE,
            0,
            0,
            self.control_timeout,
        ) {
            warn!("Context-switch reset failed, continuing deactivation: {err}");
        }

        inner.state = NetworkGroupState::Deactivated;
        debug!("Deactivated network group \"{}\"", self.info.name);
        Ok(())
    }

    /// Finish using the group. Rejected while activated; deactivate
    /// first.
    pub fn close(&self) -> HailoResult<()> {
        let mut inner = self.lock();
        if inner.state == NetworkGroupState::Activated {
            return Err(HailoError::InvalidState {
                operation: "close",
                state: "activated",
            });
        }
        inner.closed = true;
        Ok(())
    }
}

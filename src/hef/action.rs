// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Firmware actions and the action-list codec.
//!
//! Every emitted action starts with a 5-byte header: the type code,
//! then a 4-byte little-endian timestamp. Timestamps count down from
//! `0xFFFF_FFFF`, decremented once per emitted action. Three source
//! variants never reach the action list: `WriteDataCcw` rides a
//! config-buffer DMA instead, `AllowInputDataflow` needs runtime DMA
//! channel mapping that is not derivable from the HEF, and `None` is a
//! no-op. A context whose stream would otherwise be empty is emitted as
//! a single `Halt`.

/// Timestamp of the first emitted action.
pub const ACTION_LIST_START_TIMESTAMP: u32 = 0xFFFF_FFFF;

/// Kernel-done address of the short Enable-LCU form.
pub const DEFAULT_KERNEL_DONE_ADDRESS: u16 = 1;

/// Kernel-done count of the short Enable-LCU form, also the default
/// count for batch switches.
pub const DEFAULT_KERNEL_DONE_COUNT: u32 = 2;

const TYPE_TRIGGER_SEQUENCER: u8 = 1;
const TYPE_ENABLE_LCU_DEFAULT: u8 = 3;
const TYPE_ENABLE_LCU_NON_DEFAULT: u8 = 4;
const TYPE_DISABLE_LCU: u8 = 5;
const TYPE_WAIT_FOR_SEQUENCER_DONE: u8 = 17;
const TYPE_WAIT_FOR_MODULE_CONFIG_DONE: u8 = 20;
const TYPE_FETCH_CCW_BURSTS: u8 = 27;
const TYPE_ENABLE_NMS: u8 = 34;
const TYPE_WRITE_DATA_BY_TYPE: u8 = 35;
const TYPE_SWITCH_LCU_BATCH: u8 = 36;
const TYPE_SLEEP: u8 = 43;
const TYPE_HALT: u8 = 44;

/// Pack a (cluster, lcu) pair into the firmware's one-byte id.
pub fn packed_lcu_id(cluster_index: u8, lcu_index: u8) -> u8 {
    (lcu_index & 0x0f) | ((cluster_index & 0x07) << 4)
}

/// Pack an (engine, channel) pair into the firmware's one-byte id.
pub fn packed_vdma_channel_id(engine_index: u8, channel_index: u8) -> u8 {
    (channel_index & 0x1f) | ((engine_index & 0x03) << 5)
}

/// Configuration block of a sequencer trigger, 43 bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequencerConfig {
    /// Initial L3 cut the sequencer starts from.
    pub initial_l3_cut: u8,
    /// Offset within the initial L3 cut.
    pub initial_l3_offset: u16,
    /// Active APU bitmap.
    pub active_apu: u32,
    /// Active input-aligner bitmap.
    pub active_ia: u32,
    /// Active subcluster bitmap.
    pub active_sc: u64,
    /// Active L2 write bitmap.
    pub active_l2: u64,
    /// First L2 write offset.
    pub l2_offset_0: u64,
    /// Second L2 write offset.
    pub l2_offset_1: u64,
}

/// One firmware action in source form.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Start a logical compute unit.
    EnableLcu {
        /// Cluster of the unit.
        cluster_index: u8,
        /// Unit within the cluster.
        lcu_index: u8,
        /// Network the unit computes for.
        network_index: u8,
        /// Address the kernel-done counter is read from.
        kernel_done_address: u16,
        /// Kernel-done count that completes the unit.
        kernel_done_count: u32,
    },
    /// Stop a logical compute unit.
    DisableLcu {
        /// Cluster of the unit.
        cluster_index: u8,
        /// Unit within the cluster.
        lcu_index: u8,
    },
    /// Kick a cluster's weight sequencer.
    TriggerSequencer {
        /// Cluster whose sequencer fires.
        cluster_index: u8,
        /// The sequencer program.
        config: SequencerConfig,
    },
    /// Fetch config bursts on a config stream.
    FetchCcwBursts {
        /// Number of bursts to fetch.
        ccw_bursts: u16,
        /// Config stream to fetch on.
        config_stream_index: u8,
    },
    /// Arm an NMS unit.
    EnableNms {
        /// NMS unit to arm.
        nms_unit_index: u8,
        /// Network the unit post-processes.
        network_index: u8,
        /// Detection classes.
        number_of_classes: u16,
        /// Boxes per output burst.
        burst_size: u16,
        /// Division factor over the class scores.
        division_factor: u8,
    },
    /// Masked register write.
    WriteDataByType {
        /// Register address to write.
        address: u32,
        /// Interpretation of `data`.
        data_type: u8,
        /// The value to write.
        data: u32,
        /// Left shift applied before masking.
        shift: u8,
        /// Write mask.
        mask: u32,
        /// Network the write belongs to.
        network_index: u8,
    },
    /// Re-batch a running LCU.
    SwitchLcuBatch {
        /// Cluster of the unit.
        cluster_index: u8,
        /// Unit within the cluster.
        lcu_index: u8,
        /// Network the unit computes for.
        network_index: u8,
        /// Kernel-done count for the new batch.
        kernel_done_count: u32,
    },
    /// Stall the context for a fixed time.
    Sleep {
        /// Microseconds to stall.
        sleep_time_us: u32,
    },
    /// End the context's action stream.
    Halt,
    /// Wait for a module-config-done interrupt.
    WaitForModuleConfigDone {
        /// Module whose interrupt is awaited.
        module_index: u8,
    },
    /// Wait for a sequencer-done interrupt.
    WaitForSequencerDone {
        /// Sequencer whose interrupt is awaited.
        sequencer_index: u8,
    },
    /// Configuration words routed through a config-stream DMA.
    /// Never placed in the action list.
    WriteDataCcw {
        /// Config stream the words belong to.
        config_stream_index: u8,
        /// The raw configuration words.
        data: Vec<u8>,
    },
    /// Open an input stream's dataflow. Requires runtime DMA channel
    /// mapping, so it is never placed in the action list.
    AllowInputDataflow {
        /// Compiler-assigned index of the input layer.
        sys_index: u8,
    },
    /// Explicit no-op.
    None,
}

impl Action {
    /// Whether [`serialize_into`](Action::serialize_into) emits this
    /// action.
    pub fn is_emitted(&self) -> bool {
        !matches!(
            self,
            Action::WriteDataCcw { .. } | Action::AllowInputDataflow { .. } | Action::None
        )
    }

    /// Append the firmware form of this action to `out`. Returns false
    /// for the skipped variants, which leave `out` untouched.
    pub fn serialize_into(&self, timestamp: u32, out: &mut Vec<u8>) -> bool {
        let type_code = match self {
            Action::EnableLcu {
                kernel_done_address,
                kernel_done_count,
                ..
            } => {
                if *kernel_done_address == DEFAULT_KERNEL_DONE_ADDRESS
                    && *kernel_done_count == DEFAULT_KERNEL_DONE_COUNT
                {
                    TYPE_ENABLE_LCU_DEFAULT
                } else {
                    TYPE_ENABLE_LCU_NON_DEFAULT
                }
            }
            Action::DisableLcu { .. } => TYPE_DISABLE_LCU,
            Action::TriggerSequencer { .. } => TYPE_TRIGGER_SEQUENCER,
            Action::FetchCcwBursts { .. } => TYPE_FETCH_CCW_BURSTS,
            Action::EnableNms { .. } => TYPE_ENABLE_NMS,
            Action::WriteDataByType { .. } => TYPE_WRITE_DATA_BY_TYPE,
            Action::SwitchLcuBatch { .. } => TYPE_SWITCH_LCU_BATCH,
            Action::Sleep { .. } => TYPE_SLEEP,
            Action::Halt => TYPE_HALT,
            Action::WaitForModuleConfigDone { .. } => TYPE_WAIT_FOR_MODULE_CONFIG_DONE,
            Action::WaitForSequencerDone { .. } => TYPE_WAIT_FOR_SEQUENCER_DONE,
            Action::WriteDataCcw { .. } | Action::AllowInputDataflow { .. } | Action::None => {
                return false
            }
        };

        out.push(type_code);
        out.extend_from_slice(&timestamp.to_le_bytes());

        match self {
            Action::EnableLcu {
                cluster_index,
                lcu_index,
                network_index,
                kernel_done_address,
                kernel_done_count,
            } => {
                out.push(packed_lcu_id(*cluster_index, *lcu_index));
                out.push(*network_index);
                if type_code == TYPE_ENABLE_LCU_NON_DEFAULT {
                    out.extend_from_slice(&kernel_done_address.to_le_bytes());
                    out.extend_from_slice(&kernel_done_count.to_le_bytes());
                }
            }
            Action::DisableLcu {
                cluster_index,
                lcu_index,
            } => {
                out.push(packed_lcu_id(*cluster_index, *lcu_index));
            }
            Action::TriggerSequencer {
                cluster_index,
                config,
            } => {
                out.push(*cluster_index);
                out.push(config.initial_l3_cut);
                out.extend_from_slice(&config.initial_l3_offset.to_le_bytes());
                out.extend_from_slice(&config.active_apu.to_le_bytes());
                out.extend_from_slice(&config.active_ia.to_le_bytes());
                out.extend_from_slice(&config.active_sc.to_le_bytes());
                out.extend_from_slice(&config.active_l2.to_le_bytes());
                out.extend_from_slice(&config.l2_offset_0.to_le_bytes());
                out.extend_from_slice(&config.l2_offset_1.to_le_bytes());
            }
            Action::FetchCcwBursts {
                ccw_bursts,
                config_stream_index,
            } => {
                out.extend_from_slice(&ccw_bursts.to_le_bytes());
                out.push(*config_stream_index);
            }
            Action::EnableNms {
                nms_unit_index,
                network_index,
                number_of_classes,
                burst_size,
                division_factor,
            } => {
                out.push(*nms_unit_index);
                out.push(*network_index);
                out.extend_from_slice(&number_of_classes.to_le_bytes());
                out.extend_from_slice(&burst_size.to_le_bytes());
                out.push(*division_factor);
            }
            Action::WriteDataByType {
                address,
                data_type,
                data,
                shift,
                mask,
                network_index,
            } => {
                out.extend_from_slice(&address.to_le_bytes());
                out.push(*data_type);
                out.extend_from_slice(&data.to_le_bytes());
                out.push(*shift);
                out.extend_from_slice(&mask.to_le_bytes());
                out.push(*network_index);
            }
            Action::SwitchLcuBatch {
                cluster_index,
                lcu_index,
                network_index,
                kernel_done_count,
            } => {
                out.push(packed_lcu_id(*cluster_index, *lcu_index));
                out.push(*network_index);
                out.extend_from_slice(&kernel_done_count.to_le_bytes());
            }
            Action::Sleep { sleep_time_us } => {
                out.extend_from_slice(&sleep_time_us.to_le_bytes());
            }
            Action::Halt => {}
            Action::WaitForModuleConfigDone { module_index } => {
                out.push(*module_index);
            }
            Action::WaitForSequencerDone { sequencer_index } => {
                out.push(*sequencer_index);
            }
            Action::WriteDataCcw { .. } | Action::AllowInputDataflow { .. } | Action::None => {
                unreachable!("skipped variants return before the header is written")
            }
        }
        true
    }
}

/// Serialize an ordered action stream into the firmware's binary form.
///
/// A stream that emits nothing (empty, or all variants skipped) becomes
/// a single `Halt` at the start timestamp.
pub fn build_action_list<'a, I>(actions: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a Action>,
{
    let mut out = Vec::new();
    let mut timestamp = ACTION_LIST_START_TIMESTAMP;
    for action in actions {
        if action.serialize_into(timestamp, &mut out) {
            timestamp = timestamp.wrapping_sub(1);
        }
    }
    if out.is_empty() {
        Action::Halt.serialize_into(ACTION_LIST_START_TIMESTAMP, &mut out);
    }
    out
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The HEF's embedded protobuf message.
//!
//! Hand-written `prost` types; there is no generated code step. Proto
//! has no narrow integer types, so index- and count-like fields are
//! `u32` here and narrowed when the typed model is built.

/// Top-level message of the proto region.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoHef {
    /// Compiler-written header: architecture and SDK version.
    #[prost(message, optional, tag = "1")]
    pub header: ::core::option::Option<ProtoHefHeader>,
    /// The network groups, in execution order.
    #[prost(message, repeated, tag = "2")]
    pub network_groups: ::prost::alloc::vec::Vec<ProtoHefNetworkGroup>,
}

/// Compiler-written header of the message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoHefHeader {
    /// Device architecture the artifact was compiled for.
    #[prost(enumeration = "ProtoHwArch", tag = "1")]
    pub hw_arch: i32,
    /// SDK version string the compiler stamped.
    #[prost(string, tag = "2")]
    pub sdk_version: ::prost::alloc::string::String,
}

/// Device architectures a HEF can target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProtoHwArch {
    /// The Hailo-8.
    Hailo8 = 0,
    /// The Hailo-8P.
    Hailo8p = 1,
    /// The Hailo-8R.
    Hailo8r = 2,
    /// The Hailo-8L.
    Hailo8l = 3,
}

/// One network group.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoHefNetworkGroup {
    /// Name, index and performance metadata.
    #[prost(message, optional, tag = "1")]
    pub metadata: ::core::option::Option<ProtoHefNetworkGroupMetadata>,
    /// Operations run once, before the first dynamic context.
    #[prost(message, optional, tag = "2")]
    pub preliminary_config: ::core::option::Option<ProtoHefPreliminaryConfig>,
    /// The dynamic contexts, in execution order.
    #[prost(message, repeated, tag = "3")]
    pub contexts: ::prost::alloc::vec::Vec<ProtoHefContext>,
    /// Boundary and inter-context stream records.
    #[prost(message, repeated, tag = "4")]
    pub edge_layers: ::prost::alloc::vec::Vec<ProtoHefEdgeLayer>,
    /// NMS post-processing parameters, when the group ends in NMS.
    #[prost(message, optional, tag = "5")]
    pub nms_info: ::core::option::Option<ProtoHefNmsInfo>,
}

/// Network-group naming and performance metadata.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoHefNetworkGroupMetadata {
    /// Unique name of the group.
    #[prost(string, tag = "1")]
    pub network_group_name: ::prost::alloc::string::String,
    /// Index of the group within the HEF.
    #[prost(uint32, tag = "2")]
    pub network_group_index: u32,
    /// Frames per second of the group's bottleneck layer.
    #[prost(double, tag = "3")]
    pub bottleneck_fps: f64,
}

/// The preliminary operation stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoHefPreliminaryConfig {
    /// Operations in execution order.
    #[prost(message, repeated, tag = "1")]
    pub operations: ::prost::alloc::vec::Vec<ProtoHefOperation>,
}

/// One dynamic context.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoHefContext {
    /// Operations in execution order.
    #[prost(message, repeated, tag = "1")]
    pub operations: ::prost::alloc::vec::Vec<ProtoHefOperation>,
}

/// An ordered batch of actions.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoHefOperation {
    /// Actions in execution order.
    #[prost(message, repeated, tag = "1")]
    pub actions: ::prost::alloc::vec::Vec<ProtoHefAction>,
}

/// One firmware action in source form.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoHefAction {
    /// The concrete action.
    #[prost(
        oneof = "proto_hef_action::Action",
        tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14"
    )]
    pub action: ::core::option::Option<proto_hef_action::Action>,
}

/// Variants of [`ProtoHefAction`].
pub mod proto_hef_action {
    /// The concrete action carried by a [`super::ProtoHefAction`].
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Action {
        /// Configuration words routed through a config-stream DMA.
        #[prost(message, tag = "1")]
        WriteDataCcw(super::ProtoWriteDataCcw),
        /// Stop a logical compute unit.
        #[prost(message, tag = "2")]
        DisableLcu(super::ProtoDisableLcu),
        /// Start a logical compute unit.
        #[prost(message, tag = "3")]
        EnableLcu(super::ProtoEnableLcu),
        /// Explicit no-op.
        #[prost(message, tag = "4")]
        None(super::ProtoNoneAction),
        /// Open an input stream's dataflow.
        #[prost(message, tag = "5")]
        AllowInputDataflow(super::ProtoAllowInputDataflow),
        /// Kick a cluster's weight sequencer.
        #[prost(message, tag = "6")]
        TriggerSequencer(super::ProtoTriggerSequencer),
        /// Fetch config bursts on a config stream.
        #[prost(message, tag = "7")]
        FetchCcwBursts(super::ProtoFetchCcwBursts),
        /// Arm an NMS unit.
        #[prost(message, tag = "8")]
        EnableNms(super::ProtoEnableNms),
        /// Masked register write.
        #[prost(message, tag = "9")]
        WriteDataByType(super::ProtoWriteDataByType),
        /// Re-batch a running LCU.
        #[prost(message, tag = "10")]
        SwitchLcuBatch(super::ProtoSwitchLcuBatch),
        /// Stall the context for a fixed time.
        #[prost(message, tag = "11")]
        Sleep(super::ProtoSleep),
        /// End the context's action stream.
        #[prost(message, tag = "12")]
        Halt(super::ProtoHalt),
        /// Wait for a module-config-done interrupt.
        #[prost(message, tag = "13")]
        WaitForModuleConfigDone(super::ProtoWaitForModuleConfigDone),
        /// Wait for a sequencer-done interrupt.
        #[prost(message, tag = "14")]
        WaitForSequencerDone(super::ProtoWaitForSequencerDone),
    }
}

/// Payload of [`proto_hef_action::Action::WriteDataCcw`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoWriteDataCcw {
    /// Config stream the words belong to.
    #[prost(uint32, tag = "1")]
    pub config_stream_index: u32,
    /// The raw configuration words.
    #[prost(bytes = "vec", tag = "2")]
    pub data: ::prost::alloc::vec::Vec<u8>,
}

/// Payload of [`proto_hef_action::Action::DisableLcu`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoDisableLcu {
    /// Cluster of the unit.
    #[prost(uint32, tag = "1")]
    pub cluster_index: u32,
    /// Unit within the cluster.
    #[prost(uint32, tag = "2")]
    pub lcu_index: u32,
}

/// Payload of [`proto_hef_action::Action::EnableLcu`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoEnableLcu {
    /// Cluster of the unit.
    #[prost(uint32, tag = "1")]
    pub cluster_index: u32,
    /// Unit within the cluster.
    #[prost(uint32, tag = "2")]
    pub lcu_index: u32,
    /// Network the unit computes for.
    #[prost(uint32, tag = "3")]
    pub network_index: u32,
    /// Address the kernel-done counter is read from.
    #[prost(uint32, tag = "4")]
    pub kernel_done_address: u32,
    /// Kernel-done count that completes the unit.
    #[prost(uint32, tag = "5")]
    pub kernel_done_count: u32,
}

/// Payload of [`proto_hef_action::Action::None`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoNoneAction {}

/// Payload of [`proto_hef_action::Action::AllowInputDataflow`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoAllowInputDataflow {
    /// Compiler-assigned index of the input layer.
    #[prost(uint32, tag = "1")]
    pub sys_index: u32,
}

/// Payload of [`proto_hef_action::Action::TriggerSequencer`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoTriggerSequencer {
    /// Cluster whose sequencer fires.
    #[prost(uint32, tag = "1")]
    pub cluster_index: u32,
    /// Initial L3 cut the sequencer starts from.
    #[prost(uint32, tag = "2")]
    pub initial_l3_cut: u32,
    /// Offset within the initial L3 cut.
    #[prost(uint32, tag = "3")]
    pub initial_l3_offset: u32,
    /// Active APU bitmap.
    #[prost(uint32, tag = "4")]
    pub active_apu: u32,
    /// Active input-aligner bitmap.
    #[prost(uint32, tag = "5")]
    pub active_ia: u32,
    /// Active subcluster bitmap.
    #[prost(uint64, tag = "6")]
    pub active_sc: u64,
    /// Active L2 write bitmap.
    #[prost(uint64, tag = "7")]
    pub active_l2: u64,
    /// First L2 write offset.
    #[prost(uint64, tag = "8")]
    pub l2_offset_0: u64,
    /// Second L2 write offset.
    #[prost(uint64, tag = "9")]
    pub l2_offset_1: u64,
}

/// Payload of [`proto_hef_action::Action::FetchCcwBursts`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoFetchCcwBursts {
    /// Config stream to fetch on.
    #[prost(uint32, tag = "1")]
    pub config_stream_index: u32,
    /// Number of bursts to fetch.
    #[prost(uint32, tag = "2")]
    pub ccw_bursts: u32,
}

/// Payload of [`proto_hef_action::Action::EnableNms`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoEnableNms {
    /// NMS unit to arm.
    #[prost(uint32, tag = "1")]
    pub nms_unit_index: u32,
    /// Network the unit post-processes.
    #[prost(uint32, tag = "2")]
    pub network_index: u32,
    /// Detection classes.
    #[prost(uint32, tag = "3")]
    pub number_of_classes: u32,
    /// Boxes per output burst.
    #[prost(uint32, tag = "4")]
    pub burst_size: u32,
    /// Division factor over the class scores.
    #[prost(uint32, tag = "5")]
    pub division_factor: u32,
}

/// Payload of [`proto_hef_action::Action::WriteDataByType`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoWriteDataByType {
    /// Register address to write.
    #[prost(uint32, tag = "1")]
    pub address: u32,
    /// Interpretation of `data`.
    #[prost(uint32, tag = "2")]
    pub data_type: u32,
    /// The value to write.
    #[prost(uint32, tag = "3")]
    pub data: u32,
    /// Left shift applied before masking.
    #[prost(uint32, tag = "4")]
    pub shift: u32,
    /// Write mask.
    #[prost(uint32, tag = "5")]
    pub mask: u32,
    /// Network the write belongs to.
    #[prost(uint32, tag = "6")]
    pub network_index: u32,
}

/// Payload of [`proto_hef_action::Action::SwitchLcuBatch`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoSwitchLcuBatch {
    /// Cluster of the unit.
    #[prost(uint32, tag = "1")]
    pub cluster_index: u32,
    /// Unit within the cluster.
    #[prost(uint32, tag = "2")]
    pub lcu_index: u32,
    /// Network the unit computes for.
    #[prost(uint32, tag = "3")]
    pub network_index: u32,
    /// Kernel-done count for the new batch.
    #[prost(uint32, tag = "4")]
    pub kernel_done_count: u32,
}

/// Payload of [`proto_hef_action::Action::Sleep`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoSleep {
    /// Microseconds to stall.
    #[prost(uint32, tag = "1")]
    pub sleep_time_us: u32,
}

/// Payload of [`proto_hef_action::Action::Halt`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoHalt {}

/// Payload of [`proto_hef_action::Action::WaitForModuleConfigDone`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoWaitForModuleConfigDone {
    /// Module whose interrupt is awaited.
    #[prost(uint32, tag = "1")]
    pub module_index: u32,
}

/// Payload of [`proto_hef_action::Action::WaitForSequencerDone`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoWaitForSequencerDone {
    /// Sequencer whose interrupt is awaited.
    #[prost(uint32, tag = "1")]
    pub sequencer_index: u32,
}

/// One boundary or inter-context stream record.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoHefEdgeLayer {
    /// Stream name, unique within the group.
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    /// Which way the stream flows.
    #[prost(enumeration = "ProtoEdgeDirection", tag = "2")]
    pub direction: i32,
    /// Logical tensor shape.
    #[prost(message, optional, tag = "3")]
    pub shape: ::core::option::Option<ProtoHefShape>,
    /// Hardware-padded tensor shape.
    #[prost(message, optional, tag = "4")]
    pub hw_shape: ::core::option::Option<ProtoHefShape>,
    /// Bytes per tensor element.
    #[prost(uint32, tag = "5")]
    pub data_bytes: u32,
    /// In-memory ordering of the tensor.
    #[prost(enumeration = "ProtoFormatOrder", tag = "6")]
    pub format_order: i32,
    /// Per-tensor quantization, when the stream is quantized.
    #[prost(message, optional, tag = "7")]
    pub quant_info: ::core::option::Option<ProtoHefQuantInfo>,
}

/// Flow direction of an edge layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProtoEdgeDirection {
    /// Host writes, device reads.
    HostToDevice = 0,
    /// Device writes, host reads.
    DeviceToHost = 1,
}

/// In-memory tensor orderings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProtoFormatOrder {
    /// Compiler picks.
    Auto = 0,
    /// Height-width-channel rows.
    Nhwc = 1,
    /// Height-channel-width rows.
    Nhcw = 2,
    /// Channel-minor with rows padded to full features.
    Fcr = 3,
    /// Flat channel vector.
    Nc = 4,
    /// Raw Bayer pattern.
    Bayer = 5,
    /// NMS output records.
    HailoNms = 6,
}

/// Tensor shape as height, width and feature count.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoHefShape {
    /// Rows.
    #[prost(uint32, tag = "1")]
    pub height: u32,
    /// Columns.
    #[prost(uint32, tag = "2")]
    pub width: u32,
    /// Channels.
    #[prost(uint32, tag = "3")]
    pub features: u32,
}

/// Per-tensor quantization parameters.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoHefQuantInfo {
    /// Zero point.
    #[prost(float, tag = "1")]
    pub qp_zp: f32,
    /// Scale.
    #[prost(float, tag = "2")]
    pub qp_scale: f32,
    /// Minimum representable value.
    #[prost(float, tag = "3")]
    pub limvals_min: f32,
    /// Maximum representable value.
    #[prost(float, tag = "4")]
    pub limvals_max: f32,
}

/// NMS post-processing parameters of a network group.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoHefNmsInfo {
    /// Detection classes.
    #[prost(uint32, tag = "1")]
    pub number_of_classes: u32,
    /// Boxes per output burst.
    #[prost(uint32, tag = "2")]
    pub burst_size: u32,
    /// Division factor over the class scores.
    #[prost(uint32, tag = "3")]
    pub division_factor: u32,
    /// Upper bound on boxes kept per class.
    #[prost(uint32, tag = "4")]
    pub max_bboxes_per_class: u32,
}

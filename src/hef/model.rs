// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The typed HEF tree built from a validated artifact.

use std::{fs, io, path::Path};

use prost::Message;
use serde::{Deserialize, Serialize};

use crate::{
    hef::{
        action::Action,
        header::HefHeader,
        proto::{self, proto_hef_action},
    },
    result::{HailoError, HailoResult, ValidationError},
};

/// Device architectures a HEF can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceArchitecture {
    /// The Hailo-8.
    Hailo8,
    /// The Hailo-8P.
    Hailo8P,
    /// The Hailo-8R.
    Hailo8R,
    /// The Hailo-8L.
    Hailo8L,
}

/// Which way a stream flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamDirection {
    /// Host writes, device reads.
    HostToDevice,
    /// Device writes, host reads.
    DeviceToHost,
}

/// In-memory tensor orderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatOrder {
    /// Compiler picks.
    Auto,
    /// Height-width-channel rows.
    Nhwc,
    /// Height-channel-width rows.
    Nhcw,
    /// Channel-minor with rows padded to full features.
    Fcr,
    /// Flat channel vector.
    Nc,
    /// Raw Bayer pattern.
    Bayer,
    /// NMS output records.
    HailoNms,
}

/// Tensor shape as height, width and feature count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Shape {
    /// Rows.
    pub height: u32,
    /// Columns.
    pub width: u32,
    /// Channels.
    pub features: u32,
}

/// Per-tensor quantization parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantInfo {
    /// Scale.
    pub scale: f32,
    /// Zero point.
    pub zero_point: f32,
    /// Minimum representable value.
    pub min: f32,
    /// Maximum representable value.
    pub max: f32,
}

/// One stream of a network group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Stream name, unique within the group.
    pub name: String,
    /// Which way the stream flows.
    pub direction: StreamDirection,
    /// Logical tensor shape.
    pub shape: Shape,
    /// Hardware-padded tensor shape.
    pub hw_shape: Shape,
    /// Bytes per tensor element.
    pub data_bytes: u32,
    /// In-memory ordering of the tensor.
    pub format_order: FormatOrder,
    /// Per-tensor quantization, when the stream is quantized.
    pub quant: Option<QuantInfo>,
    /// True for inter-context streams that never face the user.
    pub internal: bool,
}

/// NMS post-processing parameters of a network group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NmsMetadata {
    /// Detection classes.
    pub number_of_classes: u32,
    /// Boxes per output burst.
    pub burst_size: u32,
    /// Division factor over the class scores.
    pub division_factor: u32,
    /// Upper bound on boxes kept per class.
    pub max_bboxes_per_class: u32,
}

/// The four firmware execution phases of a network group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextCategory {
    /// Runs when the group is activated.
    Activation,
    /// Runs on a batch switch.
    BatchSwitching,
    /// Runs once before the first dynamic context.
    Preliminary,
    /// A regular execution phase.
    Dynamic,
}

/// An ordered batch of actions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Operation {
    /// Actions in execution order.
    pub actions: Vec<Action>,
}

/// One firmware execution phase: an ordered list of operations.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextInfo {
    /// Which phase this is.
    pub category: ContextCategory,
    /// Operations in execution order.
    pub operations: Vec<Operation>,
}

impl ContextInfo {
    /// An empty context of the given category.
    pub fn empty(category: ContextCategory) -> ContextInfo {
        ContextInfo {
            category,
            operations: Vec::new(),
        }
    }

    /// Serialize this context's actions into the firmware's binary
    /// form. An empty context yields a single halt.
    pub fn action_list(&self) -> Vec<u8> {
        super::action::build_action_list(
            self.operations.iter().flat_map(|op| op.actions.iter()),
        )
    }
}

/// One network group of a parsed HEF.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkGroupInfo {
    /// Unique name of the group.
    pub name: String,
    /// Frames per second of the group's bottleneck layer.
    pub bottleneck_fps: f64,
    /// Every stream record, internal ones included.
    pub streams: Vec<StreamInfo>,
    /// Synthesized empty unless the HEF carries activation operations.
    pub activation_context: ContextInfo,
    /// Synthesized empty unless the HEF carries batch-switch operations.
    pub batch_switching_context: ContextInfo,
    /// Operations run once, before the first dynamic context.
    pub preliminary_context: Option<ContextInfo>,
    /// The dynamic contexts, in execution order.
    pub dynamic_contexts: Vec<ContextInfo>,
    /// NMS post-processing parameters, when the group ends in NMS.
    pub nms: Option<NmsMetadata>,
}

impl NetworkGroupInfo {
    /// User-facing input streams, inter-context streams excluded.
    pub fn input_streams(&self) -> Vec<&StreamInfo> {
        self.streams
            .iter()
            .filter(|s| !s.internal && s.direction == StreamDirection::HostToDevice)
            .collect()
    }

    /// User-facing output streams, inter-context streams excluded.
    pub fn output_streams(&self) -> Vec<&StreamInfo> {
        self.streams
            .iter()
            .filter(|s| !s.internal && s.direction == StreamDirection::DeviceToHost)
            .collect()
    }

    /// Streams that only carry data between contexts.
    pub fn internal_streams(&self) -> Vec<&StreamInfo> {
        self.streams.iter().filter(|s| s.internal).collect()
    }
}

/// A parsed, immutable HEF artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Hef {
    header: HefHeader,
    architecture: DeviceArchitecture,
    network_groups: Vec<NetworkGroupInfo>,
}

impl Hef {
    /// Parse and validate an in-memory HEF.
    pub fn parse(bytes: &[u8]) -> HailoResult<Hef> {
        let header = HefHeader::parse(bytes)?;
        header.verify_integrity(bytes)?;

        let start = header.header_size();
        let end = start + header.proto_length as usize;
        let proto = proto::ProtoHef::decode(&bytes[start..end])
            .map_err(|err| ValidationError::Proto(err.to_string()))?;

        Self::from_proto(header, proto)
    }

    /// Read and parse a HEF from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> HailoResult<Hef> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => HailoError::NotFound(path.display().to_string()),
            _ => HailoError::Io(err.to_string()),
        })?;
        let hef = Self::parse(&bytes)?;
        debug!(
            "Parsed {} ({:?}, {} network groups)",
            path.display(),
            hef.architecture,
            hef.network_groups.len()
        );
        Ok(hef)
    }

    fn from_proto(header: HefHeader, proto: proto::ProtoHef) -> HailoResult<Hef> {
        let hw_arch = proto
            .header
            .as_ref()
            .and_then(|h| proto::ProtoHwArch::try_from(h.hw_arch).ok())
            .unwrap_or(proto::ProtoHwArch::Hailo8);
        let architecture = match hw_arch {
            proto::ProtoHwArch::Hailo8 => DeviceArchitecture::Hailo8,
            proto::ProtoHwArch::Hailo8p => DeviceArchitecture::Hailo8P,
            proto::ProtoHwArch::Hailo8r => DeviceArchitecture::Hailo8R,
            proto::ProtoHwArch::Hailo8l => DeviceArchitecture::Hailo8L,
        };

        let network_groups = proto
            .network_groups
            .into_iter()
            .map(network_group_from_proto)
            .collect::<HailoResult<Vec<_>>>()?;

        Ok(Hef {
            header,
            architecture,
            network_groups,
        })
    }

    /// The validated on-disk header.
    pub fn header(&self) -> &HefHeader {
        &self.header
    }

    /// Architecture the artifact was compiled for.
    pub fn architecture(&self) -> DeviceArchitecture {
        self.architecture
    }

    /// The network groups, in file order.
    pub fn network_groups(&self) -> &[NetworkGroupInfo] {
        &self.network_groups
    }

    /// Look a network group up by name.
    pub fn network_group(&self, name: &str) -> Option<&NetworkGroupInfo> {
        self.network_groups.iter().find(|g| g.name == name)
    }
}

/// Whether a stream name follows the inter-context convention
/// `context_<N>_to_context_<M>`.
fn is_inter_context_name(name: &str) -> bool {
    let Some(rest) = name.strip_prefix("context_") else {
        return false;
    };
    let Some((src, dst)) = rest.split_once("_to_context_") else {
        return false;
    };
    !src.is_empty()
        && !dst.is_empty()
        && src.bytes().all(|b| b.is_ascii_digit())
        && dst.bytes().all(|b| b.is_ascii_digit())
}

fn shape_from_proto(shape: Option<proto::ProtoHefShape>) -> Shape {
    shape
        .map(|s| Shape {
            height: s.height,
            width: s.width,
            features: s.features,
        })
        .unwrap_or_default()
}

fn stream_from_proto(edge: proto::ProtoHefEdgeLayer) -> StreamInfo {
    let direction = match proto::ProtoEdgeDirection::try_from(edge.direction) {
        Ok(proto::ProtoEdgeDirection::DeviceToHost) => StreamDirection::DeviceToHost,
        _ => StreamDirection::HostToDevice,
    };
    let format_order = match proto::ProtoFormatOrder::try_from(edge.format_order) {
        Ok(proto::ProtoFormatOrder::Nhwc) => FormatOrder::Nhwc,
        Ok(proto::ProtoFormatOrder::Nhcw) => FormatOrder::Nhcw,
        Ok(proto::ProtoFormatOrder::Fcr) => FormatOrder::Fcr,
        Ok(proto::ProtoFormatOrder::Nc) => FormatOrder::Nc,
        Ok(proto::ProtoFormatOrder::Bayer) => FormatOrder::Bayer,
        Ok(proto::ProtoFormatOrder::HailoNms) => FormatOrder::HailoNms,
        _ => FormatOrder::Auto,
    };
    let internal = is_inter_context_name(&edge.name);
    StreamInfo {
        internal,
        name: edge.name,
        direction,
        shape: shape_from_proto(edge.shape),
        hw_shape: shape_from_proto(edge.hw_shape),
        data_bytes: edge.data_bytes,
        format_order,
        quant: edge.quant_info.map(|q| QuantInfo {
            scale: q.qp_scale,
            zero_point: q.qp_zp,
            min: q.limvals_min,
            max: q.limvals_max,
        }),
    }
}

fn action_from_proto(action: proto::ProtoHefAction) -> Action {
    use proto_hef_action::Action as P;
    match action.action {
        Some(P::WriteDataCcw(a)) => Action::WriteDataCcw {
            config_stream_index: a.config_stream_index as u8,
            data: a.data,
        },
        Some(P::DisableLcu(a)) => Action::DisableLcu {
            cluster_index: a.cluster_index as u8,
            lcu_index: a.lcu_index as u8,
        },
        Some(P::EnableLcu(a)) => Action::EnableLcu {
            cluster_index: a.cluster_index as u8,
            lcu_index: a.lcu_index as u8,
            network_index: a.network_index as u8,
            kernel_done_address: a.kernel_done_address as u16,
            kernel_done_count: a.kernel_done_count,
        },
        Some(P::AllowInputDataflow(a)) => Action::AllowInputDataflow {
            sys_index: a.sys_index as u8,
        },
        Some(P::TriggerSequencer(a)) => Action::TriggerSequencer {
            cluster_index: a.cluster_index as u8,
            config: super::action::SequencerConfig {
                initial_l3_cut: a.initial_l3_cut as u8,
                initial_l3_offset: a.initial_l3_offset as u16,
                active_apu: a.active_apu,
                active_ia: a.active_ia,
                active_sc: a.active_sc,
                active_l2: a.active_l2,
                l2_offset_0: a.l2_offset_0,
                l2_offset_1: a.l2_offset_1,
            },
        },
        Some(P::FetchCcwBursts(a)) => Action::FetchCcwBursts {
            ccw_bursts: a.ccw_bursts as u16,
            config_stream_index: a.config_stream_index as u8,
        },
        Some(P::EnableNms(a)) => Action::EnableNms {
            nms_unit_index: a.nms_unit_index as u8,
            network_index: a.network_index as u8,
            number_of_classes: a.number_of_classes as u16,
            burst_size: a.burst_size as u16,
            division_factor: a.division_factor as u8,
        },
        Some(P::WriteDataByType(a)) => Action::WriteDataByType {
            address: a.address,
            data_type: a.data_type as u8,
            data: a.data,
            shift: a.shift as u8,
            mask: a.mask,
            network_index: a.network_index as u8,
        },
        Some(P::SwitchLcuBatch(a)) => Action::SwitchLcuBatch {
            cluster_index: a.cluster_index as u8,
            lcu_index: a.lcu_index as u8,
            network_index: a.network_index as u8,
            kernel_done_count: a.kernel_done_count,
        },
        Some(P::Sleep(a)) => Action::Sleep {
            sleep_time_us: a.sleep_time_us,
        },
        Some(P::Halt(_)) => Action::Halt,
        Some(P::WaitForModuleConfigDone(a)) => Action::WaitForModuleConfigDone {
            module_index: a.module_index as u8,
        },
        Some(P::WaitForSequencerDone(a)) => Action::WaitForSequencerDone {
            sequencer_index: a.sequencer_index as u8,
        },
        Some(P::None(_)) | None => Action::None,
    }
}

fn operations_from_proto(operations: Vec<proto::ProtoHefOperation>) -> Vec<Operation> {
    operations
        .into_iter()
        .map(|op| Operation {
            actions: op.actions.into_iter().map(action_from_proto).collect(),
        })
        .collect()
}

fn network_group_from_proto(
    group: proto::ProtoHefNetworkGroup,
) -> HailoResult<NetworkGroupInfo> {
    let (name, bottleneck_fps) = group
        .metadata
        .map(|m| (m.network_group_name, m.bottleneck_fps))
        .unwrap_or_default();

    let streams: Vec<StreamInfo> = group
        .edge_layers
        .into_iter()
        .map(stream_from_proto)
        .collect();
    for (i, stream) in streams.iter().enumerate() {
        if streams[..i].iter().any(|other| other.name == stream.name) {
            return Err(ValidationError::DuplicateStreamName(stream.name.clone()).into());
        }
    }

    let preliminary_context = group.preliminary_config.map(|config| ContextInfo {
        category: ContextCategory::Preliminary,
        operations: operations_from_proto(config.operations),
    });

    let dynamic_contexts = group
        .contexts
        .into_iter()
        .map(|ctx| ContextInfo {
            category: ContextCategory::Dynamic,
            operations: operations_from_proto(ctx.operations),
        })
        .collect();

    Ok(NetworkGroupInfo {
        name,
        bottleneck_fps,
        streams,
        activation_context: ContextInfo::empty(ContextCategory::Activation),
        batch_switching_context: ContextInfo::empty(ContextCategory::BatchSwitching),
        preliminary_context,
        dynamic_contexts,
        nms: group.nms_info.map(|nms| NmsMetadata {
            number_of_classes: nms.number_of_classes,
            burst_size: nms.burst_size,
            division_factor: nms.division_factor,
            max_bboxes_per_class: nms.max_bboxes_per_class,
        }),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::testing;

    #[test]
    fn inter_context_names_follow_the_convention() {
        assert!(is_inter_context_name("context_0_to_context_1"));
        assert!(is_inter_context_name("context_12_to_context_3"));
        assert!(!is_inter_context_name("input_layer_1"));
        assert!(!is_inter_context_name("context_a_to_context_1"));
        assert!(!is_inter_context_name("context__to_context_1"));
        assert!(!is_inter_context_name("context_1_to_context_"));
        assert!(!is_inter_context_name("precontext_1_to_context_2"));
    }

    #[test]
    fn parses_a_complete_v2_artifact() {
        testing::init_logger();
        let file = testing::sample_hef_bytes();
        let hef = Hef::parse(&file).unwrap();

        assert_eq!(hef.architecture(), DeviceArchitecture::Hailo8);
        assert_eq!(hef.network_groups().len(), 1);

        let group = hef.network_group("resnet50").unwrap();
        assert_eq!(group.bottleneck_fps, 480.0);
        assert_eq!(group.dynamic_contexts.len(), 2);
        assert!(group.preliminary_context.is_some());

        let inputs = group.input_streams();
        let outputs = group.output_streams();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].name, "input_layer_1");
        assert_eq!(inputs[0].shape.height, 224);
        assert_eq!(inputs[0].hw_shape.features, 4);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].quant.map(|q| q.scale), Some(0.125));
        // The inter-context stream stays off the user-facing lists.
        assert_eq!(group.internal_streams().len(), 1);
        assert_eq!(group.streams.len(), 3);
    }

    #[test]
    fn duplicate_stream_names_are_rejected() {
        let mut proto = testing::sample_proto_hef();
        let dup = proto.network_groups[0].edge_layers[0].clone();
        proto.network_groups[0].edge_layers.push(dup);
        let file = testing::hef_v2_bytes(&proto);
        assert_matches!(
            Hef::parse(&file),
            Err(HailoError::Validation(
                ValidationError::DuplicateStreamName(_)
            ))
        );
    }

    #[test]
    fn garbage_proto_is_rejected() {
        let file = testing::hef_v2_raw(&[0xffu8; 64]);
        assert_matches!(
            Hef::parse(&file),
            Err(HailoError::Validation(ValidationError::Proto(_)))
        );
    }

    #[test]
    fn activation_and_batch_switching_contexts_are_synthesized_empty() {
        let hef = Hef::parse(&testing::sample_hef_bytes()).unwrap();
        let group = &hef.network_groups()[0];
        assert!(group.activation_context.operations.is_empty());
        assert_eq!(
            group.activation_context.category,
            ContextCategory::Activation
        );
        assert!(group.batch_switching_context.operations.is_empty());
        // Empty contexts still serialize to a single halt.
        assert_eq!(
            group.activation_context.action_list(),
            [0x2c, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn header_round_trips_through_the_parsed_artifact() {
        let file = testing::sample_hef_bytes();
        let hef = Hef::parse(&file).unwrap();
        let header_size = hef.header().header_size();
        assert_eq!(hef.header().serialize(), file[..header_size]);
    }
}

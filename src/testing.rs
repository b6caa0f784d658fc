// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Shared helpers for the test modules: a scripted control transport
//! and canned HEF artifacts.

use std::{
    collections::VecDeque,
    sync::Mutex,
    time::Duration,
};

use prost::Message;
use xxhash_rust::xxh3::xxh3_64;

use crate::{
    control::{
        frame::{Request, Response, ResponseHeader, CONTROL_PROTOCOL_VERSION},
        ControlTransport, CpuId,
    },
    core::errors,
    hef::{
        header::{HefDigest, HefHeader, HefVersion},
        proto, Action, ContextCategory, ContextInfo, NetworkGroupInfo, Operation, QuantInfo,
        SequencerConfig, Shape, StreamDirection, StreamInfo,
    },
    result::{HailoError, HailoResult},
};

/// Initialize logging for a test; safe to call repeatedly.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One request as the mock transport saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// The parsed request frame.
    pub request: Request,
    /// Processor it was addressed to.
    pub cpu: CpuId,
}

/// A scripted reply for [`MockTransport`].
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Success with an empty payload.
    Ok,
    /// Success with the given payload.
    Payload(Vec<u8>),
    /// Firmware rejection with the given status words.
    Status {
        /// Major status word.
        major: u32,
        /// Minor status word.
        minor: u32,
    },
    /// The kernel timed out waiting for the firmware.
    DriverTimeout,
}

/// A control transport that records every request and answers from a
/// scripted queue. An empty queue echoes success.
pub struct MockTransport {
    requests: Mutex<Vec<RecordedRequest>>,
    replies: Mutex<VecDeque<MockReply>>,
}

impl MockTransport {
    /// A transport with no scripted replies.
    pub fn new() -> MockTransport {
        MockTransport {
            requests: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue the reply for the next request.
    pub fn push_reply(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Every request executed so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ControlTransport for MockTransport {
    fn execute(&self, raw: &[u8], cpu: CpuId, _timeout: Duration) -> HailoResult<Vec<u8>> {
        let request = Request::parse(raw)?;
        self.requests.lock().unwrap().push(RecordedRequest {
            request: request.clone(),
            cpu,
        });

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MockReply::Ok);
        let (major, minor, payload) = match reply {
            MockReply::Ok => (0, 0, Vec::new()),
            MockReply::Payload(payload) => (0, 0, payload),
            MockReply::Status { major, minor } => (major, minor, Vec::new()),
            MockReply::DriverTimeout => {
                return Err(HailoError::Driver(errors::Error::Timeout))
            }
        };
        let response = Response {
            header: ResponseHeader {
                version: CONTROL_PROTOCOL_VERSION,
                flags: 0,
                sequence: request.sequence,
                opcode: request.opcode,
                major_status: major,
                minor_status: minor,
            },
            payload,
        };
        Ok(response.pack())
    }
}

/// Wrap raw proto bytes in a valid v2 artifact.
pub fn hef_v2_raw(proto_bytes: &[u8]) -> Vec<u8> {
    let header = HefHeader {
        version: HefVersion::V2,
        proto_length: proto_bytes.len() as u32,
        digest: HefDigest::Xxh3 {
            hash: xxh3_64(proto_bytes),
            ccws_size: 0,
        },
    };
    let mut file = header.serialize();
    file.extend_from_slice(proto_bytes);
    file
}

/// Encode a proto message into a valid v2 artifact.
pub fn hef_v2_bytes(proto: &proto::ProtoHef) -> Vec<u8> {
    hef_v2_raw(&proto.encode_to_vec())
}

/// A small but complete proto: one group, two dynamic contexts, a
/// preliminary config, three edge layers (one inter-context) and NMS
/// metadata.
pub fn sample_proto_hef() -> proto::ProtoHef {
    proto::ProtoHef {
        header: Some(proto::ProtoHefHeader {
            hw_arch: proto::ProtoHwArch::Hailo8 as i32,
            sdk_version: "3.27.0".to_string(),
        }),
        network_groups: vec![proto::ProtoHefNetworkGroup {
            metadata: Some(proto::ProtoHefNetworkGroupMetadata {
                network_group_name: "resnet50".to_string(),
                network_group_index: 0,
                bottleneck_fps: 480.0,
            }),
            preliminary_config: Some(proto::ProtoHefPreliminaryConfig {
                operations: vec![proto::ProtoHefOperation {
                    actions: vec![
                        proto_action(proto::proto_hef_action::Action::WriteDataCcw(
                            proto::ProtoWriteDataCcw {
                                config_stream_index: 0,
                                data: vec![0xcc; 16],
                            },
                        )),
                        proto_action(proto::proto_hef_action::Action::FetchCcwBursts(
                            proto::ProtoFetchCcwBursts {
                                config_stream_index: 0,
                                ccw_bursts: 4,
                            },
                        )),
                    ],
                }],
            }),
            contexts: vec![
                proto::ProtoHefContext {
                    operations: vec![proto::ProtoHefOperation {
                        actions: vec![
                            proto_action(proto::proto_hef_action::Action::EnableLcu(
                                proto::ProtoEnableLcu {
                                    cluster_index: 2,
                                    lcu_index: 5,
                                    network_index: 0,
                                    kernel_done_address: 1,
                                    kernel_done_count: 2,
                                },
                            )),
                            proto_action(proto::proto_hef_action::Action::TriggerSequencer(
                                proto::ProtoTriggerSequencer {
                                    cluster_index: 2,
                                    initial_l3_cut: 1,
                                    initial_l3_offset: 0,
                                    active_apu: 1,
                                    active_ia: 1,
                                    active_sc: 3,
                                    active_l2: 3,
                                    l2_offset_0: 0,
                                    l2_offset_1: 0,
                                },
                            )),
                        ],
                    }],
                },
                proto::ProtoHefContext {
                    operations: vec![proto::ProtoHefOperation {
                        actions: vec![
                            proto_action(proto::proto_hef_action::Action::DisableLcu(
                                proto::ProtoDisableLcu {
                                    cluster_index: 2,
                                    lcu_index: 5,
                                },
                            )),
                            proto_action(proto::proto_hef_action::Action::Halt(
                                proto::ProtoHalt {},
                            )),
                        ],
                    }],
                },
            ],
            edge_layers: vec![
                proto::ProtoHefEdgeLayer {
                    name: "input_layer_1".to_string(),
                    direction: proto::ProtoEdgeDirection::HostToDevice as i32,
                    shape: Some(proto::ProtoHefShape {
                        height: 224,
                        width: 224,
                        features: 3,
                    }),
                    hw_shape: Some(proto::ProtoHefShape {
                        height: 224,
                        width: 224,
                        features: 4,
                    }),
                    data_bytes: 1,
                    format_order: proto::ProtoFormatOrder::Nhwc as i32,
                    quant_info: None,
                },
                proto::ProtoHefEdgeLayer {
                    name: "output_layer_1".to_string(),
                    direction: proto::ProtoEdgeDirection::DeviceToHost as i32,
                    shape: Some(proto::ProtoHefShape {
                        height: 1,
                        width: 1,
                        features: 1000,
                    }),
                    hw_shape: Some(proto::ProtoHefShape {
                        height: 1,
                        width: 1,
                        features: 1024,
                    }),
                    data_bytes: 1,
                    format_order: proto::ProtoFormatOrder::Nc as i32,
                    quant_info: Some(proto::ProtoHefQuantInfo {
                        qp_zp: 0.0,
                        qp_scale: 0.125,
                        limvals_min: 0.0,
                        limvals_max: 31.875,
                    }),
                },
                proto::ProtoHefEdgeLayer {
                    name: "context_0_to_context_1".to_string(),
                    direction: proto::ProtoEdgeDirection::DeviceToHost as i32,
                    shape: Some(proto::ProtoHefShape {
                        height: 28,
                        width: 28,
                        features: 256,
                    }),
                    hw_shape: Some(proto::ProtoHefShape {
                        height: 28,
                        width: 28,
                        features: 256,
                    }),
                    data_bytes: 1,
                    format_order: proto::ProtoFormatOrder::Nhcw as i32,
                    quant_info: None,
                },
            ],
            nms_info: Some(proto::ProtoHefNmsInfo {
                number_of_classes: 80,
                burst_size: 4,
                division_factor: 1,
                max_bboxes_per_class: 100,
            }),
        }],
    }
}

fn proto_action(action: proto::proto_hef_action::Action) -> proto::ProtoHefAction {
    proto::ProtoHefAction {
        action: Some(action),
    }
}

/// [`sample_proto_hef`] wrapped in a valid v2 artifact.
pub fn sample_hef_bytes() -> Vec<u8> {
    hef_v2_bytes(&sample_proto_hef())
}

/// The typed equivalent of [`sample_proto_hef`]'s network group.
pub fn sample_network_group() -> NetworkGroupInfo {
    NetworkGroupInfo {
        name: "resnet50".to_string(),
        bottleneck_fps: 480.0,
        streams: vec![
            StreamInfo {
                name: "input_layer_1".to_string(),
                direction: StreamDirection::HostToDevice,
                shape: Shape {
                    height: 224,
                    width: 224,
                    features: 3,
                },
                hw_shape: Shape {
                    height: 224,
                    width: 224,
                    features: 4,
                },
                data_bytes: 1,
                format_order: crate::hef::FormatOrder::Nhwc,
                quant: None,
                internal: false,
            },
            StreamInfo {
                name: "output_layer_1".to_string(),
                direction: StreamDirection::DeviceToHost,
                shape: Shape {
                    height: 1,
                    width: 1,
                    features: 1000,
                },
                hw_shape: Shape {
                    height: 1,
                    width: 1,
                    features: 1024,
                },
                data_bytes: 1,
                format_order: crate::hef::FormatOrder::Nc,
                quant: Some(QuantInfo {
                    scale: 0.125,
                    zero_point: 0.0,
                    min: 0.0,
                    max: 31.875,
                }),
                internal: false,
            },
        ],
        activation_context: ContextInfo::empty(ContextCategory::Activation),
        batch_switching_context: ContextInfo::empty(ContextCategory::BatchSwitching),
        preliminary_context: Some(ContextInfo {
            category: ContextCategory::Preliminary,
            operations: vec![Operation {
                actions: vec![
                    Action::WriteDataCcw {
                        config_stream_index: 0,
                        data: vec![0xcc; 16],
                    },
                    Action::FetchCcwBursts {
                        ccw_bursts: 4,
                        config_stream_index: 0,
                    },
                ],
            }],
        }),
        dynamic_contexts: vec![
            ContextInfo {
                category: ContextCategory::Dynamic,
                operations: vec![Operation {
                    actions: vec![
                        Action::EnableLcu {
                            cluster_index: 2,
                            lcu_index: 5,
                            network_index: 0,
                            kernel_done_address: 1,
                            kernel_done_count: 2,
                        },
                        Action::TriggerSequencer {
                            cluster_index: 2,
                            config: SequencerConfig {
                                initial_l3_cut: 1,
                                initial_l3_offset: 0,
                                active_apu: 1,
                                active_ia: 1,
                                active_sc: 3,
                                active_l2: 3,
                                l2_offset_0: 0,
                                l2_offset_1: 0,
                            },
                        },
                    ],
                }],
            },
            ContextInfo {
                category: ContextCategory::Dynamic,
                operations: vec![Operation {
                    actions: vec![
                        Action::DisableLcu {
                            cluster_index: 2,
                            lcu_index: 5,
                        },
                        Action::Halt,
                    ],
                }],
            },
        ],
        nms: None,
    }
}

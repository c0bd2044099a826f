//! End-to-end tests over the built-in node types

use flowgraph::pipeline::nodes::{box_filter, keypoints, matcher, statistics, test_pattern, threshold};
use flowgraph::pipeline::{
    EnumValue, FlowDataType, Graph, NodeId, NodeTypeRegistry, PipelineError, PropertyValue,
    SocketAddress, SocketId, Status,
};
use std::sync::Arc;

fn graph() -> Graph {
    Graph::new(Arc::new(NodeTypeRegistry::new()))
}

fn link(graph: &mut Graph, from: NodeId, out: u8, to: NodeId, input: u8) {
    graph
        .link_nodes(SocketAddress::output(from, out), SocketAddress::input(to, input))
        .unwrap();
}

fn small_source(graph: &mut Graph) -> NodeId {
    let source = graph
        .create_node_by_type_name(test_pattern::TYPE_NAME, "Source")
        .unwrap();
    graph
        .set_node_property(source, test_pattern::WIDTH, PropertyValue::Int(32))
        .unwrap();
    graph
        .set_node_property(source, test_pattern::HEIGHT, PropertyValue::Int(16))
        .unwrap();
    source
}

#[test]
fn test_catalog_contains_builtins() {
    let registry = NodeTypeRegistry::new();
    let names: Vec<String> = registry.iter().map(|info| info.type_name).collect();
    for name in [
        test_pattern::TYPE_NAME,
        box_filter::TYPE_NAME,
        threshold::TYPE_NAME,
        keypoints::DETECTOR_TYPE_NAME,
        keypoints::DESCRIBER_TYPE_NAME,
        matcher::TYPE_NAME,
        statistics::TYPE_NAME,
    ] {
        assert!(names.iter().any(|n| n == name), "{} not registered", name);
    }
    let id = registry.type_id(box_filter::TYPE_NAME);
    assert_eq!(registry.default_node_name(id), Some("Box filter"));
    assert!(registry.description(id).is_some());
}

#[test]
fn test_image_chain_produces_outputs() {
    let mut graph = graph();
    let source = small_source(&mut graph);
    let blur = graph
        .create_node_by_type_name(box_filter::TYPE_NAME, "Blur")
        .unwrap();
    let segment = graph
        .create_node_by_type_name(threshold::TYPE_NAME, "Threshold")
        .unwrap();
    let stats = graph
        .create_node_by_type_name(statistics::TYPE_NAME, "Stats")
        .unwrap();
    link(&mut graph, source, 0, blur, 0);
    link(&mut graph, blur, 0, segment, 0);
    link(&mut graph, segment, 0, stats, 0);

    let report = graph.step().unwrap();
    assert_eq!(report.executed, vec![source, blur, segment, stats]);
    assert_eq!(report.errors, 0);

    let binary = graph
        .output_socket(segment, SocketId(0))
        .unwrap()
        .as_image_mono()
        .unwrap();
    assert_eq!((binary.width, binary.height), (32, 16));
    assert!(binary.data.iter().all(|&v| v == 0 || v == 255));

    let status = graph.last_status(stats).unwrap();
    assert_eq!(status.status, Status::Ok);
    assert!(status.message.contains("min 0, max 255"));
}

#[test]
fn test_source_is_auto_tagged_every_pass() {
    let mut graph = graph();
    let source = small_source(&mut graph);
    let blur = graph
        .create_node_by_type_name(box_filter::TYPE_NAME, "Blur")
        .unwrap();
    link(&mut graph, source, 0, blur, 0);
    assert!(!graph.is_stateless());

    graph.step().unwrap();
    assert_eq!(graph.tagged(), &[source]);
    let first = graph.output_socket(blur, SocketId(0)).unwrap().clone();

    let report = graph.step().unwrap();
    assert_eq!(report.executed, vec![source, blur]);
    assert_ne!(graph.output_socket(blur, SocketId(0)).unwrap(), &first);

    graph.restart_nodes();
    graph.step().unwrap();
    assert_eq!(graph.output_socket(blur, SocketId(0)).unwrap(), &first);
}

#[test]
fn test_matching_an_image_against_itself() {
    let mut graph = graph();
    let source = small_source(&mut graph);
    graph
        .set_node_property(source, test_pattern::PATTERN, PropertyValue::Enum(EnumValue(1)))
        .unwrap();
    let query = graph
        .create_node_by_type_name(keypoints::DESCRIBER_TYPE_NAME, "Query")
        .unwrap();
    let train = graph
        .create_node_by_type_name(keypoints::DESCRIBER_TYPE_NAME, "Train")
        .unwrap();
    let pairs = graph
        .create_node_by_type_name(matcher::TYPE_NAME, "Matcher")
        .unwrap();
    graph
        .set_node_property(pairs, matcher::RATIO, PropertyValue::Double(1.0))
        .unwrap();
    link(&mut graph, source, 0, query, 0);
    link(&mut graph, source, 0, train, 0);
    link(&mut graph, query, 0, pairs, 0);
    link(&mut graph, query, 1, pairs, 1);
    link(&mut graph, train, 0, pairs, 2);
    link(&mut graph, train, 1, pairs, 3);

    let report = graph.step().unwrap();
    assert_eq!(report.errors, 0);
    assert_eq!(report.executed.last(), Some(&pairs));

    let found = graph
        .output_socket(query, SocketId(0))
        .unwrap()
        .as_keypoints()
        .unwrap()
        .points
        .len();
    assert!(found > 0);
    let matches = graph
        .output_socket(pairs, SocketId(0))
        .unwrap()
        .as_matches()
        .unwrap();
    assert_eq!(matches.len(), found);
}

#[test]
fn test_invalid_property_leaves_value() {
    let mut graph = graph();
    let segment = graph
        .create_node_by_type_name(threshold::TYPE_NAME, "Threshold")
        .unwrap();
    graph.step().unwrap();

    let err = graph
        .set_node_property(segment, threshold::THRESHOLD, PropertyValue::Int(300))
        .unwrap_err();
    assert_eq!(err, PipelineError::PropertyRejected(threshold::THRESHOLD));
    assert_eq!(
        graph.node_property(segment, threshold::THRESHOLD).unwrap(),
        PropertyValue::Int(128)
    );
    assert!(graph.tagged().is_empty());
}

#[test]
fn test_wrong_payload_reports_error_and_pass_continues() {
    let mut graph = graph();
    let source = small_source(&mut graph);
    // Keypoints into a mono-image input.
    let detect = graph
        .create_node_by_type_name(keypoints::DETECTOR_TYPE_NAME, "Detect")
        .unwrap();
    let segment = graph
        .create_node_by_type_name(threshold::TYPE_NAME, "Threshold")
        .unwrap();
    let stats = graph
        .create_node_by_type_name(statistics::TYPE_NAME, "Stats")
        .unwrap();
    link(&mut graph, source, 0, detect, 0);
    link(&mut graph, detect, 0, segment, 0);
    link(&mut graph, source, 0, stats, 0);

    let report = graph.step().unwrap();
    assert_eq!(report.errors, 1);
    assert_eq!(report.executed.len(), 4);
    assert!(graph.last_status(segment).unwrap().is_error());
    assert_eq!(graph.last_status(stats).unwrap().status, Status::Ok);
    assert_eq!(
        graph.node_config(segment).unwrap().inputs[0].flow_type,
        FlowDataType::ImageMono
    );
}

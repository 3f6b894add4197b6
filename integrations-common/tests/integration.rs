//! Integration tests for the integrations-common library.

use integrations_common::{
    Format, KeyExprBuilder, MetricSample, MetricType, ServiceCheck, ServiceCheckStatus, decode,
    encode,
};

#[test]
fn test_full_submission_workflow() {
    let sample = MetricSample::new("snmp", "snmp.ifInOctets", MetricType::Rate, 1234.0)
        .with_tags(["snmp_device:192.168.1.1", "interface:eth0"]);

    let json_bytes = encode(&sample, Format::Json).expect("JSON encode failed");
    let decoded: MetricSample = decode(&json_bytes, Format::Json).expect("JSON decode failed");
    assert_eq!(decoded.name, "snmp.ifInOctets");
    assert_eq!(decoded.metric_type, MetricType::Rate);
    assert_eq!(decoded.tags.len(), 2);

    let cbor_bytes = encode(&sample, Format::Cbor).expect("CBOR encode failed");
    let cbor_decoded: MetricSample = decode(&cbor_bytes, Format::Cbor).expect("CBOR decode failed");
    assert_eq!(cbor_decoded, decoded);
}

#[test]
fn test_key_expression_building() {
    let keys = KeyExprBuilder::new("clickhouse");
    assert_eq!(
        keys.build("db01", "clickhouse.query.active"),
        "integrations/clickhouse/db01/clickhouse.query.active"
    );
    assert_eq!(
        keys.service_check_key("db01", "clickhouse.can_connect"),
        "integrations/clickhouse/db01/@/service_check/clickhouse.can_connect"
    );
}

#[test]
fn test_service_check_encoding() {
    let check = ServiceCheck::new("harbor", "harbor.can_connect", ServiceCheckStatus::Ok)
        .with_tags(["harbor_instance:prod"]);

    let bytes = encode(&check, Format::Cbor).unwrap();
    let decoded: ServiceCheck = decode(&bytes, Format::Cbor).unwrap();
    assert_eq!(decoded, check);
}

/*
 * Integration tests for cmk-check
 *
 * These run plugins end to end: agent output in, plugin output and
 * persisted value stores out.
 */

use std::fs;
use std::io::Write;

use cmk_agent::{write_sections, Device, DeviceReadings};
use cmk_check::config::{load_saved_config, SavedConfig};
use cmk_check::runner::{run_check_persistent, run_discovery, CheckRequest};
use cmk_core::value_store::service_store_path;
use cmk_core::{PluginRegistry, Service, State};
use serde_json::{json, Value};
use serial_test::serial;
use tempfile::{NamedTempFile, TempDir};

fn reading_output(value: f64) -> String {
    format!(
        "<<<sensor_readings:sep(0)>>>\n{}\n",
        json!({"serial": "Q2-1", "name": "Rack", "metric": "temperature", "value": value})
    )
}

const ENTITY_OUTPUT: &str = "\
<<<entity_sensor_descr:sep(124)>>>
1008|Inlet Temp
1010|Te1/1 Receive Power Sensor
<<<entity_sensor_values:sep(124)>>>
1008|8|9|0|26|1
1010|14|9|2|-327|1
<<<entity_sensor_thresholds:sep(124)>>>
1008.1|10|4|40
1008.2|20|4|50
1010.1|10|1|-1500
1010.2|20|1|-1800
";

#[test]
fn test_trend_persists_across_runs() {
    let dir = TempDir::new().unwrap();
    let registry = PluginRegistry::new();
    let params = json!({"trend_compute": {}});

    let mut outputs = Vec::new();
    for (now, value) in [(0.0, 0.0), (900.0, 10.0), (1800.0, 20.0)] {
        let agent_output = reading_output(value);
        let request = CheckRequest {
            plugin: "sensor_temperature",
            host: "office",
            item: Some("Rack"),
            agent_output: &agent_output,
            params: &params,
            piggyback: None,
        };
        outputs.push(run_check_persistent(&registry, dir.path(), now, &request).unwrap());
    }

    assert!(outputs[0].pending.is_some());
    for report in &outputs[1..] {
        assert_eq!(report.state, State::Ok);
        assert!(report
            .output()
            .contains("Temperature trend: +20.0 °C per 30 min"));
    }

    let store = service_store_path(dir.path(), "office", "sensor_temperature Rack").unwrap();
    let saved: Value = serde_json::from_str(&fs::read_to_string(store).unwrap()).unwrap();
    assert_eq!(saved["version"], 1);
    assert!(saved["values"]["temp.sensor_Q2-1.delta"].is_array());
}

#[test]
fn test_items_have_separate_stores() {
    let dir = TempDir::new().unwrap();
    let registry = PluginRegistry::new();
    let params = json!({"trend_compute": {}});
    let agent_output = format!(
        "{}{}\n",
        reading_output(20.0),
        json!({"serial": "Q2-2", "name": "Hall", "metric": "temperature", "value": 18.0})
    );

    for item in ["Rack", "Hall"] {
        let request = CheckRequest {
            plugin: "sensor_temperature",
            host: "office",
            item: Some(item),
            agent_output: &agent_output,
            params: &params,
            piggyback: None,
        };
        let report = run_check_persistent(&registry, dir.path(), 0.0, &request).unwrap();
        assert!(report.pending.is_some(), "{} should initialize", item);
    }

    assert!(dir.path().join("office/sensor_temperature_Rack.json").exists());
    assert!(dir.path().join("office/sensor_temperature_Hall.json").exists());
}

#[test]
fn test_entity_sensors_end_to_end() {
    let dir = TempDir::new().unwrap();
    let registry = PluginRegistry::new();

    let services = run_discovery(&registry, "entity_sensor_temperature", ENTITY_OUTPUT, None).unwrap();
    assert_eq!(services, vec![Service::new("Inlet Temp")]);
    let services = run_discovery(&registry, "entity_sensor_dom", ENTITY_OUTPUT, None).unwrap();
    assert_eq!(services, vec![Service::new("Te1/1 Receive Power Sensor")]);

    // Device levels (40, 50) alone: OK
    let request = CheckRequest {
        plugin: "entity_sensor_temperature",
        host: "switch",
        item: Some("Inlet Temp"),
        agent_output: ENTITY_OUTPUT,
        params: &Value::Null,
        piggyback: None,
    };
    let report = run_check_persistent(&registry, dir.path(), 0.0, &request).unwrap();
    assert_eq!(report.state, State::Ok);
    let output = report.output();
    assert!(output.starts_with("OK - Temperature: 26.0 °C | temp=26;40;50"));
    assert!(output.contains("Configuration: prefer user levels over device levels (used device levels)"));

    // Stricter user levels win under "worst"
    let params = json!({"levels": [25.0, 30.0], "device_levels_handling": "worst"});
    let request = CheckRequest {
        params: &params,
        ..request
    };
    let report = run_check_persistent(&registry, dir.path(), 60.0, &request).unwrap();
    assert_eq!(report.state, State::Warn);
    assert!(report
        .output()
        .starts_with("WARN - Temperature: 26.0 °C (warn/crit at 25.0 °C/30.0 °C)(!)"));
}

#[test]
fn test_agent_output_feeds_sensor_plugins() {
    let devices: Vec<Device> = serde_json::from_value(json!([
        {"serial": "Q2-1", "name": "Server Room", "networkId": "N_1"}
    ]))
    .unwrap();
    let readings: Vec<DeviceReadings> = serde_json::from_value(json!([
        {"serial": "Q2-1", "readings": [
            {"ts": "2024-05-01T10:00:00Z", "metric": "temperature", "temperature": {"celsius": 21.5}},
            {"ts": "2024-05-01T10:00:00Z", "metric": "humidity", "humidity": {"relativePercentage": 72}}
        ]}
    ]))
    .unwrap();

    let mut out = Vec::new();
    write_sections(&mut out, &devices, &readings, true).unwrap();
    let agent_output = String::from_utf8(out).unwrap();

    let registry = PluginRegistry::new();
    let services =
        run_discovery(&registry, "sensor_humidity", &agent_output, Some("Server_Room")).unwrap();
    assert_eq!(services, vec![Service::new("Server Room")]);
    assert!(run_discovery(&registry, "sensor_humidity", &agent_output, None)
        .unwrap()
        .is_empty());

    let dir = TempDir::new().unwrap();
    let params = json!({"levels": [60.0, 70.0]});
    let request = CheckRequest {
        plugin: "sensor_humidity",
        host: "Server_Room",
        item: Some("Server Room"),
        agent_output: &agent_output,
        params: &params,
        piggyback: Some("Server_Room"),
    };
    let report = run_check_persistent(&registry, dir.path(), 0.0, &request).unwrap();
    assert_eq!(report.state, State::Crit);
    assert!(report
        .output()
        .starts_with("CRIT - Humidity: 72.00% (warn/crit at 60.00%/70.00%)(!!)"));
}

#[test]
#[serial]
fn test_config_from_env() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"params": {{"sensor_temperature": {{"levels": [35.0, 40.0], "output_unit": "f"}}}}}}"#
    )
    .unwrap();
    std::env::set_var("CMK_CHECK_CONFIG", file.path());
    let cfg = load_saved_config().unwrap();
    std::env::remove_var("CMK_CHECK_CONFIG");

    let params = cfg.params_for("sensor_temperature", &json!({"levels": [20.0, 25.0]}));
    assert_eq!(params, json!({"levels": [20.0, 25.0], "output_unit": "f"}));

    let registry = cfg.registry().unwrap();
    let agent_output = reading_output(22.0);
    let request = CheckRequest {
        plugin: "sensor_temperature",
        host: "office",
        item: Some("Rack"),
        agent_output: &agent_output,
        params: &params,
        piggyback: None,
    };
    let dir = TempDir::new().unwrap();
    let report = run_check_persistent(&registry, dir.path(), 0.0, &request).unwrap();
    assert_eq!(report.state, State::Warn);
    assert!(report.output().starts_with("WARN - Temperature: 71.6 °F"));
}

#[test]
#[serial]
fn test_missing_config_uses_defaults() {
    std::env::set_var("CMK_CHECK_CONFIG", "/nonexistent/cmk-check/config.json");
    let cfg = load_saved_config().unwrap();
    std::env::remove_var("CMK_CHECK_CONFIG");
    assert_eq!(cfg, SavedConfig::default());
}

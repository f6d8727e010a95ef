//! Test command implementation.
//!
//! Fetches the TSDB status of every configured instance once and displays it.

use cardinality_exporter::{
    CardinalityInstance, CardinalityMetrics, Dimension, ExpansionKind, HttpStatusClient,
    LabelValuePair, Snapshot, TopN,
};
use prometheus::Registry;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::cli::ConfigFormat;
use crate::config::{Config, DEFAULT_REQUEST_TIMEOUT_SECS};

/// Tests status collection against the configured instances.
pub async fn command_test(
    expand: bool,
    format: ConfigFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🧪 Prometheus Cardinality Exporter - Test Mode");
    println!("==============================================");

    let timeout = config
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    let client = HttpStatusClient::new(Duration::from_secs(timeout))?;
    let registry = Registry::new();
    let metrics = CardinalityMetrics::new(&registry)?;
    let options = config.expansion.options();

    let mut failures = 0usize;

    for instance_config in &config.instances {
        let identity = instance_config.identity()?;
        println!("\n🔄 {} ({})", identity.name, identity.address);

        let mut instance = CardinalityInstance::new(identity);
        let start = Instant::now();

        if let Err(e) = instance.refresh(&client).await {
            println!("   ❌ {}", e);
            failures += 1;
            continue;
        }
        println!(
            "   ⏱️  Fetch duration: {:.2}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
        print_snapshot(instance.snapshot(), &format)?;

        if !expand {
            continue;
        }

        instance.expose_primary(&metrics.primary)?;
        for kind in ExpansionKind::ALL {
            let start = Instant::now();
            let result = instance
                .expand(kind, &client, metrics.expansion(kind), &options)
                .await;
            let table = instance.table(kind);
            println!(
                "   📊 {}: {} key(s), {} series in {:.2}ms",
                kind.name(),
                table.len(),
                table.exposed_series(),
                start.elapsed().as_secs_f64() * 1000.0
            );
            if let Err(e) = result {
                println!("   ❌ {}", e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} request(s) failed", failures).into());
    }

    println!("\n✅ Test completed successfully");
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot, format: &ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_snapshot(snapshot, format)?);
    Ok(())
}

/// Renders a snapshot in the requested format.
///
/// TOML leaves out empty dimensions: toml 0.5 can't emit an empty array after an array of tables.
fn render_snapshot(snapshot: &Snapshot, format: &ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    let rendered = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(snapshot)?,
        ConfigFormat::Yaml => serde_yaml::to_string(snapshot)?,
        ConfigFormat::Toml => {
            let dimensions: BTreeMap<&str, &TopN<LabelValuePair>> = Dimension::ALL
                .into_iter()
                .map(|dimension| (dimension.json_field(), snapshot.dimension(dimension)))
                .filter(|(_, entries)| !entries.is_empty())
                .collect();
            toml::to_string_pretty(&dimensions)?
        }
    };
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Snapshot {
        Snapshot {
            status: "success".into(),
            series_count_by_metric_name: [LabelValuePair::new("up", 10)].into_iter().collect(),
            memory_in_bytes_by_label_name: [LabelValuePair::new("job", 512)].into_iter().collect(),
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_render_yaml_is_parseable() {
        let output = render_snapshot(&snapshot(), &ConfigFormat::Yaml).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&output).unwrap();

        assert_eq!(value["series_count_by_metric_name"][0]["name"].as_str(), Some("up"));
        assert_eq!(value["memory_in_bytes_by_label_name"][0]["value"].as_u64(), Some(512));
    }

    #[test]
    fn test_render_toml_with_empty_dimensions() {
        let output = render_snapshot(&snapshot(), &ConfigFormat::Toml).unwrap();
        let value: toml::Value = toml::from_str(&output).unwrap();

        assert_eq!(
            value["seriesCountByMetricName"][0]["name"].as_str(),
            Some("up")
        );
        assert_eq!(
            value["memoryInBytesByLabelName"][0]["value"].as_integer(),
            Some(512)
        );
        assert!(value.get("labelValueCountByLabelName").is_none());
    }
}

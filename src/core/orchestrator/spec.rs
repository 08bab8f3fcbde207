//! Launch spec rendering
//!
//! The cloud launch tool consumes a YAML task spec. The rendered spec
//! carries the accelerator class, region, zone placement strategy, model
//! identifier, the assigned node ID (the worker's registration identity),
//! and the control-plane base URL the worker reports back to.

use crate::core::models::PlacementStrategy;
use crate::utils::error::Result;
use serde::Serialize;
use uuid::Uuid;

/// Parameters of one worker launch
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Owning deployment
    pub deployment_id: Uuid,
    /// Model to serve
    pub model_name: String,
    /// Cloud provider
    pub provider: String,
    /// Cloud region
    pub region: String,
    /// Accelerator class
    pub gpu_type: String,
    /// Cloud instance class
    pub instance_type: String,
    /// Launch as a spot instance
    pub use_spot: bool,
    /// Zone placement relative to the deployment's other replicas
    pub placement: PlacementStrategy,
}

#[derive(Debug, Serialize)]
struct LaunchSpec<'a> {
    name: &'a str,
    resources: SpecResources<'a>,
    envs: SpecEnvs<'a>,
    setup: &'static str,
    run: &'static str,
}

#[derive(Debug, Serialize)]
struct SpecResources<'a> {
    cloud: &'a str,
    region: &'a str,
    accelerators: &'a str,
    instance_type: &'a str,
    use_spot: bool,
    // The launch tool owns zone selection; spread asks it for a zone the
    // deployment's other replicas do not occupy, packed for the same one.
    placement: &'static str,
    ports: u16,
}

#[derive(Debug, Serialize)]
#[allow(non_snake_case)]
struct SpecEnvs<'a> {
    MODEL_NAME: &'a str,
    NODE_ID: String,
    CONTROL_PLANE_URL: &'a str,
}

const SETUP_SCRIPT: &str = "pip install -U vllm fleetgate-agent";

const RUN_SCRIPT: &str = "fleetgate-agent serve \
    --model \"$MODEL_NAME\" \
    --node-id \"$NODE_ID\" \
    --control-plane \"$CONTROL_PLANE_URL\" \
    --port 8000";

/// Render the YAML launch spec for one node
pub fn render_spec(
    config: &NodeConfig,
    node_id: Uuid,
    cluster_name: &str,
    control_plane_url: &str,
) -> Result<String> {
    let spec = LaunchSpec {
        name: cluster_name,
        resources: SpecResources {
            cloud: &config.provider,
            region: &config.region,
            accelerators: &config.gpu_type,
            instance_type: &config.instance_type,
            use_spot: config.use_spot,
            placement: config.placement.as_str(),
            ports: 8000,
        },
        envs: SpecEnvs {
            MODEL_NAME: &config.model_name,
            NODE_ID: node_id.to_string(),
            CONTROL_PLANE_URL: control_plane_url,
        },
        setup: SETUP_SCRIPT,
        run: RUN_SCRIPT,
    };
    Ok(serde_yaml::to_string(&spec)?)
}

/// Derive the cloud cluster name for a node
///
/// The name embeds a model slug for operator readability and the node ID's
/// short form for uniqueness; the node ID itself remains the stable key.
pub fn cluster_name_for(model_name: &str, node_id: Uuid) -> String {
    let slug: String = model_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .to_lowercase();
    let short = node_id.simple().to_string();
    format!("fg-{}-{}", slug.trim_matches('-'), &short[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NodeConfig {
        NodeConfig {
            deployment_id: Uuid::new_v4(),
            model_name: "llama-3-8b".to_string(),
            provider: "aws".to_string(),
            region: "us-east-1".to_string(),
            gpu_type: "A100-80GB".to_string(),
            instance_type: "p4d.24xlarge".to_string(),
            use_spot: true,
            placement: PlacementStrategy::Spread,
        }
    }

    #[test]
    fn spec_carries_identity_and_target() {
        let node_id = Uuid::new_v4();
        let rendered = render_spec(&config(), node_id, "fg-llama-3-8b-abcd1234", "http://cp:8080")
            .unwrap();
        assert!(rendered.contains("A100-80GB"));
        assert!(rendered.contains("us-east-1"));
        assert!(rendered.contains(&node_id.to_string()));
        assert!(rendered.contains("http://cp:8080"));
        assert!(rendered.contains("use_spot: true"));
        assert!(rendered.contains("placement: spread"));
    }

    #[test]
    fn packed_placement_is_rendered() {
        let mut packed = config();
        packed.placement = PlacementStrategy::Packed;
        let rendered = render_spec(&packed, Uuid::new_v4(), "fg-llama-3-8b-ffff0000", "http://cp:8080")
            .unwrap();
        assert!(rendered.contains("placement: packed"));
    }

    #[test]
    fn cluster_names_are_slugged_and_unique() {
        let a = cluster_name_for("llama-3-8b", Uuid::new_v4());
        let b = cluster_name_for("llama-3-8b", Uuid::new_v4());
        assert!(a.starts_with("fg-llama-3-8b-"));
        assert_ne!(a, b);
    }
}

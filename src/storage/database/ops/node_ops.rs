//! Node persistence operations

use crate::core::models::{Node, NodeStatus};
use crate::storage::database::Database;
use crate::storage::database::entities::node;
use crate::utils::error::{FleetError, Result};
use chrono::Utc;
use sea_orm::ActiveValue::{Set, Unchanged};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder};
use uuid::Uuid;

/// Convert a database row into the domain node
pub(crate) fn node_from_row(row: node::Model) -> Result<Node> {
    let status: NodeStatus = row.status.parse().map_err(FleetError::Internal)?;
    Ok(Node {
        id: row.id,
        cluster_name: row.cluster_name,
        deployment_id: row.deployment_id,
        provider: row.provider,
        region: row.region,
        gpu_type: row.gpu_type,
        instance_type: row.instance_type,
        spot_instance: row.spot_instance,
        model_name: row.model_name,
        endpoint_url: row.endpoint_url,
        status,
        last_heartbeat: row.last_heartbeat.map(|t| t.with_timezone(&Utc)),
        health_score: row.health_score.clamp(0, 100) as u8,
        status_message: row.status_message,
        launched_at: row.launched_at.with_timezone(&Utc),
        updated_at: row.updated_at.with_timezone(&Utc),
    })
}

fn row_from_node(n: &Node) -> node::Model {
    node::Model {
        id: n.id,
        cluster_name: n.cluster_name.clone(),
        deployment_id: n.deployment_id,
        provider: n.provider.clone(),
        region: n.region.clone(),
        gpu_type: n.gpu_type.clone(),
        instance_type: n.instance_type.clone(),
        spot_instance: n.spot_instance,
        model_name: n.model_name.clone(),
        endpoint_url: n.endpoint_url.clone(),
        status: n.status.to_string(),
        last_heartbeat: n.last_heartbeat.map(|t| t.fixed_offset()),
        health_score: n.health_score as i16,
        status_message: n.status_message.clone(),
        launched_at: n.launched_at.fixed_offset(),
        updated_at: n.updated_at.fixed_offset(),
    }
}

impl Database {
    /// Insert a freshly assigned node row
    pub async fn insert_node(&self, n: &Node) -> Result<()> {
        let active = row_from_node(n).into_active_model();
        node::Entity::insert(active)
            .exec(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(())
    }

    /// Fetch a node by ID
    pub async fn get_node(&self, id: Uuid) -> Result<Option<Node>> {
        let row = node::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(FleetError::Database)?;
        row.map(node_from_row).transpose()
    }

    /// Persist the full mutable state of a node
    ///
    /// The registry serializes writes per node, so a whole-row update is
    /// race-free from the store's perspective. Identity columns never
    /// change after insert and stay out of the SET clause.
    pub async fn update_node(&self, n: &Node) -> Result<()> {
        let active = node::ActiveModel {
            id: Unchanged(n.id),
            cluster_name: Unchanged(n.cluster_name.clone()),
            deployment_id: Unchanged(n.deployment_id),
            provider: Unchanged(n.provider.clone()),
            region: Unchanged(n.region.clone()),
            gpu_type: Unchanged(n.gpu_type.clone()),
            instance_type: Unchanged(n.instance_type.clone()),
            spot_instance: Unchanged(n.spot_instance),
            model_name: Unchanged(n.model_name.clone()),
            launched_at: Unchanged(n.launched_at.fixed_offset()),
            endpoint_url: Set(n.endpoint_url.clone()),
            status: Set(n.status.to_string()),
            last_heartbeat: Set(n.last_heartbeat.map(|t| t.fixed_offset())),
            health_score: Set(n.health_score as i16),
            status_message: Set(n.status_message.clone()),
            updated_at: Set(n.updated_at.fixed_offset()),
        };
        active
            .update(&self.db)
            .await
            .map_err(FleetError::Database)?;
        Ok(())
    }

    /// All nodes in non-terminal states, used to rebuild the in-memory index
    pub async fn list_live_nodes(&self) -> Result<Vec<Node>> {
        let rows = node::Entity::find()
            .filter(node::Column::Status.is_not_in(["terminated", "failed"]))
            .all(&self.db)
            .await
            .map_err(FleetError::Database)?;
        rows.into_iter().map(node_from_row).collect()
    }

    /// Nodes of one deployment, newest first
    pub async fn list_nodes_by_deployment(&self, deployment_id: Uuid) -> Result<Vec<Node>> {
        let rows = node::Entity::find()
            .filter(node::Column::DeploymentId.eq(deployment_id))
            .order_by_desc(node::Column::LaunchedAt)
            .all(&self.db)
            .await
            .map_err(FleetError::Database)?;
        rows.into_iter().map(node_from_row).collect()
    }

    /// Count a deployment's replicas in capacity-bearing states
    pub async fn count_capacity_nodes(&self, deployment_id: Uuid) -> Result<u64> {
        use sea_orm::PaginatorTrait;
        node::Entity::find()
            .filter(node::Column::DeploymentId.eq(deployment_id))
            .filter(node::Column::Status.is_in([
                "launching",
                "initializing",
                "ready",
                "active",
                "degraded",
            ]))
            .count(&self.db)
            .await
            .map_err(FleetError::Database)
    }
}

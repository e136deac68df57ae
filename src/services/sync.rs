// src/services/sync.rs
// Fotografias completas de cada coleção, republicadas a cada escrita.

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use crate::{
    common::error::AppError,
    db::{ContainerRepository, MaterialRepository, SocialRepository, UnitRepository, UserRepository},
    models::{containers::ContainerItem, social::SocialItem},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Collection {
    Units,
    WaterMovements,
    GasMovements,
    WaterStock,
    GasStock,
    MaterialRequests,
    UserRoles,
    BasketMovements,
    BasketStock,
    KitMovements,
    KitStock,
}

impl Collection {
    pub const ALL: [Collection; 11] = [
        Collection::Units,
        Collection::WaterMovements,
        Collection::GasMovements,
        Collection::WaterStock,
        Collection::GasStock,
        Collection::MaterialRequests,
        Collection::UserRoles,
        Collection::BasketMovements,
        Collection::BasketStock,
        Collection::KitMovements,
        Collection::KitStock,
    ];

    pub fn container_movements(item: ContainerItem) -> Self {
        match item {
            ContainerItem::Water => Collection::WaterMovements,
            ContainerItem::Gas => Collection::GasMovements,
        }
    }

    pub fn container_stock(item: ContainerItem) -> Self {
        match item {
            ContainerItem::Water => Collection::WaterStock,
            ContainerItem::Gas => Collection::GasStock,
        }
    }

    pub fn social_movements(item: SocialItem) -> Self {
        match item {
            SocialItem::Basket => Collection::BasketMovements,
            SocialItem::Kit => Collection::KitMovements,
        }
    }

    pub fn social_stock(item: SocialItem) -> Self {
        match item {
            SocialItem::Basket => Collection::BasketStock,
            SocialItem::Kit => Collection::KitStock,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub version: u64,
    pub documents: Arc<Value>,
}

/// Um canal `watch` por coleção; quem espera sempre recebe o estado inteiro.
pub struct SnapshotHub {
    channels: HashMap<Collection, watch::Sender<Snapshot>>,
}

impl SnapshotHub {
    pub fn new() -> Self {
        let channels = Collection::ALL
            .into_iter()
            .map(|c| {
                let (tx, _) = watch::channel(Snapshot { version: 0, documents: Arc::new(Value::Array(Vec::new())) });
                (c, tx)
            })
            .collect();
        Self { channels }
    }

    fn channel(&self, collection: Collection) -> &watch::Sender<Snapshot> {
        // Todas as variantes são criadas em `new`
        &self.channels[&collection]
    }

    pub fn publish(&self, collection: Collection, documents: Value) {
        let documents = Arc::new(documents);
        self.channel(collection).send_modify(|snap| {
            snap.version += 1;
            snap.documents = documents;
        });
    }

    pub fn current(&self, collection: Collection) -> Snapshot {
        self.channel(collection).borrow().clone()
    }

    /// Devolve na hora se já existe versão mais nova que `after`; senão espera até `wait`.
    pub async fn wait_newer(&self, collection: Collection, after: u64, wait: Duration) -> Snapshot {
        let mut rx = self.channel(collection).subscribe();
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            {
                let snap = rx.borrow_and_update();
                if snap.version > after {
                    return snap.clone();
                }
            }
            match tokio::time::timeout_at(deadline, rx.changed()).await {
                Ok(Ok(())) => continue,
                _ => return rx.borrow().clone(),
            }
        }
    }
}

impl Default for SnapshotHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Recarrega a coleção do banco e publica no hub.
#[derive(Clone)]
pub struct SyncService {
    hub: Arc<SnapshotHub>,
    unit_repo: UnitRepository,
    container_repo: ContainerRepository,
    material_repo: MaterialRepository,
    social_repo: SocialRepository,
    user_repo: UserRepository,
}

impl SyncService {
    pub fn new(
        hub: Arc<SnapshotHub>,
        unit_repo: UnitRepository,
        container_repo: ContainerRepository,
        material_repo: MaterialRepository,
        social_repo: SocialRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self { hub, unit_repo, container_repo, material_repo, social_repo, user_repo }
    }

    pub fn hub(&self) -> &SnapshotHub {
        &self.hub
    }

    /// Falha aqui só é logada: a escrita que motivou o refresh já foi confirmada.
    pub async fn refresh(&self, collection: Collection) {
        match self.load(collection).await {
            Ok(documents) => self.hub.publish(collection, documents),
            Err(e) => tracing::error!("Falha ao atualizar a coleção {:?}: {}", collection, e),
        }
    }

    pub async fn refresh_many(&self, collections: &[Collection]) {
        for c in collections {
            self.refresh(*c).await;
        }
    }

    async fn load(&self, collection: Collection) -> Result<Value, AppError> {
        match collection {
            Collection::Units => to_documents(self.unit_repo.list_all().await?),
            Collection::WaterMovements => to_documents(self.container_repo.list_movements(ContainerItem::Water).await?),
            Collection::GasMovements => to_documents(self.container_repo.list_movements(ContainerItem::Gas).await?),
            Collection::WaterStock => to_documents(self.container_repo.list_entries(ContainerItem::Water).await?),
            Collection::GasStock => to_documents(self.container_repo.list_entries(ContainerItem::Gas).await?),
            Collection::MaterialRequests => to_documents(self.material_repo.list_all().await?),
            Collection::UserRoles => to_documents(self.user_repo.list_all().await?),
            Collection::BasketMovements => to_documents(self.social_repo.list_movements(SocialItem::Basket).await?),
            Collection::BasketStock => to_documents(self.social_repo.list_entries(SocialItem::Basket).await?),
            Collection::KitMovements => to_documents(self.social_repo.list_movements(SocialItem::Kit).await?),
            Collection::KitStock => to_documents(self.social_repo.list_entries(SocialItem::Kit).await?),
        }
    }
}

fn to_documents<T: Serialize>(rows: Vec<T>) -> Result<Value, AppError> {
    serde_json::to_value(rows).map_err(|e| AppError::InternalServerError(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn returns_immediately_when_behind() {
        let hub = SnapshotHub::new();
        hub.publish(Collection::Units, json!([{ "name": "Centro" }]));

        let snap = hub.wait_newer(Collection::Units, 0, Duration::from_secs(5)).await;
        assert_eq!(snap.version, 1);
        assert_eq!(snap.documents[0]["name"], "Centro");
    }

    #[tokio::test]
    async fn waits_for_the_next_push() {
        let hub = Arc::new(SnapshotHub::new());
        let publisher = hub.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            publisher.publish(Collection::GasStock, json!([1, 2]));
        });

        let snap = hub.wait_newer(Collection::GasStock, 0, Duration::from_secs(5)).await;
        assert_eq!(snap.version, 1);
        assert_eq!(*snap.documents, json!([1, 2]));
    }

    #[tokio::test]
    async fn times_out_with_current_state() {
        let hub = SnapshotHub::new();
        hub.publish(Collection::KitStock, json!([]));
        let snap = hub.wait_newer(Collection::KitStock, 1, Duration::from_millis(20)).await;
        assert_eq!(snap.version, 1);
        // outras coleções não são afetadas
        assert_eq!(hub.current(Collection::Units).version, 0);
    }
}

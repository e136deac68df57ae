// src/services/unit_service.rs

use std::{collections::HashSet, sync::Arc};

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        format::{normalize_string, normalize_unit_type},
    },
    db::{ContainerRepository, MaterialRepository, SocialRepository, UnitRepository},
    models::units::{BulkAddReport, CascadeReport, CreateUnitPayload, Unit, UnitFilter, UpdateUnitPayload},
    services::{
        storage::BlobStore,
        sync::{Collection, SyncService},
    },
};

// Coleções que guardam referência à unidade
const UNIT_COLLECTIONS: [Collection; 6] = [
    Collection::Units,
    Collection::WaterMovements,
    Collection::GasMovements,
    Collection::MaterialRequests,
    Collection::BasketMovements,
    Collection::KitMovements,
];

fn unit_key(name: &str, unit_type: &str) -> (String, String) {
    (normalize_string(name), normalize_string(&normalize_unit_type(unit_type)))
}

/// Filtro da tela de gestão: substring sem acento/caixa no nome e no tipo normalizado.
pub fn filter_units(units: Vec<Unit>, filter: &UnitFilter) -> Vec<Unit> {
    let name = filter.name.as_deref().map(normalize_string).unwrap_or_default();
    let unit_type = filter.unit_type.as_deref().map(normalize_string).unwrap_or_default();

    units
        .into_iter()
        .filter(|u| normalize_string(&u.name).contains(&name))
        .filter(|u| normalize_string(&normalize_unit_type(&u.unit_type)).contains(&unit_type))
        .collect()
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParsedUnits {
    /// (tipo normalizado, nome)
    pub rows: Vec<(String, String)>,
    pub skipped: Vec<String>,
}

/// Lê linhas "TIPO<TAB>NOME". Duplicatas (no banco ou no próprio lote) e linhas
/// malformadas são puladas e relatadas.
pub fn parse_bulk_units(text: &str, existing: &[Unit]) -> ParsedUnits {
    let mut seen: HashSet<(String, String)> = existing.iter().map(|u| unit_key(&u.name, &u.unit_type)).collect();
    let mut parsed = ParsedUnits::default();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let line_no = index + 1;

        let Some((unit_type, name)) = line.split_once('\t') else {
            parsed.skipped.push(format!("Linha {line_no}: formato inválido (use TIPO<TAB>NOME)."));
            continue;
        };
        let (unit_type, name) = (unit_type.trim(), name.trim());
        if unit_type.is_empty() || name.is_empty() || name.contains('\t') {
            parsed.skipped.push(format!("Linha {line_no}: formato inválido (use TIPO<TAB>NOME)."));
            continue;
        }

        if !seen.insert(unit_key(name, unit_type)) {
            parsed.skipped.push(format!("Linha {line_no}: {name} ({unit_type}) já cadastrada."));
            continue;
        }
        parsed.rows.push((normalize_unit_type(unit_type), name.to_string()));
    }
    parsed
}

#[derive(Clone)]
pub struct UnitService {
    pool: PgPool,
    repo: UnitRepository,
    container_repo: ContainerRepository,
    material_repo: MaterialRepository,
    social_repo: SocialRepository,
    blobs: Arc<dyn BlobStore>,
    sync: SyncService,
}

impl UnitService {
    pub fn new(
        pool: PgPool,
        repo: UnitRepository,
        container_repo: ContainerRepository,
        material_repo: MaterialRepository,
        social_repo: SocialRepository,
        blobs: Arc<dyn BlobStore>,
        sync: SyncService,
    ) -> Self {
        Self { pool, repo, container_repo, material_repo, social_repo, blobs, sync }
    }

    pub async fn list(&self, filter: &UnitFilter) -> Result<Vec<Unit>, AppError> {
        Ok(filter_units(self.repo.list_all().await?, filter))
    }

    pub async fn create(&self, payload: &CreateUnitPayload) -> Result<Unit, AppError> {
        let unit = self.repo
            .create(&self.pool, payload.name.trim(), &normalize_unit_type(&payload.unit_type))
            .await?;
        tracing::info!("🏢 Unidade criada: {} ({}) {}", unit.name, unit.unit_type, unit.id);
        self.sync.refresh(Collection::Units).await;
        Ok(unit)
    }

    pub async fn bulk_add(&self, text: &str) -> Result<BulkAddReport, AppError> {
        let existing = self.repo.list_all().await?;
        let parsed = parse_bulk_units(text, &existing);

        if !parsed.rows.is_empty() {
            let mut tx = self.pool.begin().await?;
            for (unit_type, name) in &parsed.rows {
                self.repo.create(&mut *tx, name, unit_type).await?;
            }
            tx.commit().await?;
            self.sync.refresh(Collection::Units).await;
        }

        tracing::info!("🏢 Cadastro em lote: {} unidades, {} puladas", parsed.rows.len(), parsed.skipped.len());
        Ok(BulkAddReport { added: parsed.rows.len(), skipped: parsed.skipped })
    }

    pub async fn update(&self, id: Uuid, changes: &UpdateUnitPayload) -> Result<Unit, AppError> {
        if changes.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::InvalidInput("O nome da unidade não pode ser vazio.".into()));
        }
        let unit = self.repo.update(id, changes).await?.ok_or(AppError::NotFound("unit"))?;
        tracing::info!("🏢 Unidade {} atualizada", id);
        self.sync.refresh(Collection::Units).await;
        Ok(unit)
    }

    /// Remove a unidade e tudo que a referencia numa única transação.
    /// Os anexos só saem do armazenamento depois do commit.
    pub async fn delete_cascade(&self, id: Uuid) -> Result<CascadeReport, AppError> {
        let mut tx = self.pool.begin().await?;

        let container_movements = self.container_repo.delete_for_unit(&mut *tx, id).await?;
        let attachments = self.material_repo.delete_for_unit(&mut *tx, id).await?;
        let social_movements = self.social_repo.delete_for_unit(&mut *tx, id).await?;
        if self.repo.delete(&mut *tx, id).await? == 0 {
            return Err(AppError::NotFound("unit"));
        }
        tx.commit().await?;

        let mut report = CascadeReport {
            container_movements,
            material_requests: attachments.len() as u64,
            social_movements,
            attachments_removed: 0,
        };
        for path in attachments.into_iter().flatten() {
            match self.blobs.delete(&path).await {
                Ok(()) => report.attachments_removed += 1,
                Err(e) => tracing::warn!("Falha ao remover o anexo {} da unidade {}: {}", path, id, e),
            }
        }

        tracing::info!("🗑️ Unidade {} removida em cascata: {:?}", id, report);
        self.sync.refresh_many(&UNIT_COLLECTIONS).await;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ledger::tests::unit;

    #[test]
    fn bulk_lines_skip_duplicates_and_garbage() {
        let existing = vec![unit("Centro", "CRAS")];
        let text = "cras\tCentro\nCREAS\tNorte\n\nsó o nome\nSEMCAS\tAdministração\ncreas\tnorte\r\n";
        let parsed = parse_bulk_units(text, &existing);

        assert_eq!(
            parsed.rows,
            vec![("CREAS".to_string(), "Norte".to_string()), ("SEDE".to_string(), "Administração".to_string())]
        );
        assert_eq!(
            parsed.skipped,
            vec![
                "Linha 1: Centro (cras) já cadastrada.".to_string(),
                "Linha 4: formato inválido (use TIPO<TAB>NOME).".to_string(),
                "Linha 6: norte (creas) já cadastrada.".to_string(),
            ]
        );
    }

    #[test]
    fn filter_ignores_accents_and_case() {
        let units = vec![unit("São José", "CRAS"), unit("Centro", "CREAS"), unit("Lar", "ACOLHER E AMAR")];

        let by_name = filter_units(units.clone(), &UnitFilter { name: Some("sao jo".into()), unit_type: None });
        assert_eq!(by_name.len(), 1);

        let by_type = filter_units(units.clone(), &UnitFilter { name: None, unit_type: Some("abrigo".into()) });
        assert_eq!(by_type[0].name, "Lar");

        // "cras" não é substring de "creas"
        let cras = filter_units(units, &UnitFilter { name: None, unit_type: Some("cras".into()) });
        assert_eq!(cras.len(), 1);
    }

    mod db {
        use super::*;
        use crate::{
            common::format::today,
            db::{material_repo::MaterialInsert, UserRepository},
            models::{
                containers::{ContainerItem, MovementKind, NewMovement},
                social::{NewSocialMovement, SocialItem},
            },
            services::{storage::LocalBlobStore, sync::SnapshotHub},
        };

        fn service(pool: &PgPool, blobs: Arc<dyn BlobStore>) -> UnitService {
            let sync = SyncService::new(
                Arc::new(SnapshotHub::new()),
                UnitRepository::new(pool.clone()),
                ContainerRepository::new(pool.clone()),
                MaterialRepository::new(pool.clone()),
                SocialRepository::new(pool.clone()),
                UserRepository::new(pool.clone()),
            );
            UnitService::new(
                pool.clone(),
                UnitRepository::new(pool.clone()),
                ContainerRepository::new(pool.clone()),
                MaterialRepository::new(pool.clone()),
                SocialRepository::new(pool.clone()),
                blobs,
                sync,
            )
        }

        #[sqlx::test]
        #[ignore = "requer DATABASE_URL apontando para um banco descartável"]
        async fn cascade_removes_every_reference(pool: PgPool) {
            let root = std::env::temp_dir().join(format!("almox-cascade-{}", Uuid::new_v4()));
            let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(&root));
            let service = service(&pool, blobs.clone());

            let target = UnitRepository::new(pool.clone()).create(&pool, "Centro", "CRAS").await.unwrap();
            let other = UnitRepository::new(pool.clone()).create(&pool, "Norte", "CRAS").await.unwrap();

            let containers = ContainerRepository::new(pool.clone());
            for u in [&target, &other] {
                containers
                    .insert_movement(&pool, &NewMovement {
                        item_type: ContainerItem::Water,
                        unit_id: u.id,
                        unit_name: u.name.clone(),
                        unit_type: u.unit_type.clone(),
                        kind: MovementKind::Delivery,
                        quantity: 2,
                        movement_date: today(),
                        unit_responsible: "Ana".into(),
                        warehouse_responsible: "Carlos".into(),
                    })
                    .await
                    .unwrap();
            }

            let request_id = Uuid::new_v4();
            let path = blobs.put(request_id, "lista.pdf", b"%PDF").await.unwrap();
            MaterialRepository::new(pool.clone())
                .create(&MaterialInsert {
                    id: request_id,
                    unit_id: target.id,
                    unit_name: &target.name,
                    unit_type: &target.unit_type,
                    material_type: "limpeza",
                    items: None,
                    requested_by: "Ana",
                    requested_at: today(),
                    file_url: None,
                    storage_path: Some(&path),
                })
                .await
                .unwrap();

            SocialRepository::new(pool.clone())
                .insert_movement(&pool, &NewSocialMovement {
                    item: SocialItem::Basket,
                    movement_date: today(),
                    recipient: "CRAS Centro".into(),
                    unit_id: Some(target.id),
                    quantity: 1,
                    measure_unit: Some("cesta".into()),
                    category: "alimentacao".into(),
                    notes: None,
                    memo: None,
                    cost: None,
                    supplier: None,
                    responsible: "Ana".into(),
                })
                .await
                .unwrap();

            let report = service.delete_cascade(target.id).await.unwrap();
            assert_eq!(
                report,
                CascadeReport { container_movements: 1, material_requests: 1, social_movements: 1, attachments_removed: 1 }
            );

            let left = containers.list_movements(ContainerItem::Water).await.unwrap();
            assert_eq!(left.len(), 1);
            assert_eq!(left[0].unit_id, other.id);
            assert!(blobs.get(&path).await.is_err());

            // segunda exclusão não encontra nada e não mexe no resto
            assert!(matches!(service.delete_cascade(target.id).await, Err(AppError::NotFound("unit"))));
            assert_eq!(containers.list_movements(ContainerItem::Water).await.unwrap().len(), 1);

            let _ = tokio::fs::remove_dir_all(&root).await;
        }
    }
}

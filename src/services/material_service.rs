// src/services/material_service.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        format::{capitalize_words, normalize_unit_type, today, unit_display_name},
    },
    db::{material_repo::MaterialInsert, MaterialRepository, UnitRepository},
    models::materials::{
        Attachment, DownloadState, MaterialBoard, MaterialRequest, MaterialRow, MaterialStatus, NewMaterialRequest,
        Transition,
    },
    services::{
        storage::BlobStore,
        sync::{Collection, SyncService},
    },
};

pub const DOWNLOAD_LIMIT: i32 = 2;
pub const LOCKOUT_MINUTES: i64 = 3;

/// Aplica o limite de downloads. O contador nunca é zerado: cada download a partir
/// do limite renova o bloqueio.
pub fn throttle(state: DownloadState, now: DateTime<Utc>) -> Result<DownloadState, AppError> {
    if let Some(until) = state.blocked_until {
        if now < until {
            let seconds = (until - now).num_seconds();
            let minutes = ((seconds + 59) / 60).max(1);
            return Err(AppError::DownloadBlocked { minutes });
        }
    }

    let count = state.count + 1;
    let blocked_until = if count >= DOWNLOAD_LIMIT {
        Some(now + Duration::minutes(LOCKOUT_MINUTES))
    } else {
        state.blocked_until
    };

    Ok(DownloadState { count, last_download_at: Some(now), blocked_until })
}

/// Nome original do anexo, sem o prefixo com o id da solicitação.
fn original_file_name(storage_path: &str) -> String {
    let stored = storage_path.rsplit('/').next().unwrap_or(storage_path);
    match stored.split_once('_') {
        Some((prefix, rest)) if Uuid::parse_str(prefix).is_ok() => rest.to_string(),
        _ => stored.to_string(),
    }
}

/// Arquivo liberado para download, já contabilizado.
pub struct Download {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub state: DownloadState,
}

#[derive(Clone)]
pub struct MaterialService {
    pool: PgPool,
    repo: MaterialRepository,
    unit_repo: UnitRepository,
    blobs: Arc<dyn BlobStore>,
    sync: SyncService,
    max_attachment_bytes: u64,
    public_base_url: String,
}

impl MaterialService {
    pub fn new(
        pool: PgPool,
        repo: MaterialRepository,
        unit_repo: UnitRepository,
        blobs: Arc<dyn BlobStore>,
        sync: SyncService,
        max_attachment_bytes: u64,
        public_base_url: String,
    ) -> Self {
        Self { pool, repo, unit_repo, blobs, sync, max_attachment_bytes, public_base_url }
    }

    pub fn max_attachment_bytes(&self) -> u64 {
        self.max_attachment_bytes
    }

    /// Uma tabela por status; observações viram a linha auxiliar.
    pub async fn board(&self) -> Result<MaterialBoard, AppError> {
        let mut board = MaterialBoard::default();
        for request in self.repo.list_all().await? {
            let row = MaterialRow {
                display_name: unit_display_name(&request.unit_name, &normalize_unit_type(&request.unit_type)),
                annotation: request.items.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from),
                request,
            };
            match row.request.status {
                MaterialStatus::Requested => board.requested.push(row),
                MaterialStatus::InSeparation => board.in_separation.push(row),
                MaterialStatus::ReadyForPickup => board.ready_for_pickup.push(row),
                MaterialStatus::Delivered => board.delivered.push(row),
            }
        }
        Ok(board)
    }

    pub async fn create(
        &self,
        fields: &NewMaterialRequest,
        attachment: Option<Attachment>,
    ) -> Result<MaterialRequest, AppError> {
        let unit_id = fields.unit_id.ok_or_else(|| AppError::InvalidInput("Selecione uma unidade.".into()))?;
        let unit = self.unit_repo
            .find_by_id(&self.pool, unit_id)
            .await?
            .ok_or(AppError::NotFound("unit"))?;
        if !unit.serves_materials {
            return Err(AppError::InvalidInput(format!(
                "A unidade {} não está habilitada para receber materiais.",
                unit.name
            )));
        }

        let id = Uuid::new_v4();
        let storage_path = match attachment {
            Some(file) if !file.bytes.is_empty() => {
                if file.bytes.len() as u64 > self.max_attachment_bytes {
                    return Err(AppError::AttachmentTooLarge { max_mb: self.max_attachment_bytes / (1024 * 1024) });
                }
                Some(self.blobs.put(id, &file.file_name, &file.bytes).await?)
            }
            _ => None,
        };
        let file_url = storage_path
            .as_ref()
            .map(|_| format!("{}/api/materials/{}/attachment", self.public_base_url.trim_end_matches('/'), id));

        let unit_type = normalize_unit_type(&unit.unit_type);
        let requested_by = capitalize_words(&fields.requested_by);
        let insert = MaterialInsert {
            id,
            unit_id: unit.id,
            unit_name: &unit.name,
            unit_type: &unit_type,
            material_type: fields.material_type.trim(),
            items: fields.items.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            requested_by: &requested_by,
            requested_at: fields.requested_at.unwrap_or_else(today),
            file_url: file_url.as_deref(),
            storage_path: storage_path.as_deref(),
        };

        let created = match self.repo.create(&insert).await {
            Ok(row) => row,
            Err(e) => {
                // Não deixa o arquivo órfão
                if let Some(path) = &storage_path {
                    if let Err(cleanup) = self.blobs.delete(path).await {
                        tracing::warn!("Falha ao remover anexo órfão {}: {}", path, cleanup);
                    }
                }
                return Err(e);
            }
        };

        tracing::info!("📋 Solicitação de material {} criada para {}", created.id, created.unit_name);
        self.sync.refresh(Collection::MaterialRequests).await;
        Ok(created)
    }

    /// Explica por que a atualização condicional não encontrou a linha.
    async fn rejected(&self, id: Uuid, transition: Transition) -> AppError {
        match self.repo.find_by_id(&self.pool, id).await {
            Ok(Some(current)) => match current.status.apply(transition) {
                Err(e) => e,
                // Alguém avançou entre a leitura e a escrita
                Ok(_) => AppError::InvalidTransition { from: current.status.label() },
            },
            Ok(None) => AppError::NotFound("material_request"),
            Err(e) => e,
        }
    }

    pub async fn start_separation(&self, id: Uuid, separator: &str) -> Result<MaterialRequest, AppError> {
        let separator = capitalize_words(separator);
        let Some(updated) = self.repo.start_separation(id, &separator).await? else {
            return Err(self.rejected(id, Transition::StartSeparation).await);
        };
        tracing::info!("📋 Solicitação {} em separação por {}", id, separator);
        self.sync.refresh(Collection::MaterialRequests).await;
        Ok(updated)
    }

    pub async fn mark_ready(&self, id: Uuid) -> Result<MaterialRequest, AppError> {
        let Some(updated) = self.repo.mark_ready(id).await? else {
            return Err(self.rejected(id, Transition::MarkReady).await);
        };
        tracing::info!("📋 Solicitação {} pronta para retirada", id);
        self.sync.refresh(Collection::MaterialRequests).await;
        Ok(updated)
    }

    pub async fn deliver(&self, id: Uuid, deliverer: &str, receiver: &str) -> Result<MaterialRequest, AppError> {
        let attachment = self.repo
            .find_by_id(&self.pool, id)
            .await?
            .ok_or(AppError::NotFound("material_request"))?
            .storage_path;

        let Some(updated) = self.repo
            .deliver(id, &capitalize_words(deliverer), &capitalize_words(receiver))
            .await?
        else {
            return Err(self.rejected(id, Transition::Deliver).await);
        };

        if let Some(path) = attachment {
            if let Err(e) = self.blobs.delete(&path).await {
                tracing::warn!("Falha ao remover o anexo {} da solicitação {}: {}", path, id, e);
            }
        }

        tracing::info!("📋 Solicitação {} entregue", id);
        self.sync.refresh(Collection::MaterialRequests).await;
        Ok(updated)
    }

    /// Download com limite: a linha fica travada enquanto o contador é atualizado.
    pub async fn download(&self, id: Uuid) -> Result<Download, AppError> {
        let mut tx = self.pool.begin().await?;
        let request = self.repo
            .find_for_update(&mut *tx, id)
            .await?
            .ok_or(AppError::NotFound("material_request"))?;
        let path = request.storage_path.clone().ok_or(AppError::NotFound("attachment"))?;

        let state = throttle(DownloadState::from(&request), Utc::now())?;
        let bytes = self.blobs.get(&path).await?;

        self.repo.record_download(&mut *tx, id, &state).await?;
        tx.commit().await?;

        tracing::info!("📥 Download {} do anexo da solicitação {}", state.count, id);
        self.sync.refresh(Collection::MaterialRequests).await;
        Ok(Download { file_name: original_file_name(&path), bytes, state })
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let removed = self.repo.delete(id).await?.ok_or(AppError::NotFound("material_request"))?;
        if let Some(path) = removed {
            if let Err(e) = self.blobs.delete(&path).await {
                tracing::warn!("Falha ao remover o anexo {}: {}", path, e);
            }
        }
        tracing::info!("🗑️ Solicitação de material {} removida", id);
        self.sync.refresh(Collection::MaterialRequests).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn lockout_after_second_download() {
        let start = DownloadState { count: 0, last_download_at: None, blocked_until: None };

        let first = throttle(start, t0()).unwrap();
        assert_eq!(first.count, 1);
        assert_eq!(first.blocked_until, None);

        let second = throttle(first, t0()).unwrap();
        assert_eq!(second.count, 2);
        assert_eq!(second.blocked_until, Some(t0() + Duration::minutes(3)));

        let err = throttle(second, t0() + Duration::minutes(1)).unwrap_err();
        assert!(matches!(err, AppError::DownloadBlocked { minutes: 2 }));

        let fourth = throttle(second, t0() + Duration::minutes(4)).unwrap();
        assert_eq!(fourth.count, 3);
        // a partir do limite, cada download renova o bloqueio
        assert_eq!(fourth.blocked_until, Some(t0() + Duration::minutes(7)));
    }

    #[test]
    fn remaining_time_rounds_up() {
        let blocked = DownloadState { count: 2, last_download_at: Some(t0()), blocked_until: Some(t0() + Duration::minutes(3)) };
        let err = throttle(blocked, t0() + Duration::seconds(170)).unwrap_err();
        assert!(matches!(err, AppError::DownloadBlocked { minutes: 1 }));
    }

    #[test]
    fn original_name_drops_storage_prefix() {
        assert_eq!(
            original_file_name("materials/6f1c2b9e-3d4a-4c2e-9b1a-0e5f7d8c9a10_lista.pdf"),
            "lista.pdf"
        );
        assert_eq!(original_file_name("materials/lista_final.pdf"), "lista_final.pdf");
    }

    mod db {
        use super::*;
        use crate::{
            db::{ContainerRepository, SocialRepository, UserRepository},
            services::{storage::LocalBlobStore, sync::SnapshotHub},
        };

        fn service(pool: &PgPool, blobs: Arc<dyn BlobStore>) -> MaterialService {
            let sync = SyncService::new(
                Arc::new(SnapshotHub::new()),
                UnitRepository::new(pool.clone()),
                ContainerRepository::new(pool.clone()),
                MaterialRepository::new(pool.clone()),
                SocialRepository::new(pool.clone()),
                UserRepository::new(pool.clone()),
            );
            MaterialService::new(
                pool.clone(),
                MaterialRepository::new(pool.clone()),
                UnitRepository::new(pool.clone()),
                blobs,
                sync,
                1024 * 1024,
                "http://localhost:3000".to_string(),
            )
        }

        async fn new_request(pool: &PgPool, service: &MaterialService) -> MaterialRequest {
            let unit = UnitRepository::new(pool.clone()).create(pool, "Centro", "CRAS").await.unwrap();
            let fields = NewMaterialRequest {
                unit_id: Some(unit.id),
                material_type: "limpeza".into(),
                items: Some("detergente".into()),
                requested_by: "ana".into(),
                requested_at: None,
            };
            let attachment = Attachment { file_name: "pedido.pdf".into(), bytes: b"%PDF".to_vec() };
            service.create(&fields, Some(attachment)).await.unwrap()
        }

        fn temp_blobs() -> (Arc<dyn BlobStore>, std::path::PathBuf) {
            let root = std::env::temp_dir().join(format!("almox-materials-{}", Uuid::new_v4()));
            (Arc::new(LocalBlobStore::new(&root)), root)
        }

        #[sqlx::test]
        #[ignore = "requer DATABASE_URL apontando para um banco descartável"]
        async fn pipeline_stamps_one_timestamp_per_stage(pool: PgPool) {
            let (blobs, root) = temp_blobs();
            let service = service(&pool, blobs.clone());

            let created = new_request(&pool, &service).await;
            assert_eq!(created.status, MaterialStatus::Requested);
            assert!(created.separation_started_at.is_none() && created.ready_at.is_none() && created.delivered_at.is_none());
            let path = created.storage_path.clone().unwrap();
            assert!(created.file_url.as_deref().unwrap().ends_with(&format!("/api/materials/{}/attachment", created.id)));

            // fora de ordem: nada muda
            let err = service.mark_ready(created.id).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition { .. }));
            let untouched = service.repo.find_by_id(&pool, created.id).await.unwrap().unwrap();
            assert_eq!(untouched.status, MaterialStatus::Requested);
            assert!(untouched.ready_at.is_none());

            let separating = service.start_separation(created.id, "carlos lima").await.unwrap();
            assert_eq!(separating.status, MaterialStatus::InSeparation);
            assert_eq!(separating.separator.as_deref(), Some("Carlos Lima"));
            assert!(separating.separation_started_at.is_some());
            assert!(separating.ready_at.is_none() && separating.delivered_at.is_none());

            let ready = service.mark_ready(created.id).await.unwrap();
            assert_eq!(ready.status, MaterialStatus::ReadyForPickup);
            assert_eq!(ready.separation_started_at, separating.separation_started_at);
            assert!(ready.ready_at.is_some() && ready.delivered_at.is_none());

            let delivered = service.deliver(created.id, "carlos", "maria").await.unwrap();
            assert_eq!(delivered.status, MaterialStatus::Delivered);
            assert_eq!(delivered.ready_at, ready.ready_at);
            assert!(delivered.delivered_at.is_some());
            assert_eq!(delivered.receiver.as_deref(), Some("Maria"));
            assert!(delivered.file_url.is_none() && delivered.storage_path.is_none());
            assert!(matches!(blobs.get(&path).await, Err(AppError::NotFound(_))));

            // entregue é final
            assert!(service.deliver(created.id, "carlos", "maria").await.is_err());

            let _ = tokio::fs::remove_dir_all(&root).await;
        }

        #[sqlx::test]
        #[ignore = "requer DATABASE_URL apontando para um banco descartável"]
        async fn downloads_are_counted_and_locked(pool: PgPool) {
            let (blobs, root) = temp_blobs();
            let service = service(&pool, blobs);
            let created = new_request(&pool, &service).await;

            let first = service.download(created.id).await.unwrap();
            assert_eq!(first.bytes, b"%PDF");
            assert_eq!(first.file_name, "pedido.pdf");
            assert_eq!(first.state.count, 1);

            let second = service.download(created.id).await.unwrap();
            assert_eq!(second.state.count, 2);
            assert!(second.state.blocked_until.is_some());

            assert!(matches!(service.download(created.id).await, Err(AppError::DownloadBlocked { .. })));

            let stored = service.repo.find_by_id(&pool, created.id).await.unwrap().unwrap();
            assert_eq!(stored.download_count, 2);
            assert!(stored.blocked_until.is_some());
            assert!(stored.last_download_at.is_some());

            let _ = tokio::fs::remove_dir_all(&root).await;
        }
    }
}

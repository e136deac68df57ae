// src/services/storage.rs

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use crate::common::error::AppError;

/// Armazenamento dos anexos das solicitações de material.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Grava o arquivo da solicitação `owner` e devolve o caminho relativo usado nas
    /// outras operações. Cada dono tem o seu próprio caminho.
    async fn put(&self, owner: Uuid, file_name: &str, bytes: &[u8]) -> Result<String, AppError>;

    async fn get(&self, path: &str) -> Result<Vec<u8>, AppError>;

    /// Arquivo inexistente não é erro.
    async fn delete(&self, path: &str) -> Result<(), AppError>;
}

/// Anexos em disco, abaixo de `STORAGE_DIR`.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(path);
        let safe = relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe || path.is_empty() {
            tracing::warn!("Caminho de anexo recusado: {:?}", path);
            return Err(AppError::NotFound("attachment"));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, owner: Uuid, file_name: &str, bytes: &[u8]) -> Result<String, AppError> {
        let dir = self.root.join("materials");
        fs::create_dir_all(&dir).await?;

        let stored_name = format!("{}_{}", owner, sanitize_filename(file_name));
        fs::write(dir.join(&stored_name), bytes).await?;

        let path = format!("materials/{stored_name}");
        tracing::info!("📎 Anexo gravado: {} ({} bytes)", path, bytes.len());
        Ok(path)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, AppError> {
        let full = self.resolve(path)?;
        match fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound("attachment")),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), AppError> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Anexo já não existia: {}", path);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Só o nome-base, com caracteres fora de [A-Za-z0-9._-] trocados por '_'.
pub fn sanitize_filename(file_name: &str) -> String {
    let basename = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);

    let sanitized: String = basename
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();

    let sanitized = sanitized.trim_start_matches('.').trim_matches('_');
    if sanitized.is_empty() { "anexo".to_string() } else { sanitized.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (LocalBlobStore, PathBuf) {
        let root = std::env::temp_dir().join(format!("almoxarifado-test-{}", Uuid::new_v4()));
        (LocalBlobStore::new(&root), root)
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\docs\\Pedido Março.pdf"), "Pedido_Mar_o.pdf");
        assert_eq!(sanitize_filename("..."), "anexo");
    }

    #[tokio::test]
    async fn put_get_delete() {
        let (store, root) = temp_store();

        let path = store.put(Uuid::new_v4(), "lista.pdf", b"conteudo").await.unwrap();
        assert!(path.starts_with("materials/"));
        assert!(path.ends_with("_lista.pdf"));
        assert_eq!(store.get(&path).await.unwrap(), b"conteudo");

        store.delete(&path).await.unwrap();
        assert!(matches!(store.get(&path).await, Err(AppError::NotFound(_))));
        // apagar de novo não falha
        store.delete(&path).await.unwrap();

        let _ = tokio::fs::remove_dir_all(root).await;
    }

    #[tokio::test]
    async fn same_name_uploads_keep_their_own_files() {
        let (store, root) = temp_store();

        let first = store.put(Uuid::new_v4(), "pedido.pdf", b"A").await.unwrap();
        let second = store.put(Uuid::new_v4(), "pedido.pdf", b"B").await.unwrap();
        assert_ne!(first, second);
        assert_eq!(store.get(&first).await.unwrap(), b"A");
        assert_eq!(store.get(&second).await.unwrap(), b"B");

        // entregar um pedido não leva o arquivo do outro
        store.delete(&first).await.unwrap();
        assert_eq!(store.get(&second).await.unwrap(), b"B");

        let _ = tokio::fs::remove_dir_all(root).await;
    }

    #[tokio::test]
    async fn refuses_paths_outside_root() {
        let (store, _) = temp_store();
        assert!(store.get("../segredo.txt").await.is_err());
        assert!(store.delete("/etc/hosts").await.is_err());
    }
}

// src/services/social_service.rs
// Cestas básicas e enxovais: entradas, saídas, importação em lote e relatório por categoria.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        format::{
            capitalize_words, fits_money_column, is_valid_quantity, is_valid_string, normalize_string,
            normalize_unit_type, parse_date, sanitize_number, unit_display_name,
        },
    },
    db::{SocialRepository, UnitRepository},
    models::social::{
        CategoryReport, CategoryReportQuery, ImportFormat, ImportReport, NewSocialMovement, OutflowPayload,
        Recipient, SocialEntryPayload, SocialItem, SocialMovement, SocialStock, SocialStockEntry,
    },
    services::{
        report_service,
        sync::{Collection, SyncService},
    },
};

const IMPORT_NOTES: &str = "Importação em lote";
const IMPORT_RESPONSIBLE: &str = "Importação";

fn text_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    let value = value.trim();
    if value.is_empty() { default } else { value }
}

fn optional(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

// ---
// Importação
// ---

/// Resultado da leitura do texto colado: linhas válidas e mensagens por linha.
#[derive(Debug, Default)]
pub struct ParsedImport {
    pub rows: Vec<NewSocialMovement>,
    pub errors: Vec<String>,
}

/// Cada linha é independente; linhas em branco são ignoradas.
pub fn parse_import(format: ImportFormat, text: &str) -> ParsedImport {
    let mut parsed = ParsedImport::default();

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() > format.columns() {
            parsed.errors.push(format!(
                "Linha {line_no}: esperado(s) {} coluna(s), encontrado(s) {}.",
                format.columns(),
                columns.len()
            ));
            continue;
        }
        let result = match format {
            ImportFormat::Baskets => parse_basket_line(&columns),
            ImportFormat::Kits => parse_kit_line(&columns),
        };
        match result {
            Ok(row) => parsed.rows.push(row),
            Err(reason) => parsed.errors.push(format!("Linha {line_no}: {reason}")),
        }
    }
    parsed
}

fn cell<'a>(columns: &[&'a str], index: usize) -> &'a str {
    columns.get(index).copied().unwrap_or("").trim()
}

fn parse_common(date: &str, recipient: &str, quantity: &str) -> Result<(chrono::NaiveDate, String, i32), String> {
    let date = parse_date(date).ok_or_else(|| format!("data inválida ('{date}')."))?;
    if !is_valid_string(recipient) {
        return Err("destinatário ausente.".to_string());
    }
    let quantity = quantity
        .parse::<i32>()
        .ok()
        .filter(|q| is_valid_quantity(i64::from(*q)))
        .ok_or_else(|| format!("quantidade inválida ('{quantity}')."))?;
    Ok((date, capitalize_words(recipient), quantity))
}

// data, destinatário, quantidade, unidade, categoria, observação, custo, responsável, fornecedor
fn parse_basket_line(columns: &[&str]) -> Result<NewSocialMovement, String> {
    let col = |i| cell(columns, i);
    let (movement_date, recipient, quantity) = parse_common(col(0), col(1), col(2))?;
    let category = col(4);
    let cost = match col(6) {
        "" => None,
        raw => {
            let value = sanitize_number(raw);
            if !fits_money_column(&value) {
                return Err(format!("custo fora do limite ('{raw}')."));
            }
            Some(value)
        }
    };

    Ok(NewSocialMovement {
        item: SocialItem::Basket,
        movement_date,
        recipient,
        unit_id: None,
        quantity,
        measure_unit: Some(text_or(col(3), "cesta").to_string()),
        category: if category.is_empty() { SocialItem::Basket.default_category().to_string() } else { normalize_string(category) },
        notes: Some(text_or(col(5), IMPORT_NOTES).to_string()),
        memo: None,
        cost,
        supplier: Some(text_or(col(8), "N/A").to_string()),
        responsible: capitalize_words(text_or(col(7), IMPORT_RESPONSIBLE)),
    })
}

// data, quantidade, destinatário, observação, memorando, categoria, responsável
fn parse_kit_line(columns: &[&str]) -> Result<NewSocialMovement, String> {
    let col = |i| cell(columns, i);
    let (movement_date, recipient, quantity) = parse_common(col(0), col(2), col(1))?;
    let category = col(5);

    Ok(NewSocialMovement {
        item: SocialItem::Kit,
        movement_date,
        recipient,
        unit_id: None,
        quantity,
        measure_unit: Some("enxoval".to_string()),
        category: if category.is_empty() { SocialItem::Kit.default_category().to_string() } else { normalize_string(category) },
        notes: Some(text_or(col(3), IMPORT_NOTES).to_string()),
        memo: Some(text_or(col(4), "N/A").to_string()),
        cost: None,
        supplier: None,
        responsible: capitalize_words(text_or(col(6), IMPORT_RESPONSIBLE)),
    })
}

pub fn import_message(item: SocialItem, imported: usize, failed: usize) -> String {
    match (imported, failed) {
        (0, _) => "Nenhum registro importado.".to_string(),
        (n, 0) => format!("{n} registros de {} importados com sucesso!", item.label()),
        (n, f) => format!("Importação parcial: {n} salvos. {f} erros."),
    }
}

// ---
// Serviço
// ---

#[derive(Clone)]
pub struct SocialService {
    pool: PgPool,
    repo: SocialRepository,
    unit_repo: UnitRepository,
    sync: SyncService,
}

impl SocialService {
    pub fn new(pool: PgPool, repo: SocialRepository, unit_repo: UnitRepository, sync: SyncService) -> Self {
        Self { pool, repo, unit_repo, sync }
    }

    pub async fn stock(&self, item: SocialItem) -> Result<SocialStock, AppError> {
        let (inflows, outflows) = self.repo.stock_totals(&self.pool, item).await?;
        Ok(SocialStock { inflows, outflows, current: inflows - outflows })
    }

    pub async fn list_entries(&self, item: SocialItem) -> Result<Vec<SocialStockEntry>, AppError> {
        self.repo.list_entries(item).await
    }

    pub async fn list_movements(&self, item: SocialItem) -> Result<Vec<SocialMovement>, AppError> {
        self.repo.list_movements(item).await
    }

    pub async fn add_entry(&self, item: SocialItem, payload: &SocialEntryPayload) -> Result<SocialStockEntry, AppError> {
        let date = payload.date.ok_or_else(|| AppError::InvalidInput("A data é obrigatória.".into()))?;
        let invoice = text_or(payload.invoice.as_deref().unwrap_or(""), "N/A");

        // Enxovais não têm custo nem fornecedor
        let (unit_cost, supplier) = match item {
            SocialItem::Basket => (payload.unit_cost, optional(payload.supplier.as_deref())),
            SocialItem::Kit => (None, None),
        };

        let entry = self.repo
            .insert_entry(
                item,
                payload.quantity,
                date,
                &capitalize_words(&payload.responsible),
                invoice,
                unit_cost,
                supplier.as_deref(),
            )
            .await?;

        tracing::info!("📦 Entrada de {:?}: +{} ({})", item, entry.quantity, entry.id);
        self.sync.refresh(Collection::social_stock(item)).await;
        Ok(entry)
    }

    async fn resolve_recipient(&self, recipient: &Recipient) -> Result<(String, Option<Uuid>), AppError> {
        match recipient {
            Recipient::Unit { unit_id } => {
                let unit = self.unit_repo
                    .find_by_id(&self.pool, *unit_id)
                    .await?
                    .ok_or(AppError::NotFound("unit"))?;
                Ok((unit_display_name(&unit.name, &normalize_unit_type(&unit.unit_type)), Some(unit.id)))
            }
            Recipient::Custom { name } => {
                if !is_valid_string(name) {
                    return Err(AppError::InvalidInput("Informe o nome do destinatário.".into()));
                }
                Ok((capitalize_words(name), None))
            }
        }
    }

    /// Saída conferida contra o estoque atual, com o item travado durante a conta.
    pub async fn register_outflow(&self, item: SocialItem, payload: &OutflowPayload) -> Result<SocialMovement, AppError> {
        let movement_date = payload.date.ok_or_else(|| AppError::InvalidInput("A data é obrigatória.".into()))?;
        let memo = optional(payload.memo.as_deref());
        if item == SocialItem::Kit && memo.is_none() {
            return Err(AppError::InvalidInput("Informe o número do memorando para a saída de enxovais.".into()));
        }
        let (recipient, unit_id) = self.resolve_recipient(&payload.recipient).await?;

        let default_measure = match item {
            SocialItem::Basket => "cesta",
            SocialItem::Kit => "enxoval",
        };
        let new = NewSocialMovement {
            item,
            movement_date,
            recipient,
            unit_id,
            quantity: payload.quantity,
            measure_unit: Some(text_or(payload.measure_unit.as_deref().unwrap_or(""), default_measure).to_string()),
            category: normalize_string(&payload.category),
            notes: optional(payload.notes.as_deref()),
            memo,
            cost: None,
            supplier: None,
            responsible: capitalize_words(&payload.responsible),
        };

        let mut tx = self.pool.begin().await?;
        self.repo.lock_item(&mut *tx, item).await?;
        let (inflows, outflows) = self.repo.stock_totals(&mut *tx, item).await?;
        let available = inflows - outflows;
        if i64::from(new.quantity) > available {
            return Err(AppError::InsufficientStock { available });
        }
        let movement = self.repo.insert_movement(&mut *tx, &new).await?;
        tx.commit().await?;

        tracing::info!("🧺 Saída de {:?} para {}: -{} ({})", item, movement.recipient, movement.quantity, movement.id);
        self.sync.refresh(Collection::social_movements(item)).await;
        Ok(movement)
    }

    pub async fn update_recipient(&self, item: SocialItem, id: Uuid, recipient: &str) -> Result<SocialMovement, AppError> {
        let updated = self.repo
            .update_recipient(item, id, &capitalize_words(recipient))
            .await?
            .ok_or(AppError::NotFound("movement"))?;
        tracing::info!("✏️ Destinatário da saída {} alterado para {}", id, updated.recipient);
        self.sync.refresh(Collection::social_movements(item)).await;
        Ok(updated)
    }

    pub async fn delete_movement(&self, item: SocialItem, id: Uuid) -> Result<(), AppError> {
        if self.repo.delete_movement(item, id).await? == 0 {
            return Err(AppError::NotFound("movement"));
        }
        tracing::info!("🗑️ Saída {} removida ({:?})", id, item);
        self.sync.refresh(Collection::social_movements(item)).await;
        Ok(())
    }

    pub async fn delete_entry(&self, item: SocialItem, id: Uuid) -> Result<(), AppError> {
        if self.repo.delete_entry(item, id).await? == 0 {
            return Err(AppError::NotFound("stock_entry"));
        }
        tracing::info!("🗑️ Entrada {} removida ({:?})", id, item);
        self.sync.refresh(Collection::social_stock(item)).await;
        Ok(())
    }

    pub async fn category_report(&self, item: SocialItem, query: &CategoryReportQuery) -> Result<CategoryReport, AppError> {
        if query.from > query.to {
            return Err(AppError::InvalidInput("A data inicial deve ser anterior à data final.".into()));
        }
        let category = query.category.as_deref().map(normalize_string).filter(|c| !c.is_empty());
        let outflows = self.repo
            .outflows_between(item, query.from, query.to, category.as_deref())
            .await?;
        Ok(report_service::category_report(item, query.from, query.to, &outflows))
    }

    /// Linhas válidas entram numa única transação. Importação não confere estoque.
    pub async fn import(&self, format: ImportFormat, text: &str) -> Result<ImportReport, AppError> {
        let item = format.item();
        let parsed = parse_import(format, text);

        if !parsed.rows.is_empty() {
            let mut tx = self.pool.begin().await?;
            for row in &parsed.rows {
                self.repo.insert_movement(&mut *tx, row).await?;
            }
            tx.commit().await?;
            self.sync.refresh(Collection::social_movements(item)).await;
        }

        for error in &parsed.errors {
            tracing::warn!("Importação de {:?}: {}", item, error);
        }
        tracing::info!(
            "📥 Importação de {:?}: {} salvos, {} com erro",
            item,
            parsed.rows.len(),
            parsed.errors.len()
        );

        Ok(ImportReport {
            imported: parsed.rows.len(),
            failed: parsed.errors.len(),
            message: import_message(item, parsed.rows.len(), parsed.errors.len()),
            errors: parsed.errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn one_bad_line_does_not_sink_the_batch() {
        let text = "01/03/2024\tmaria souza\t2\tcesta\tAlimentação\t\t85,90\tana\tMercado X\n\
                    02/03/2024\tJoão\t0\n\
                    2024-03-03\tPedro\t1";
        let parsed = parse_import(ImportFormat::Baskets, text);

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.errors, vec!["Linha 2: quantidade inválida ('0').".to_string()]);

        let first = &parsed.rows[0];
        assert_eq!(first.recipient, "Maria Souza");
        assert_eq!(first.movement_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(first.category, "alimentacao");
        assert_eq!(first.notes.as_deref(), Some(IMPORT_NOTES));
        assert_eq!(first.cost, Some(Decimal::from_str("85.90").unwrap()));
        assert_eq!(first.responsible, "Ana");
        assert_eq!(first.supplier.as_deref(), Some("Mercado X"));

        // colunas faltando assumem os padrões
        let last = &parsed.rows[1];
        assert_eq!(last.responsible, "Importação");
        assert_eq!(last.supplier.as_deref(), Some("N/A"));
        assert_eq!(last.cost, None);
    }

    #[test]
    fn oversized_cost_only_rejects_its_line() {
        let text = "01/03/2024\tAna\t1\tcesta\t\t\t85,90\n\
                    02/03/2024\tBeto\t1\tcesta\t\t\t123456789012345\n\
                    03/03/2024\tBia\t1";
        let parsed = parse_import(ImportFormat::Baskets, text);

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.errors, vec!["Linha 2: custo fora do limite ('123456789012345').".to_string()]);
        assert_eq!(parsed.rows[1].recipient, "Bia");
    }

    #[test]
    fn fully_malformed_batch_imports_nothing() {
        let parsed = parse_import(ImportFormat::Kits, "ontem\t1\tAna\nhoje\t2\tBia");
        assert!(parsed.rows.is_empty());
        assert_eq!(parsed.errors.len(), 2);
        assert_eq!(import_message(SocialItem::Kit, 0, 2), "Nenhum registro importado.");
    }

    #[test]
    fn kit_columns_follow_their_own_order() {
        let parsed = parse_import(ImportFormat::Kits, "05/04/24\t3\tclara dias\tprimeiro filho\tMemo 12\t\tbeto");
        let row = &parsed.rows[0];
        assert_eq!(row.item, SocialItem::Kit);
        assert_eq!(row.quantity, 3);
        assert_eq!(row.recipient, "Clara Dias");
        assert_eq!(row.memo.as_deref(), Some("Memo 12"));
        assert_eq!(row.category, "maternidade");
        assert_eq!(row.responsible, "Beto");
    }

    #[test]
    fn extra_columns_are_a_line_error() {
        let line = "01/03/2024\tAna\t1\tx\tx\tx\tx\tx";
        let parsed = parse_import(ImportFormat::Kits, line);
        assert_eq!(parsed.errors, vec!["Linha 1: esperado(s) 7 coluna(s), encontrado(s) 8.".to_string()]);
    }

    #[test]
    fn missing_recipient_is_reported() {
        let parsed = parse_import(ImportFormat::Baskets, "\n01/03/2024\t \t1");
        assert_eq!(parsed.errors, vec!["Linha 2: destinatário ausente.".to_string()]);
    }

    #[test]
    fn import_messages() {
        assert_eq!(
            import_message(SocialItem::Basket, 3, 0),
            "3 registros de Cesta(s) Básica(s) importados com sucesso!"
        );
        assert_eq!(import_message(SocialItem::Basket, 3, 1), "Importação parcial: 3 salvos. 1 erros.");
    }
}

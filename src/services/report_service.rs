// src/services/report_service.rs

use std::{collections::HashMap, path::PathBuf};

use chrono::{NaiveDate, Utc};
use genpdf::{elements, style, Alignment, Element};

use crate::{
    common::{
        error::AppError,
        format::{capitalize_words, format_date, format_date_time},
    },
    models::{
        containers::{ContainerItem, ContainerMovement, ReportRow, SupplyReport},
        dashboard::{ChartData, Dataset},
        social::{CategoryReport, CategoryTotal, SocialItem, SocialMovement},
    },
};

// --- Agregações ---

fn ranked(totals: HashMap<String, i64>) -> Vec<ReportRow> {
    let mut rows: Vec<ReportRow> = totals.into_iter().map(|(name, total)| ReportRow { name, total }).collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    rows
}

/// Entregas do período somadas por unidade e por quem recebeu na unidade.
pub fn supply_report(
    item: ContainerItem,
    from: NaiveDate,
    to: NaiveDate,
    deliveries: &[ContainerMovement],
) -> SupplyReport {
    let mut by_unit: HashMap<String, i64> = HashMap::new();
    let mut by_responsible: HashMap<String, i64> = HashMap::new();

    for m in deliveries.iter().filter(|m| m.movement_date >= from && m.movement_date <= to) {
        let quantity = i64::from(m.quantity);
        *by_unit.entry(m.unit_name.clone()).or_default() += quantity;
        let responsible = if m.unit_responsible.trim().is_empty() {
            "Não informado".to_string()
        } else {
            m.unit_responsible.clone()
        };
        *by_responsible.entry(responsible).or_default() += quantity;
    }

    SupplyReport {
        item_type: item,
        from,
        to,
        total: by_unit.values().sum(),
        by_unit: ranked(by_unit),
        by_responsible: ranked(by_responsible),
    }
}

pub fn category_report(
    item: SocialItem,
    from: NaiveDate,
    to: NaiveDate,
    outflows: &[SocialMovement],
) -> CategoryReport {
    let mut totals: HashMap<String, i64> = HashMap::new();
    for m in outflows {
        *totals.entry(m.category.clone()).or_default() += i64::from(m.quantity);
    }
    let total: i64 = totals.values().sum();

    let categories: Vec<CategoryTotal> = ranked(totals)
        .into_iter()
        .map(|row| CategoryTotal { category: row.name, total: row.total })
        .collect();

    let top_category = categories.first().map(|c| c.category.clone());
    let top_share_percent = match categories.first() {
        Some(top) if total > 0 => top.total as f64 / total as f64 * 100.0,
        _ => 0.0,
    };

    let chart = ChartData {
        labels: categories.iter().map(|c| capitalize_words(&c.category)).collect(),
        datasets: vec![Dataset {
            label: match item {
                SocialItem::Basket => "Qtd. Cestas".to_string(),
                SocialItem::Kit => "Qtd. Enxovais".to_string(),
            },
            data: categories.iter().map(|c| c.total as f64).collect(),
        }],
    };

    CategoryReport {
        from,
        to,
        total,
        movements: outflows.len(),
        categories,
        top_category,
        top_share_percent,
        chart,
    }
}

// --- PDF ---

#[derive(Clone)]
pub struct ReportService {
    fonts_dir: PathBuf,
}

impl ReportService {
    pub fn new(fonts_dir: impl Into<PathBuf>) -> Self {
        Self { fonts_dir: fonts_dir.into() }
    }

    pub fn supply_report_pdf(&self, report: &SupplyReport) -> Result<Vec<u8>, AppError> {
        // Carrega a fonte da pasta configurada em FONTS_DIR
        let font_family = genpdf::fonts::from_files(&self.fonts_dir, "Roboto", None)
            .map_err(|_| AppError::FontNotFound(format!("Fonte Roboto não encontrada em {:?}", self.fonts_dir)))?;

        let title = format!("Relatório de Fornecimento de {}", report.item_type.label());
        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(title.clone());
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(10);
        doc.set_page_decorator(decorator);

        // --- CABEÇALHO ---
        doc.push(elements::Paragraph::new(title).styled(style::Style::new().bold().with_font_size(16)));
        doc.push(elements::Paragraph::new(format!(
            "Período: {} a {}",
            format_date(report.from),
            format_date(report.to)
        )));
        doc.push(
            elements::Paragraph::new(format!(
                "Total entregue: {} {}",
                report.total,
                report.item_type.noun()
            ))
            .styled(style::Style::new().bold()),
        );
        doc.push(elements::Break::new(1.5));

        // --- TABELAS ---
        doc.push(totals_table("Unidade", &report.by_unit)?);
        doc.push(elements::Break::new(1.5));
        doc.push(totals_table("Responsável (Unidade)", &report.by_responsible)?);
        doc.push(elements::Break::new(2));

        // --- RODAPÉ ---
        let mut footer = elements::Paragraph::new(format!("Gerado em {}", format_date_time(Utc::now())));
        footer.set_alignment(Alignment::Right);
        doc.push(footer.styled(style::Style::new().italic().with_font_size(8)));

        // Renderiza para Buffer (Memória)
        let mut buffer = Vec::new();
        doc.render(&mut buffer)
            .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?;

        tracing::info!("📄 PDF de fornecimento gerado ({} bytes)", buffer.len());
        Ok(buffer)
    }
}

fn totals_table(first_column: &str, rows: &[ReportRow]) -> Result<elements::TableLayout, AppError> {
    let table_error = |e: genpdf::error::Error| AppError::InternalServerError(anyhow::Error::msg(e.to_string()));

    // Pesos das colunas: Nome (4), Quantidade (1)
    let mut table = elements::TableLayout::new(vec![4, 1]);
    table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));

    let style_bold = style::Style::new().bold();
    table
        .row()
        .element(elements::Paragraph::new(first_column).styled(style_bold))
        .element(elements::Paragraph::new("Quantidade").styled(style_bold))
        .push()
        .map_err(table_error)?;

    if rows.is_empty() {
        table
            .row()
            .element(elements::Paragraph::new("Nenhuma entrega no período."))
            .element(elements::Paragraph::new("-"))
            .push()
            .map_err(table_error)?;
    }

    for row in rows {
        table
            .row()
            .element(elements::Paragraph::new(row.name.clone()))
            .element(elements::Paragraph::new(row.total.to_string()))
            .push()
            .map_err(table_error)?;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::containers::MovementKind;
    use crate::services::ledger::tests::{movement, unit};
    use uuid::Uuid;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn supply_report_groups_and_sorts() {
        let a = unit("Alfa", "CRAS");
        let b = unit("Beta", "CT");
        let mut m3 = movement(&b, MovementKind::Delivery, 4, 3);
        m3.unit_responsible = "Bia".into();
        let deliveries = vec![
            movement(&a, MovementKind::Delivery, 2, 1),
            movement(&a, MovementKind::Delivery, 1, 2),
            m3,
            movement(&a, MovementKind::Delivery, 9, 20),
        ];

        let report = supply_report(ContainerItem::Water, d(1), d(10), &deliveries);
        assert_eq!(report.total, 7);
        assert_eq!(report.by_unit[0], ReportRow { name: "Beta".into(), total: 4 });
        assert_eq!(report.by_unit[1], ReportRow { name: "Alfa".into(), total: 3 });
        assert_eq!(report.by_responsible[0].name, "Bia");
    }

    fn outflow(category: &str, quantity: i32) -> SocialMovement {
        SocialMovement {
            id: Uuid::new_v4(),
            item: SocialItem::Basket,
            movement_date: d(5),
            recipient: "Maria".into(),
            unit_id: None,
            quantity,
            measure_unit: Some("cesta".into()),
            category: category.into(),
            notes: None,
            memo: None,
            cost: None,
            supplier: None,
            responsible: "Ana".into(),
            status: "Entregue".into(),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn category_report_finds_main_category() {
        let rows = vec![outflow("alimentacao", 6), outflow("emergencia", 2), outflow("alimentacao", 2)];
        let report = category_report(SocialItem::Basket, d(1), d(31), &rows);
        assert_eq!(report.total, 10);
        assert_eq!(report.movements, 3);
        assert_eq!(report.top_category.as_deref(), Some("alimentacao"));
        assert_eq!(report.top_share_percent, 80.0);
        assert_eq!(report.chart.labels, vec!["Alimentacao", "Emergencia"]);
        assert_eq!(report.chart.datasets[0].label, "Qtd. Cestas");
    }

    #[test]
    fn empty_category_report_has_no_main_category() {
        let report = category_report(SocialItem::Kit, d(1), d(2), &[]);
        assert_eq!(report.top_category, None);
        assert_eq!(report.top_share_percent, 0.0);
    }

    #[test]
    fn missing_fonts_are_reported() {
        let service = ReportService::new("/caminho/inexistente");
        let report = supply_report(ContainerItem::Gas, d(1), d(2), &[]);
        assert!(matches!(service.supply_report_pdf(&report), Err(AppError::FontNotFound(_))));
    }
}

// src/services/forecast.rs
// Previsão de consumo e análise por período. Só entregas contam como consumo.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use uuid::Uuid;

use crate::{
    common::{error::AppError, format::normalize_unit_type},
    models::{
        containers::{
            AnalysisRequest, AnalysisResult, ConsumptionRanking, ContainerItem, ContainerMovement,
            ForecastRequest, ForecastResult, ForecastScope, Granularity, Grouping, MovementKind,
            RankingEntry,
        },
        dashboard::{ChartData, Dataset},
        units::Unit,
    },
};

const SHORT_HISTORY_DAYS: i64 = 30;
const RANKING_SIZE: usize = 5;

/// Dias entre a primeira e a última data, contando as duas pontas.
pub fn day_span(first: NaiveDate, last: NaiveDate) -> i64 {
    ((last - first).num_days().abs() + 1).max(1)
}

pub fn forecast(
    item: ContainerItem,
    request: &ForecastRequest,
    units: &[Unit],
    movements: &[ContainerMovement],
) -> Result<ForecastResult, AppError> {
    let deliveries = movements.iter().filter(|m| m.kind == MovementKind::Delivery);
    let excluded: HashSet<Uuid> = request.excluded_unit_ids.iter().copied().collect();

    let (title, selected, units_excluded): (String, Vec<&ContainerMovement>, Vec<String>) = match &request.scope {
        // Exclusões não se aplicam a uma unidade específica
        ForecastScope::Unit { unit_id } => {
            let unit = units.iter().find(|u| u.id == *unit_id).ok_or(AppError::NotFound("unit"))?;
            let selected = deliveries.filter(|m| m.unit_id == *unit_id).collect();
            (format!("Previsão para: {}", unit.name), selected, Vec::new())
        }
        ForecastScope::UnitType { unit_type } => {
            let wanted = normalize_unit_type(unit_type);
            let selected = deliveries
                .filter(|m| normalize_unit_type(&m.unit_type) == wanted && !excluded.contains(&m.unit_id))
                .collect();
            (format!("Previsão para Tipo: {wanted}"), selected, excluded_names(units, &excluded))
        }
        ForecastScope::All => {
            let selected = deliveries.filter(|m| !excluded.contains(&m.unit_id)).collect();
            (
                "Previsão Geral (Todas Unidades)".to_string(),
                selected,
                excluded_names(units, &excluded),
            )
        }
    };

    if selected.len() < 2 {
        return Err(AppError::InsufficientData("insufficient_data"));
    }

    let first_date = selected.iter().map(|m| m.movement_date).min().unwrap_or_default();
    let last_date = selected.iter().map(|m| m.movement_date).max().unwrap_or_default();
    let span = day_span(first_date, last_date);

    let total_delivered: i64 = selected.iter().map(|m| i64::from(m.quantity)).sum();
    let average_daily = total_delivered as f64 / span as f64;
    let base_forecast = average_daily * request.horizon_days as f64;
    let margin_amount = base_forecast * (request.margin_percent / 100.0);
    let recommended_total = (base_forecast + margin_amount).ceil() as i64;

    let units_considered: Vec<String> = selected
        .iter()
        .map(|m| m.unit_name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let chart = ChartData {
        labels: vec![
            "Média Diária (Histórico)".to_string(),
            format!("Previsão Diária (Próximos {} dias)", request.horizon_days),
        ],
        datasets: vec![Dataset {
            label: format!("Consumo Diário ({})", item.label()),
            data: vec![average_daily, recommended_total as f64 / request.horizon_days as f64],
        }],
    };

    Ok(ForecastResult {
        title,
        movements_considered: selected.len(),
        first_date,
        last_date,
        day_span: span,
        total_delivered,
        average_daily,
        base_forecast,
        margin_amount,
        recommended_total,
        short_history: span < SHORT_HISTORY_DAYS,
        units_considered,
        units_excluded,
        chart,
    })
}

fn excluded_names(units: &[Unit], excluded: &HashSet<Uuid>) -> Vec<String> {
    let mut names: Vec<String> = units
        .iter()
        .filter(|u| excluded.contains(&u.id))
        .map(|u| u.name.clone())
        .collect();
    names.sort();
    names
}

// ---
// Análise de consumo
// ---

/// (chave ordenável, rótulo do eixo) do período que contém a data.
fn period_of(date: NaiveDate, granularity: Granularity) -> (String, String) {
    match granularity {
        Granularity::Daily => (date.format("%Y-%m-%d").to_string(), date.format("%d/%m").to_string()),
        Granularity::Weekly => {
            let week = date.iso_week();
            (
                format!("{}-W{:02}", week.year(), week.week()),
                format!("Sem. {} ({})", week.week(), week.year()),
            )
        }
        Granularity::Monthly => (date.format("%Y-%m").to_string(), date.format("%m/%Y").to_string()),
    }
}

pub fn analysis(
    request: &AnalysisRequest,
    units: &[Unit],
    movements: &[ContainerMovement],
) -> Result<AnalysisResult, AppError> {
    let deliveries = movements.iter().filter(|m| m.kind == MovementKind::Delivery);
    let all = request.filter.trim().eq_ignore_ascii_case("todas") || request.filter.trim().is_empty();

    let (filter_label, selected): (String, Vec<&ContainerMovement>) = if all {
        ("Todas as Unidades".to_string(), deliveries.collect())
    } else {
        match request.grouping {
            Grouping::Unit => {
                let unit_id = Uuid::parse_str(request.filter.trim())
                    .map_err(|_| AppError::InvalidInput("Filtro de unidade inválido.".into()))?;
                let label = units
                    .iter()
                    .find(|u| u.id == unit_id)
                    .map(|u| u.name.clone())
                    .ok_or(AppError::NotFound("unit"))?;
                (label, deliveries.filter(|m| m.unit_id == unit_id).collect())
            }
            Grouping::UnitType => {
                let wanted = normalize_unit_type(&request.filter);
                let selected = deliveries.filter(|m| normalize_unit_type(&m.unit_type) == wanted).collect();
                (wanted, selected)
            }
        }
    };

    if selected.is_empty() {
        return Err(AppError::InsufficientData("no_consumption_data"));
    }

    let category_of = |m: &ContainerMovement| match request.grouping {
        Grouping::Unit => m.unit_name.clone(),
        Grouping::UnitType => normalize_unit_type(&m.unit_type),
    };

    // período -> (rótulo, categoria -> total)
    let mut periods: BTreeMap<String, (String, HashMap<String, i64>)> = BTreeMap::new();
    let mut categories: BTreeSet<String> = BTreeSet::new();
    let mut per_unit: HashMap<String, i64> = HashMap::new();

    for m in &selected {
        let (key, label) = period_of(m.movement_date, request.granularity);
        let category = category_of(m);
        let quantity = i64::from(m.quantity);

        let bucket = periods.entry(key).or_insert_with(|| (label, HashMap::new()));
        *bucket.1.entry(category.clone()).or_default() += quantity;
        categories.insert(category);
        *per_unit.entry(m.unit_name.clone()).or_default() += quantity;
    }

    let labels = periods.values().map(|(label, _)| label.clone()).collect();
    let datasets = categories
        .iter()
        .map(|category| Dataset {
            label: category.clone(),
            data: periods
                .values()
                .map(|(_, totals)| totals.get(category).copied().unwrap_or(0) as f64)
                .collect(),
        })
        .collect();

    let first_date = selected.iter().map(|m| m.movement_date).min().unwrap_or_default();
    let last_date = selected.iter().map(|m| m.movement_date).max().unwrap_or_default();
    let total: i64 = per_unit.values().sum();

    Ok(AnalysisResult {
        filter_label,
        first_date,
        last_date,
        total_days: day_span(first_date, last_date),
        total,
        chart: ChartData { labels, datasets },
        ranking: ranking(per_unit),
    })
}

fn ranking(per_unit: HashMap<String, i64>) -> ConsumptionRanking {
    let total: i64 = per_unit.values().sum();
    let share = |value: i64| if total > 0 { value as f64 / total as f64 * 100.0 } else { 0.0 };

    let mut entries: Vec<RankingEntry> = per_unit
        .into_iter()
        .map(|(unit_name, value)| RankingEntry { unit_name, total: value, share_percent: share(value) })
        .collect();
    entries.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.unit_name.cmp(&b.unit_name)));

    let unit_count = entries.len();
    let average_per_unit = if unit_count > 0 { total as f64 / unit_count as f64 } else { 0.0 };

    ConsumptionRanking {
        top: entries.iter().take(RANKING_SIZE).cloned().collect(),
        remaining_units: unit_count.saturating_sub(RANKING_SIZE),
        total,
        unit_count,
        average_per_unit,
        highest: entries.first().cloned(),
        lowest: entries.last().cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ledger::tests::{movement, unit};

    fn request(scope: ForecastScope, horizon_days: i64, margin_percent: f64) -> ForecastRequest {
        ForecastRequest { scope, excluded_unit_ids: Vec::new(), horizon_days, margin_percent }
    }

    #[test]
    fn linear_forecast_with_margin() {
        let u = unit("Centro", "CRAS");
        // dia 1 e dia 10: intervalo de 10 dias
        let movements = vec![movement(&u, MovementKind::Delivery, 10, 1), movement(&u, MovementKind::Delivery, 10, 10)];

        let result = forecast(
            ContainerItem::Water,
            &request(ForecastScope::Unit { unit_id: u.id }, 5, 50.0),
            &[u.clone()],
            &movements,
        )
        .unwrap();

        assert_eq!(result.day_span, 10);
        assert_eq!(result.average_daily, 2.0);
        assert_eq!(result.base_forecast, 10.0);
        assert_eq!(result.margin_amount, 5.0);
        assert_eq!(result.recommended_total, 15);
        assert!(result.short_history);
        assert_eq!(result.title, "Previsão para: Centro");
        assert_eq!(result.chart.datasets[0].data, vec![2.0, 3.0]);
    }

    #[test]
    fn one_delivery_is_not_enough() {
        let u = unit("Centro", "CRAS");
        let movements = vec![
            movement(&u, MovementKind::Delivery, 10, 1),
            movement(&u, MovementKind::Return, 10, 3),
        ];
        let err = forecast(ContainerItem::Gas, &request(ForecastScope::All, 7, 0.0), &[u], &movements).unwrap_err();
        assert!(matches!(err, AppError::InsufficientData("insufficient_data")));
    }

    #[test]
    fn same_day_deliveries_span_one_day() {
        let u = unit("Centro", "CRAS");
        let movements = vec![movement(&u, MovementKind::Delivery, 3, 5), movement(&u, MovementKind::Delivery, 1, 5)];
        let result = forecast(ContainerItem::Water, &request(ForecastScope::All, 2, 0.0), &[u], &movements).unwrap();
        assert_eq!(result.day_span, 1);
        assert_eq!(result.recommended_total, 8);
    }

    #[test]
    fn type_scope_applies_exclusions() {
        let a = unit("Alfa", "CRAS");
        let b = unit("Beta", "cras");
        let c = unit("Gama", "CT");
        let movements = vec![
            movement(&a, MovementKind::Delivery, 4, 1),
            movement(&a, MovementKind::Delivery, 4, 2),
            movement(&b, MovementKind::Delivery, 100, 2),
            movement(&c, MovementKind::Delivery, 50, 2),
        ];
        let mut req = request(ForecastScope::UnitType { unit_type: "Cras".into() }, 1, 0.0);
        req.excluded_unit_ids = vec![b.id];

        let result = forecast(ContainerItem::Water, &req, &[a, b, c], &movements).unwrap();
        assert_eq!(result.title, "Previsão para Tipo: CRAS");
        assert_eq!(result.total_delivered, 8);
        assert_eq!(result.units_considered, vec!["Alfa".to_string()]);
        assert_eq!(result.units_excluded, vec!["Beta".to_string()]);
    }

    #[test]
    fn iso_week_labels() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        let (key, label) = period_of(date, Granularity::Weekly);
        assert_eq!(key, "2025-W01");
        assert_eq!(label, "Sem. 1 (2025)");
        assert_eq!(period_of(date, Granularity::Monthly).1, "12/2024");
    }

    #[test]
    fn analysis_stacks_categories_per_period() {
        let a = unit("Alfa", "CRAS");
        let b = unit("Beta", "CT");
        let movements = vec![
            movement(&a, MovementKind::Delivery, 2, 1),
            movement(&b, MovementKind::Delivery, 3, 1),
            movement(&a, MovementKind::Delivery, 5, 2),
            movement(&a, MovementKind::Return, 9, 2),
        ];
        let req = AnalysisRequest { grouping: Grouping::UnitType, filter: "todas".into(), granularity: Granularity::Daily };

        let result = analysis(&req, &[a, b], &movements).unwrap();
        assert_eq!(result.chart.labels, vec!["01/03", "02/03"]);
        assert_eq!(result.chart.datasets.len(), 2);
        assert_eq!(result.chart.datasets[0].label, "CRAS");
        assert_eq!(result.chart.datasets[0].data, vec![2.0, 5.0]);
        assert_eq!(result.chart.datasets[1].data, vec![3.0, 0.0]);
        assert_eq!(result.total, 10);
        assert_eq!(result.ranking.highest.as_ref().unwrap().unit_name, "Alfa");
        assert_eq!(result.ranking.lowest.as_ref().unwrap().share_percent, 30.0);
    }

    #[test]
    fn analysis_without_deliveries_is_informational() {
        let a = unit("Alfa", "CRAS");
        let req = AnalysisRequest { grouping: Grouping::Unit, filter: a.id.to_string(), granularity: Granularity::Monthly };
        let err = analysis(&req, &[a], &[]).unwrap_err();
        assert!(matches!(err, AppError::InsufficientData("no_consumption_data")));
    }

    #[test]
    fn ranking_keeps_top_five() {
        let per_unit: HashMap<String, i64> = (1..=7).map(|i| (format!("U{i}"), i)).collect();
        let r = ranking(per_unit);
        assert_eq!(r.top.len(), 5);
        assert_eq!(r.top[0].unit_name, "U7");
        assert_eq!(r.remaining_units, 2);
        assert_eq!(r.unit_count, 7);
        assert_eq!(r.average_per_unit, 4.0);
    }
}

// src/services/ledger.rs
// Contas do razão de galões/botijões. Funções puras: o serviço busca os dados e chama aqui.

use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    common::{
        error::{AppError, Severity},
        format::{capitalize_words, normalize_unit_type},
    },
    db::container_repo::StockTotals,
    models::{
        containers::{
            BalanceFilter, BalanceLabel, BalanceRow, ContainerItem, ContainerMovement, LastMovement,
            MovementKind, MovementPayload, MovementPrompt, MovementRequestKind, NewMovement,
            PendingMovement, StockSummary, UnitBalance,
        },
        units::Unit,
    },
};

/// Estoque atual = (inicial + entradas) - entregas. Retornos não voltam ao estoque de cheios.
pub fn stock_summary(totals: StockTotals) -> StockSummary {
    StockSummary {
        initial: totals.initial,
        inflows: totals.inflows,
        deliveries: totals.deliveries,
        returns: totals.returns,
        current: totals.initial + totals.inflows - totals.deliveries,
        initial_defined: totals.initial_entries > 0,
    }
}

/// Saldo de vasilhames da unidade: entregues - devolvidos.
pub fn balance_of(movements: &[ContainerMovement], unit_id: Uuid) -> i64 {
    movements
        .iter()
        .filter(|m| m.unit_id == unit_id)
        .map(|m| match m.kind {
            MovementKind::Delivery => i64::from(m.quantity),
            MovementKind::Return => -i64::from(m.quantity),
        })
        .sum()
}

// ---
// Guardas da movimentação (na ordem em que o formulário é conferido)
// ---

/// Campos obrigatórios: unidade, data e quem recebeu/devolveu. Vem antes de qualquer consulta.
pub fn required_fields(payload: &MovementPayload) -> Result<(Uuid, NaiveDate, String), AppError> {
    let unit_responsible = capitalize_words(&payload.unit_responsible);
    match (payload.unit_id, payload.date, unit_responsible.is_empty()) {
        (Some(unit_id), Some(date), false) => Ok((unit_id, date, unit_responsible)),
        _ => Err(AppError::InvalidInput(
            "Dados inválidos. Verifique Unidade, Data e Nome de quem Recebeu/Devolveu.".into(),
        )),
    }
}

/// Primeira fase: confere campos e quantidades e devolve a movimentação pendente.
pub fn stage_movement(
    item: ContainerItem,
    payload: &MovementPayload,
    unit: &Unit,
) -> Result<PendingMovement, AppError> {
    let (_, date, unit_responsible) = required_fields(payload)?;

    if payload.delivered < 0 || payload.returned < 0 {
        return Err(AppError::InvalidInput("As quantidades não podem ser negativas.".into()));
    }

    let (delivered, returned) = match payload.kind {
        MovementRequestKind::Exchange => {
            if payload.delivered == 0 && payload.returned == 0 {
                return Err(AppError::InvalidInput(
                    "Para \"Troca\", ao menos uma das quantidades deve ser maior que zero.".into(),
                ));
            }
            (payload.delivered, payload.returned)
        }
        MovementRequestKind::DeliveryOnly => {
            if payload.delivered == 0 {
                return Err(AppError::InvalidInput(
                    "Para \"Apenas Saída\", a quantidade deve ser maior que zero.".into(),
                ));
            }
            (payload.delivered, 0)
        }
        MovementRequestKind::ReturnOnly => {
            if payload.returned == 0 {
                return Err(AppError::InvalidInput(
                    "Para \"Apenas Retorno\", a quantidade deve ser maior que zero.".into(),
                ));
            }
            (0, payload.returned)
        }
    };

    let serves_item = match item {
        ContainerItem::Water => unit.serves_water,
        ContainerItem::Gas => unit.serves_gas,
    };
    if delivered > 0 && !serves_item {
        return Err(AppError::InvalidInput(format!(
            "A unidade {} não está habilitada para receber {}.",
            unit.name,
            item.label()
        )));
    }

    Ok(PendingMovement {
        item_type: item,
        unit_id: unit.id,
        unit_name: unit.name.clone(),
        unit_type: normalize_unit_type(&unit.unit_type),
        kind: payload.kind,
        delivered,
        returned,
        date,
        unit_responsible,
    })
}

/// A perna de entrega só passa com estoque inicial definido e saldo suficiente.
pub fn check_stock(stock: &StockSummary, delivered: i32) -> Result<(), AppError> {
    if delivered <= 0 {
        return Ok(());
    }
    if !stock.initial_defined {
        return Err(AppError::InitialStockUndefined);
    }
    if i64::from(delivered) > stock.current {
        return Err(AppError::InsufficientStock { available: stock.current });
    }
    Ok(())
}

pub fn movement_prompt(pending: PendingMovement) -> MovementPrompt {
    let noun = pending.item_type.noun();
    let intro = "Informe seu nome (Responsável do Almoxarifado) para registrar";
    let (prompt, confirm_label) = match (pending.delivered > 0, pending.returned > 0) {
        (true, true) => (
            format!(
                "{intro} a troca: entrega de {} cheio(s) e recebimento de {} vazio(s).",
                pending.delivered, pending.returned
            ),
            "Confirmar Troca",
        ),
        (true, false) => (
            format!("{intro} quem está realizando a entrega de {} {noun} cheio(s).", pending.delivered),
            "Confirmar Entrega",
        ),
        _ => (
            format!("{intro} o recebimento de {} {noun} vazio(s).", pending.returned),
            "Confirmar Recebimento",
        ),
    };

    MovementPrompt {
        title: format!("Confirmação de Movimentação ({})", pending.item_type.label()),
        prompt,
        confirm_label: confirm_label.to_string(),
        pending,
    }
}

/// Segunda fase: exige o responsável do almoxarifado e gera uma linha por perna.
pub fn movement_legs(
    pending: &PendingMovement,
    warehouse_responsible: Option<&str>,
) -> Result<Vec<NewMovement>, AppError> {
    let warehouse_responsible = warehouse_responsible.map(capitalize_words).unwrap_or_default();
    if warehouse_responsible.is_empty() {
        return Err(AppError::InvalidInput(
            "Por favor, informe seu nome (Almoxarifado) para registrar a entrega/recebimento.".into(),
        ));
    }

    let leg = |kind, quantity| NewMovement {
        item_type: pending.item_type,
        unit_id: pending.unit_id,
        unit_name: pending.unit_name.clone(),
        unit_type: pending.unit_type.clone(),
        kind,
        quantity,
        movement_date: pending.date,
        unit_responsible: pending.unit_responsible.clone(),
        warehouse_responsible: warehouse_responsible.clone(),
    };

    let mut legs = Vec::with_capacity(2);
    if pending.delivered > 0 {
        legs.push(leg(MovementKind::Delivery, pending.delivered));
    }
    if pending.returned > 0 {
        legs.push(leg(MovementKind::Return, pending.returned));
    }
    Ok(legs)
}

pub fn receipt_message(item: ContainerItem, delivered: i32, returned: i32) -> String {
    let noun = item.noun();
    let mut parts = Vec::new();
    if delivered > 0 {
        parts.push(format!("{delivered} {noun} entregue(s)"));
    }
    if returned > 0 {
        parts.push(format!("{returned} {noun} recebido(s)"));
    }
    format!("Movimentação salva! {}.", parts.join("; "))
}

// ---
// Tabela de status
// ---

#[derive(Default)]
struct Aggregate {
    delivered: i64,
    returned: i64,
    last: Option<LastMovement>,
}

/// Uma linha por unidade com movimento. Movimentos de unidades removidas são ignorados.
pub fn status_table(units: &[Unit], movements: &[ContainerMovement], filter: BalanceFilter) -> Vec<BalanceRow> {
    let mut totals: HashMap<Uuid, Aggregate> = units.iter().map(|u| (u.id, Aggregate::default())).collect();

    for m in movements {
        let Some(agg) = totals.get_mut(&m.unit_id) else {
            continue;
        };
        match m.kind {
            MovementKind::Delivery => agg.delivered += i64::from(m.quantity),
            MovementKind::Return => agg.returned += i64::from(m.quantity),
        }
        let newer = agg
            .last
            .as_ref()
            .map_or(true, |l| (m.movement_date, m.recorded_at) > (l.movement_date, l.recorded_at));
        if newer {
            agg.last = Some(LastMovement {
                movement_date: m.movement_date,
                kind: m.kind,
                quantity: m.quantity,
                unit_responsible: m.unit_responsible.clone(),
                warehouse_responsible: m.warehouse_responsible.clone(),
                recorded_at: m.recorded_at,
            });
        }
    }

    let mut rows: Vec<BalanceRow> = units
        .iter()
        .filter_map(|u| {
            let agg = totals.remove(&u.id)?;
            if agg.delivered == 0 && agg.returned == 0 {
                return None;
            }
            let pending = agg.delivered - agg.returned;
            let label = BalanceLabel::of(pending);
            Some(BalanceRow {
                unit_id: u.id,
                unit_name: u.name.clone(),
                unit_type: normalize_unit_type(&u.unit_type),
                delivered: agg.delivered,
                returned: agg.returned,
                pending,
                label,
                display: balance_display(pending),
                last_movement: agg.last,
            })
        })
        .filter(|row| match filter {
            BalanceFilter::All => true,
            BalanceFilter::Owing => row.label == BalanceLabel::Owing,
            BalanceFilter::Credit => row.label == BalanceLabel::Credit,
            BalanceFilter::Settled => row.label == BalanceLabel::Settled,
        })
        .collect();

    rows.sort_by(|a, b| b.pending.cmp(&a.pending).then_with(|| a.unit_name.cmp(&b.unit_name)));
    rows
}

fn balance_display(pending: i64) -> String {
    match BalanceLabel::of(pending) {
        BalanceLabel::Owing => format!("Faltando {pending}"),
        BalanceLabel::Credit => format!("Crédito {}", pending.abs()),
        BalanceLabel::Settled => "Zerado".to_string(),
    }
}

/// Saldo de uma unidade com o aviso mostrado antes de uma nova entrega.
pub fn unit_balance(item: ContainerItem, unit: &Unit, movements: &[ContainerMovement]) -> UnitBalance {
    let balance = balance_of(movements, unit.id);
    let label = BalanceLabel::of(balance);
    let noun = item.noun();
    let (level, message) = match label {
        BalanceLabel::Owing => (
            Severity::Warning,
            format!(
                "Atenção! A unidade {} está devendo {balance} {noun} vazio(s). Confirme se o saldo está correto antes de entregar mais.",
                unit.name
            ),
        ),
        BalanceLabel::Credit => (
            Severity::Success,
            format!(
                "A unidade {} tem um crédito de {} {noun} (recebeu a mais). Lançamento OK para troca/saída.",
                unit.name,
                balance.abs()
            ),
        ),
        BalanceLabel::Settled => (
            Severity::Info,
            format!("A unidade {} tem saldo zero. Perfeito para uma troca 1:1.", unit.name),
        ),
    };

    UnitBalance { unit_id: unit.id, unit_name: unit.name.clone(), balance, label, level, message }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    pub(crate) fn unit(name: &str, unit_type: &str) -> Unit {
        Unit {
            id: Uuid::new_v4(),
            name: name.to_string(),
            unit_type: unit_type.to_string(),
            serves_water: true,
            serves_gas: true,
            serves_materials: true,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn movement(unit: &Unit, kind: MovementKind, quantity: i32, day: u32) -> ContainerMovement {
        ContainerMovement {
            id: Uuid::new_v4(),
            item_type: ContainerItem::Water,
            unit_id: unit.id,
            unit_name: unit.name.clone(),
            unit_type: unit.unit_type.clone(),
            kind,
            quantity,
            movement_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            unit_responsible: "Ana".into(),
            warehouse_responsible: "Carlos".into(),
            recorded_at: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
        }
    }

    fn payload(unit: &Unit, kind: MovementRequestKind, delivered: i32, returned: i32) -> MovementPayload {
        MovementPayload {
            unit_id: Some(unit.id),
            kind,
            delivered,
            returned,
            date: NaiveDate::from_ymd_opt(2024, 3, 10),
            unit_responsible: "maria souza".into(),
            warehouse_responsible: None,
        }
    }

    fn stock(current: i64, initial_defined: bool) -> StockSummary {
        StockSummary { initial: current, current, initial_defined, ..Default::default() }
    }

    #[test]
    fn balance_is_deliveries_minus_returns() {
        let cras = unit("Centro", "CRAS");
        let other = unit("Outra", "CT");
        let movements = vec![
            movement(&cras, MovementKind::Delivery, 5, 1),
            movement(&cras, MovementKind::Return, 2, 2),
            movement(&cras, MovementKind::Delivery, 1, 3),
            movement(&other, MovementKind::Return, 4, 3),
        ];
        assert_eq!(balance_of(&movements, cras.id), 4);
        assert_eq!(balance_of(&movements, other.id), -4);
        assert_eq!(BalanceLabel::of(balance_of(&movements, other.id)), BalanceLabel::Credit);
    }

    #[test]
    fn stock_ignores_returns() {
        let s = stock_summary(StockTotals { initial: 10, inflows: 5, initial_entries: 1, deliveries: 7, returns: 3 });
        assert_eq!(s.current, 8);
        assert!(s.initial_defined);
    }

    #[test]
    fn delivery_above_stock_is_rejected() {
        let err = check_stock(&stock(3, true), 4).unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { available: 3 }));
        assert!(check_stock(&stock(3, true), 3).is_ok());
    }

    #[test]
    fn delivery_requires_initial_stock() {
        assert!(matches!(check_stock(&stock(0, false), 1), Err(AppError::InitialStockUndefined)));
        // retorno puro não depende do estoque
        assert!(check_stock(&stock(0, false), 0).is_ok());
    }

    #[test]
    fn exchange_needs_a_positive_leg() {
        let u = unit("Centro", "CRAS");
        let err = stage_movement(ContainerItem::Water, &payload(&u, MovementRequestKind::Exchange, 0, 0), &u)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(m) if m.contains("Troca")));

        let staged = stage_movement(ContainerItem::Water, &payload(&u, MovementRequestKind::Exchange, 0, 2), &u)
            .unwrap();
        assert_eq!((staged.delivered, staged.returned), (0, 2));
    }

    #[test]
    fn single_leg_kinds_drop_the_other_quantity() {
        let u = unit("Centro", "CRAS");
        let staged =
            stage_movement(ContainerItem::Gas, &payload(&u, MovementRequestKind::DeliveryOnly, 3, 9), &u).unwrap();
        assert_eq!((staged.delivered, staged.returned), (3, 0));
        assert_eq!(staged.unit_responsible, "Maria Souza");

        let err = stage_movement(ContainerItem::Gas, &payload(&u, MovementRequestKind::ReturnOnly, 3, 0), &u)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(m) if m.contains("Apenas Retorno")));
    }

    #[test]
    fn missing_fields_are_checked_before_quantities() {
        let u = unit("Centro", "CRAS");
        let mut p = payload(&u, MovementRequestKind::Exchange, 0, 0);
        p.unit_responsible = "  ".into();
        let err = stage_movement(ContainerItem::Water, &p, &u).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(m) if m.starts_with("Dados inválidos")));
    }

    #[test]
    fn unit_is_a_required_field() {
        let u = unit("Centro", "CRAS");
        let mut p = payload(&u, MovementRequestKind::DeliveryOnly, 1, 0);
        p.unit_id = None;
        let err = required_fields(&p).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(m) if m.starts_with("Dados inválidos")));

        let (unit_id, _, responsible) = required_fields(&payload(&u, MovementRequestKind::DeliveryOnly, 1, 0)).unwrap();
        assert_eq!(unit_id, u.id);
        assert_eq!(responsible, "Maria Souza");
    }

    #[test]
    fn unit_without_service_flag_cannot_receive() {
        let mut u = unit("Sede", "SEMCAS");
        u.serves_gas = false;
        let p = payload(&u, MovementRequestKind::DeliveryOnly, 1, 0);
        assert!(stage_movement(ContainerItem::Gas, &p, &u).is_err());
        assert!(stage_movement(ContainerItem::Water, &p, &u).is_ok());
    }

    #[test]
    fn legs_need_warehouse_responsible() {
        let u = unit("Centro", "CRAS");
        let staged =
            stage_movement(ContainerItem::Water, &payload(&u, MovementRequestKind::Exchange, 2, 1), &u).unwrap();
        assert!(movement_legs(&staged, Some(" ")).is_err());

        let legs = movement_legs(&staged, Some("joão lima")).unwrap();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].kind, MovementKind::Delivery);
        assert_eq!(legs[1].kind, MovementKind::Return);
        assert!(legs.iter().all(|l| l.warehouse_responsible == "João Lima"));
    }

    #[test]
    fn prompt_matches_the_movement_kind() {
        let u = unit("Centro", "CRAS");
        let staged =
            stage_movement(ContainerItem::Water, &payload(&u, MovementRequestKind::DeliveryOnly, 2, 0), &u).unwrap();
        let prompt = movement_prompt(staged);
        assert_eq!(prompt.title, "Confirmação de Movimentação (Água)");
        assert_eq!(prompt.confirm_label, "Confirmar Entrega");
        assert!(prompt.prompt.contains("entrega de 2 galão(ões) cheio(s)"));
    }

    #[test]
    fn receipt_lists_each_leg() {
        assert_eq!(
            receipt_message(ContainerItem::Gas, 2, 1),
            "Movimentação salva! 2 botijão(ões) entregue(s); 1 botijão(ões) recebido(s)."
        );
    }

    #[test]
    fn status_table_sorts_and_filters() {
        let a = unit("Alfa", "CRAS");
        let b = unit("Beta", "CREAS");
        let c = unit("Gama", "CT");
        let idle = unit("Parada", "CT");
        let movements = vec![
            movement(&a, MovementKind::Delivery, 2, 1),
            movement(&b, MovementKind::Delivery, 5, 1),
            movement(&b, MovementKind::Return, 1, 4),
            movement(&c, MovementKind::Return, 3, 2),
        ];
        let units = vec![a.clone(), b.clone(), c.clone(), idle];

        let rows = status_table(&units, &movements, BalanceFilter::All);
        let names: Vec<_> = rows.iter().map(|r| r.unit_name.as_str()).collect();
        assert_eq!(names, ["Beta", "Alfa", "Gama"]);
        assert_eq!(rows[0].display, "Faltando 4");
        assert_eq!(rows[2].display, "Crédito 3");
        assert_eq!(rows[0].last_movement.as_ref().unwrap().kind, MovementKind::Return);

        let credit = status_table(&units, &movements, BalanceFilter::Credit);
        assert_eq!(credit.len(), 1);
        assert_eq!(credit[0].unit_id, c.id);
    }

    #[test]
    fn unknown_units_are_left_out() {
        let a = unit("Alfa", "CRAS");
        let gone = unit("Removida", "CRAS");
        let movements = vec![movement(&gone, MovementKind::Delivery, 2, 1)];
        assert!(status_table(&[a], &movements, BalanceFilter::All).is_empty());
    }

    #[test]
    fn unit_balance_message_follows_sign() {
        let a = unit("Alfa", "CRAS");
        let owing = unit_balance(ContainerItem::Water, &a, &[movement(&a, MovementKind::Delivery, 2, 1)]);
        assert_eq!(owing.level, Severity::Warning);
        assert!(owing.message.contains("devendo 2 galão(ões)"));

        let settled = unit_balance(ContainerItem::Water, &a, &[]);
        assert_eq!(settled.level, Severity::Info);
        assert_eq!(settled.label, BalanceLabel::Settled);
    }
}
